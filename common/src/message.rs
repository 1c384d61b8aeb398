use chrono::Local;

/// Contour statistics attached to an alert caption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCounts {
    /// Contours applied to a single annotated frame.
    InFrame(usize),
    /// Mean contours per frame across an animated sequence.
    PerFrameAverage(f64),
}

/// Build the caption posted alongside an annotated snapshot or animation.
pub fn motion_message(
    detection_type: &str,
    camera_name: &str,
    detection_time: &str,
    counts: Option<MotionCounts>,
) -> String {
    let mut msg = format!(
        "*`{}`* detected in `{camera_name}` at `{detection_time}`.",
        title_case(detection_type)
    );
    match counts {
        Some(MotionCounts::InFrame(n)) => {
            msg.push_str(&format!(" *`{n}`* contours in frame."));
        }
        Some(MotionCounts::PerFrameAverage(avg)) => {
            msg.push_str(&format!(" *`{avg:.1}`* avg contours per frame."));
        }
        None => {}
    }
    msg
}

/// Timestamp used when a trigger does not carry its own detection time.
pub fn current_detection_time() -> String {
    Local::now().format("%F %T").to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>()
                    + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_caption() {
        let msg = motion_message(
            "motion",
            "porch",
            "2026-08-07 14:02:11",
            Some(MotionCounts::InFrame(3)),
        );
        assert_eq!(
            msg,
            "*`Motion`* detected in `porch` at `2026-08-07 14:02:11`. \
             *`3`* contours in frame."
        );
    }

    #[test]
    fn animation_caption_rounds_average() {
        let msg = motion_message(
            "person",
            "garage",
            "2026-08-07 14:02:11",
            Some(MotionCounts::PerFrameAverage(1.25)),
        );
        assert!(msg.contains("*`1.2`* avg contours per frame."));
    }

    #[test]
    fn caption_without_counts() {
        let msg = motion_message("motion", "porch", "now", None);
        assert_eq!(msg, "*`Motion`* detected in `porch` at `now`.");
    }

    #[test]
    fn title_case_handles_multiword_types() {
        assert_eq!(title_case("vehicle motion"), "Vehicle Motion");
        assert_eq!(title_case("MOTION"), "Motion");
    }
}
