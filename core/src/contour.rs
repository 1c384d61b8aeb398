use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::debug;

/// Contour area limits, both strict: a region must be larger than `min` and
/// smaller than `max` to count as motion. The lower bound discards noise
/// specks, the upper bound discards whole-frame exposure flips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBounds {
    pub min: f64,
    pub max: f64,
}

impl AreaBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn admits(&self, area: f64) -> bool {
        area > self.min && area < self.max
    }
}

impl Default for AreaBounds {
    fn default() -> Self {
        Self {
            min: 200.0,
            max: 90_000.0,
        }
    }
}

/// One connected foreground region, as the ordered boundary pixels of its
/// outer border.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionContour {
    points: Vec<Point<i32>>,
}

impl MotionContour {
    pub fn from_points(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    /// Polygon area of the boundary, by the shoelace formula.
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut doubled = 0i64;
        for (i, p) in self.points.iter().enumerate() {
            let q = &self.points[(i + 1) % self.points.len()];
            doubled += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
        }
        (doubled.abs() as f64) / 2.0
    }

    /// Tight axis-aligned bounding box around the boundary points.
    pub fn bounding_box(&self) -> Rect {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if self.points.is_empty() {
            // Border following never yields an empty boundary; keep the box
            // well-formed anyway.
            return Rect::at(0, 0).of_size(1, 1);
        }
        Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
    }
}

/// Trace the outer borders of a binary mask and keep those within `bounds`.
/// Hole borders inside a blob are not reported. Ordering follows the scan
/// order of the border-following pass and is stable for a given mask.
pub fn find_motion_contours(mask: &GrayImage, bounds: &AreaBounds) -> Vec<MotionContour> {
    let kept: Vec<MotionContour> = find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| MotionContour::from_points(c.points))
        .filter(|c| bounds.admits(c.area()))
        .collect();
    if !kept.is_empty() {
        debug!(count = kept.len(), "contours kept after area filtering");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_square(
        width: u32,
        height: u32,
        x0: u32,
        y0: u32,
        side: u32,
    ) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn area_bounds_are_strict_on_both_ends() {
        let bounds = AreaBounds::default();
        assert!(!bounds.admits(200.0));
        assert!(!bounds.admits(90_000.0));
        assert!(bounds.admits(200.5));
        assert!(bounds.admits(89_999.5));
        assert!(!bounds.admits(0.0));
    }

    #[test]
    fn square_region_yields_one_contour_with_matching_box() {
        let mask = mask_with_square(128, 128, 10, 10, 50);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        assert_eq!(contours.len(), 1);
        let rect = contours[0].bounding_box();
        assert_eq!((rect.left(), rect.top()), (10, 10));
        assert_eq!((rect.width(), rect.height()), (50, 50));
        // Boundary polygon of a side-50 square.
        assert!((contours[0].area() - 49.0 * 49.0).abs() < 1.0);
    }

    #[test]
    fn noise_speck_is_filtered_out() {
        let mask = mask_with_square(64, 64, 5, 5, 3);
        assert!(find_motion_contours(&mask, &AreaBounds::default()).is_empty());
    }

    #[test]
    fn whole_frame_flash_is_filtered_out() {
        let mask = mask_with_square(400, 400, 20, 20, 310);
        assert!(find_motion_contours(&mask, &AreaBounds::default()).is_empty());
    }

    #[test]
    fn hole_borders_are_not_reported() {
        let mut mask = mask_with_square(128, 128, 20, 20, 60);
        for y in 40..60 {
            for x in 40..60 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box().width(), 60);
    }

    #[test]
    fn extraction_is_idempotent() {
        let mask = mask_with_square(128, 128, 30, 40, 25);
        let bounds = AreaBounds::default();
        let first = find_motion_contours(&mask, &bounds);
        let second = find_motion_contours(&mask, &bounds);
        assert_eq!(first, second);
    }

    #[test]
    fn boxes_stay_inside_the_mask() {
        let mask = mask_with_square(100, 80, 70, 50, 29);
        for contour in find_motion_contours(&mask, &AreaBounds::new(10.0, 90_000.0)) {
            let rect = contour.bounding_box();
            assert!(rect.left() >= 0 && rect.top() >= 0);
            assert!(rect.left() as u32 + rect.width() <= 100);
            assert!(rect.top() as u32 + rect.height() <= 80);
        }
    }
}
