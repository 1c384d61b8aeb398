use image::{GrayImage, RgbImage};
use imageproc::morphology::{grayscale_dilate, Mask};
use tracing::debug;

use crate::error::PipelineError;
use crate::preprocess::grey_and_blur;

/// Intensity cutoff (of 255) applied to the dilated frame difference.
pub const DIFF_THRESHOLD: u8 = 20;

/// Radius of the square dilation element; 2 gives the 5x5 all-ones kernel.
const DILATE_RADIUS: u8 = 2;

/// Produces a binary foreground mask per frame by differencing against the
/// previous frame. Owns the carried comparison state for one sequence; the
/// previous blurred frame is never staler than one call.
pub struct MotionDetector {
    diff_threshold: u8,
    prev_blur: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new(diff_threshold: u8) -> Self {
        Self {
            diff_threshold,
            prev_blur: None,
        }
    }

    /// Grayscale/blur `frame`, difference it against the previous frame,
    /// dilate so thin edges become solid blobs, and threshold to 0/255.
    ///
    /// The first call seeds the comparison state with the frame itself, so a
    /// sequence's opening frame always yields an all-zero mask.
    pub fn foreground_mask(&mut self, frame: &RgbImage) -> Result<GrayImage, PipelineError> {
        let blur = grey_and_blur(frame)?;

        if let Some(prev) = &self.prev_blur {
            let (want_w, want_h) = prev.dimensions();
            let (got_w, got_h) = blur.dimensions();
            if (got_w, got_h) != (want_w, want_h) {
                return Err(PipelineError::DimensionMismatch {
                    got_w,
                    got_h,
                    want_w,
                    want_h,
                });
            }
        }

        let prev = self
            .prev_blur
            .replace(blur.clone())
            .unwrap_or_else(|| blur.clone());

        let (width, height) = blur.dimensions();
        let mut diff = GrayImage::new(width, height);
        for ((d, a), b) in diff.pixels_mut().zip(blur.pixels()).zip(prev.pixels()) {
            d.0[0] = a.0[0].abs_diff(b.0[0]);
        }

        // Grow thin difference edges before thresholding, so small real
        // movements still clear the contour area filter.
        let dilated = grayscale_dilate(&diff, &Mask::square(DILATE_RADIUS));

        let mut mask = dilated;
        let threshold = self.diff_threshold;
        let mut changed = 0usize;
        for p in mask.pixels_mut() {
            p.0[0] = if p.0[0] >= threshold {
                changed += 1;
                255
            } else {
                0
            };
        }
        debug!(changed, width, height, "foreground mask computed");

        Ok(mask)
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(DIFF_THRESHOLD)
    }
}
