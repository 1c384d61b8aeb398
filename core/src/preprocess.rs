use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::error::PipelineError;

/// Sigma a 5-tap Gaussian kernel implies when none is given explicitly.
pub(crate) const BLUR_SIGMA: f32 = 1.1;

/// Grayscale a frame and blur it slightly, so single-pixel sensor jitter
/// does not survive into the frame difference.
pub fn grey_and_blur(frame: &RgbImage) -> Result<GrayImage, PipelineError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyFrame { width, height });
    }
    let gray = image::imageops::grayscale(frame);
    Ok(gaussian_blur_f32(&gray, BLUR_SIGMA))
}
