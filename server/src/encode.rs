use std::io::Cursor;

use image::buffer::ConvertBuffer;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::{Delay, Frame, RgbImage, RgbaImage};
use vigil_core::RenderedFrames;

/// Display time per animation frame.
const FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("nothing to encode: the sequence is empty")]
    EmptySequence,
}

/// Encode one annotated frame as JPEG at the given quality.
pub fn jpeg_bytes(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Cursor::new(Vec::new());
    frame.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf.into_inner())
}

/// Encode a rendered sequence as a looping GIF. Alpha-masked frames keep
/// their transparency, which is what makes the optimized sequences small.
pub fn gif_bytes(frames: RenderedFrames) -> Result<Vec<u8>, EncodeError> {
    if frames.is_empty() {
        return Err(EncodeError::EmptySequence);
    }
    let rgba: Vec<RgbaImage> = match frames {
        RenderedFrames::Normal(frames) => frames.iter().map(|f| f.convert()).collect(),
        RenderedFrames::Optimized(frames) => frames,
    };

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buf, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        for img in rgba {
            let delay = Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1);
            encoder.encode_frame(Frame::from_parts(img, 0, 0, delay))?;
        }
    }
    Ok(buf.into_inner())
}
