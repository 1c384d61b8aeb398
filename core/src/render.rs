use image::buffer::ConvertBuffer;
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use tracing::debug;

use crate::contour::MotionContour;

/// Contour outlines are green and bounding boxes red, both 1px.
const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const BOX: Rgb<u8> = Rgb([255, 0, 0]);
const OUTLINE_OPAQUE: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BOX_OPAQUE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// How annotated frames are composited. Selected once per sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Draw annotations straight onto the opaque frame.
    Normal,
    /// Alpha-mask unchanged pixels away so an animated sequence only spends
    /// bytes on activity.
    Optimized,
}

/// Draw each contour's outline and bounding box onto a copy of the frame.
/// The input is never mutated; an empty contour list returns a plain copy.
pub fn render_normal(frame: &RgbImage, contours: &[MotionContour]) -> RgbImage {
    let mut out = frame.clone();
    for contour in contours {
        for p in contour.points() {
            out.put_pixel(p.x as u32, p.y as u32, OUTLINE);
        }
        draw_hollow_rect_mut(&mut out, contour.bounding_box(), BOX);
    }
    out
}

/// Renders alpha-masked frames for animation, carrying the previous frame's
/// annotation mask so stale outlines get painted over with real pixels
/// instead of bleeding through the transparency.
#[derive(Default)]
pub struct OptimizedRenderer {
    /// Mask of the pixels the previous frame's annotation layer drew (the
    /// contour-only mask, not the raw foreground mask). Unset on frame one.
    prev_contour_mask: Option<GrayImage>,
}

impl OptimizedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite one output frame.
    ///
    /// Base opacity: frame 0 is fully opaque (the animation baseline), a
    /// blank mask after that gives a fully transparent frame, otherwise the
    /// foreground mask becomes the alpha channel. Independently of that, the
    /// previous annotation region is pasted back in current colors, and this
    /// frame's annotations are drawn on top; the annotation layer's fully
    /// opaque pixels become the mask carried to the next call.
    pub fn render(
        &mut self,
        index: usize,
        frame: &RgbImage,
        fg_mask: &GrayImage,
        contours: &[MotionContour],
    ) -> RgbaImage {
        let (width, height) = frame.dimensions();
        let rgba: RgbaImage = frame.convert();

        // Isolate, in current pixel colors, the region the previous frame's
        // annotations occupied.
        let past_layer = self.prev_contour_mask.take().map(|mask| {
            let mask = if mask.dimensions() == (width, height) {
                mask
            } else {
                imageops::resize(&mask, width, height, FilterType::Nearest)
            };
            with_alpha(&rgba, &mask)
        });

        let mut out = if index == 0 {
            rgba
        } else if is_blank(fg_mask) {
            debug!(index, "no foreground activity, emitting blank frame");
            RgbaImage::from_pixel(width, height, TRANSPARENT)
        } else {
            with_alpha(&rgba, fg_mask)
        };

        if let Some(past) = past_layer {
            paste_with_alpha(&mut out, &past);
        }

        self.prev_contour_mask = if contours.is_empty() {
            None
        } else {
            let mut overlay = RgbaImage::from_pixel(width, height, TRANSPARENT);
            for contour in contours {
                for p in contour.points() {
                    overlay.put_pixel(p.x as u32, p.y as u32, OUTLINE_OPAQUE);
                }
                draw_hollow_rect_mut(&mut overlay, contour.bounding_box(), BOX_OPAQUE);
            }
            paste_with_alpha(&mut out, &overlay);
            Some(opaque_mask(&overlay))
        };

        out
    }
}

/// Replace a frame's alpha channel with the given single-channel mask.
fn with_alpha(frame: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mut out = frame.clone();
    for (p, m) in out.pixels_mut().zip(mask.pixels()) {
        p.0[3] = m.0[0];
    }
    out
}

fn is_blank(mask: &GrayImage) -> bool {
    mask.pixels().all(|p| p.0[0] == 0)
}

/// Paste `src` over `dest`, using the source's own alpha as the stencil:
/// fully opaque source pixels replace, fully transparent ones leave the
/// destination alone, anything between blends linearly.
fn paste_with_alpha(dest: &mut RgbaImage, src: &RgbaImage) {
    for (d, s) in dest.pixels_mut().zip(src.pixels()) {
        match s.0[3] {
            0 => {}
            255 => *d = *s,
            alpha => {
                let t = alpha as f32 / 255.0;
                for c in 0..4 {
                    d.0[c] =
                        (s.0[c] as f32 * t + d.0[c] as f32 * (1.0 - t)).round() as u8;
                }
            }
        }
    }
}

/// Binary mask of the layer's fully opaque pixels.
fn opaque_mask(layer: &RgbaImage) -> GrayImage {
    let mut mask = GrayImage::new(layer.width(), layer.height());
    for (m, p) in mask.pixels_mut().zip(layer.pixels()) {
        m.0[0] = if p.0[3] == 255 { 255 } else { 0 };
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::{find_motion_contours, AreaBounds};

    fn gray_frame(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn square_mask(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn normal_render_preserves_dimensions() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        let out = render_normal(&frame, &contours);
        assert_eq!(out.dimensions(), frame.dimensions());
    }

    #[test]
    fn normal_render_without_contours_is_a_plain_copy() {
        let frame = gray_frame(64, 64, 77);
        let out = render_normal(&frame, &[]);
        assert_eq!(out, frame);
    }

    #[test]
    fn normal_render_draws_outline_and_box() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        assert_eq!(contours.len(), 1);
        let out = render_normal(&frame, &contours);
        // The contour boundary sits on the box edge; corners of the box are
        // drawn after the outline and end up red.
        assert_eq!(*out.get_pixel(20, 20), BOX);
        // Interior pixels keep the original frame.
        assert_eq!(*out.get_pixel(35, 35), Rgb([100, 100, 100]));
    }

    #[test]
    fn first_frame_is_fully_opaque_regardless_of_mask() {
        let frame = gray_frame(64, 64, 50);
        let mask = square_mask(64, 64, 10, 10, 20);
        let mut renderer = OptimizedRenderer::new();
        let out = renderer.render(0, &frame, &mask, &[]);
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn quiet_later_frame_is_fully_transparent() {
        let frame = gray_frame(64, 64, 50);
        let blank = GrayImage::new(64, 64);
        let mut renderer = OptimizedRenderer::new();
        renderer.render(0, &frame, &blank, &[]);
        let out = renderer.render(1, &frame, &blank, &[]);
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn active_frame_inherits_mask_as_alpha() {
        let frame = gray_frame(64, 64, 50);
        let mask = square_mask(64, 64, 16, 16, 32);
        let mut renderer = OptimizedRenderer::new();
        renderer.render(0, &frame, &GrayImage::new(64, 64), &[]);
        let out = renderer.render(1, &frame, &mask, &[]);
        assert_eq!(out.get_pixel(20, 20).0[3], 255);
        assert_eq!(out.get_pixel(2, 2).0[3], 0);
    }

    #[test]
    fn annotations_are_drawn_even_on_the_opening_frame() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        let mut renderer = OptimizedRenderer::new();
        let out = renderer.render(0, &frame, &mask, &contours);
        assert_eq!(*out.get_pixel(20, 20), BOX_OPAQUE);
        // The opacity rule for frame 0 still holds everywhere.
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn carried_mask_covers_only_annotation_pixels() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        let mut renderer = OptimizedRenderer::new();
        renderer.render(0, &frame, &mask, &contours);
        let carried = renderer.prev_contour_mask.as_ref().unwrap();
        // Box edge pixels are carried, blob interior pixels are not.
        assert_eq!(carried.get_pixel(20, 20).0[0], 255);
        assert_eq!(carried.get_pixel(35, 35).0[0], 0);
    }

    #[test]
    fn carried_mask_clears_when_no_contours_follow() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        let mut renderer = OptimizedRenderer::new();
        renderer.render(0, &frame, &mask, &contours);
        assert!(renderer.prev_contour_mask.is_some());
        renderer.render(1, &frame, &GrayImage::new(120, 90), &[]);
        assert!(renderer.prev_contour_mask.is_none());
    }

    #[test]
    fn stale_annotations_are_painted_over_not_left_transparent() {
        let frame = gray_frame(120, 90, 100);
        let mask = square_mask(120, 90, 20, 20, 30);
        let contours = find_motion_contours(&mask, &AreaBounds::default());
        let mut renderer = OptimizedRenderer::new();
        renderer.render(0, &frame, &mask, &contours);
        // Next frame is quiet: base layer is blank, but the pixels the old
        // box occupied come back opaque, in scene colors rather than red.
        let out = renderer.render(1, &frame, &GrayImage::new(120, 90), &[]);
        let p = out.get_pixel(20, 20);
        assert_eq!(p.0[3], 255);
        assert_eq!((p.0[0], p.0[1], p.0[2]), (100, 100, 100));
        // Pixels the old annotations never touched stay transparent.
        assert_eq!(out.get_pixel(60, 60).0[3], 0);
    }
}
