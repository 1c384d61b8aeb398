use image::{RgbImage, RgbaImage};
use tracing::debug;

use crate::contour::{find_motion_contours, AreaBounds};
use crate::detector::{MotionDetector, DIFF_THRESHOLD};
use crate::error::PipelineError;
use crate::render::{render_normal, OptimizedRenderer, RenderMode};

/// Pipeline tunables. `Default` holds the production constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    pub diff_threshold: u8,
    pub area_bounds: AreaBounds,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            diff_threshold: DIFF_THRESHOLD,
            area_bounds: AreaBounds::default(),
        }
    }
}

/// Rendered output frames; channel layout depends on the render mode.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedFrames {
    Normal(Vec<RgbImage>),
    Optimized(Vec<RgbaImage>),
}

impl RenderedFrames {
    pub fn len(&self) -> usize {
        match self {
            RenderedFrames::Normal(frames) => frames.len(),
            RenderedFrames::Optimized(frames) => frames.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    pub frames: RenderedFrames,
    pub contours_per_frame: Vec<usize>,
    /// Mean contour count across the sequence; 0.0 for an empty input.
    pub avg_contours_per_frame: f64,
}

/// Annotated output of a two-snapshot comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotResult {
    pub frame: RgbImage,
    pub contour_count: usize,
}

/// Compare two snapshots taken moments apart and annotate motion onto the
/// second one. The baseline only seeds the comparison state and is never
/// part of the output.
pub fn compare_snapshots(
    baseline: &RgbImage,
    current: &RgbImage,
    settings: &MotionSettings,
) -> Result<SnapshotResult, PipelineError> {
    let mut detector = MotionDetector::new(settings.diff_threshold);
    detector.foreground_mask(baseline)?;
    let mask = detector.foreground_mask(current)?;
    let contours = find_motion_contours(&mask, &settings.area_bounds);
    let frame = render_normal(current, &contours);
    Ok(SnapshotResult {
        frame,
        contour_count: contours.len(),
    })
}

/// Runs the full pipeline over one ordered frame sequence. Owns both pieces
/// of carried state (previous blur, previous annotation mask), so one
/// processor serves exactly one sequence; independent sequences get their
/// own instance and may run on separate threads freely.
pub struct SequenceProcessor {
    detector: MotionDetector,
    bounds: AreaBounds,
    mode: RenderMode,
    overlay: OptimizedRenderer,
}

impl SequenceProcessor {
    pub fn new(settings: MotionSettings, mode: RenderMode) -> Self {
        Self {
            detector: MotionDetector::new(settings.diff_threshold),
            bounds: settings.area_bounds,
            mode,
            overlay: OptimizedRenderer::new(),
        }
    }

    /// Process frames strictly in order: each frame's mask and overlay
    /// depend on state carried from its predecessor.
    pub fn process(&mut self, frames: &[RgbImage]) -> Result<SequenceResult, PipelineError> {
        let mut counts = Vec::with_capacity(frames.len());

        let rendered = match self.mode {
            RenderMode::Normal => {
                let mut out = Vec::with_capacity(frames.len());
                for (i, frame) in frames.iter().enumerate() {
                    debug!(frame = i + 1, total = frames.len(), "processing frame");
                    let mask = self.detector.foreground_mask(frame)?;
                    let contours = find_motion_contours(&mask, &self.bounds);
                    counts.push(contours.len());
                    out.push(render_normal(frame, &contours));
                }
                RenderedFrames::Normal(out)
            }
            RenderMode::Optimized => {
                let mut out = Vec::with_capacity(frames.len());
                for (i, frame) in frames.iter().enumerate() {
                    debug!(frame = i + 1, total = frames.len(), "processing frame");
                    let mask = self.detector.foreground_mask(frame)?;
                    let contours = find_motion_contours(&mask, &self.bounds);
                    counts.push(contours.len());
                    out.push(self.overlay.render(i, frame, &mask, &contours));
                }
                RenderedFrames::Optimized(out)
            }
        };

        let avg_contours_per_frame = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<usize>() as f64 / counts.len() as f64
        };

        Ok(SequenceResult {
            frames: rendered,
            contours_per_frame: counts,
            avg_contours_per_frame,
        })
    }
}
