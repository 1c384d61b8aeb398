//! Frame-differencing motion detection and annotation rendering.
//!
//! The pipeline runs one ordered frame sequence at a time: grayscale/blur
//! preprocessing, foreground masking against the previous frame, area-filtered
//! contour extraction, and one of two annotation renderers (opaque frames, or
//! alpha-masked frames for small animated output). All state carried between
//! frames lives in the processor owned by that sequence, so independent
//! sequences never share anything.

pub mod contour;
pub mod detector;
pub mod error;
pub mod preprocess;
pub mod render;
pub mod sequence;

pub use contour::{find_motion_contours, AreaBounds, MotionContour};
pub use detector::MotionDetector;
pub use error::PipelineError;
pub use render::{render_normal, OptimizedRenderer, RenderMode};
pub use sequence::{
    compare_snapshots, MotionSettings, RenderedFrames, SequenceProcessor, SequenceResult,
    SnapshotResult,
};
