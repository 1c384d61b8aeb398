#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame has zero area ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame is {got_w}x{got_h} but the sequence started at {want_w}x{want_h}")]
    DimensionMismatch {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
}
