//! Capture glue for vendor IP cameras: session tokens over the HTTP API,
//! single-frame snapshots, and MJPEG stream collection. The pipeline only
//! ever sees fully decoded, downscaled frames.

pub mod client;
pub mod stream;

pub use client::{CameraClient, CameraError};
