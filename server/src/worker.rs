use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use vigil_camera::{CameraClient, CameraError};
use vigil_common::config::{CaptureConfig, Config, MotionConfig};
use vigil_common::message::{motion_message, MotionCounts};
use vigil_core::{
    compare_snapshots, AreaBounds, MotionSettings, PipelineError, RenderMode, SequenceProcessor,
};

use crate::encode::{self, EncodeError};
use crate::notify::{NotifyError, SlackNotifier};

/// One queued capture request, deferred to the background worker so route
/// handlers return immediately.
#[derive(Debug)]
pub enum CaptureJob {
    Snapshot {
        cam_id: u8,
        detection_type: String,
        detection_time: String,
        quality: u8,
    },
    Animation {
        cam_id: u8,
        detection_type: String,
        detection_time: String,
        take_seconds: u32,
        fps: u32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("capture failed: {0}")]
    Camera(#[from] CameraError),
    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("delivery failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("no session for camera {0}")]
    UnknownCamera(u8),
    #[error("expected {want} snapshots, got {got}")]
    ShortCapture { got: usize, want: usize },
}

/// Drains the job queue strictly in order. Each job runs its own pipeline
/// instance, so per-sequence state never leaks between captures.
pub struct Worker {
    capture: CaptureConfig,
    motion: MotionConfig,
    gif_channel: Option<String>,
    cams: HashMap<u8, CameraClient>,
    slack: SlackNotifier,
}

impl Worker {
    pub fn new(config: &Config, cams: HashMap<u8, CameraClient>) -> Self {
        Self {
            capture: config.capture.clone(),
            motion: config.motion.clone(),
            gif_channel: config.slack.gif_channel.clone(),
            cams,
            slack: SlackNotifier::new(config.slack.bot_token.clone()),
        }
    }

    pub async fn run(mut self, mut jobs: mpsc::Receiver<CaptureJob>) {
        info!("capture worker started");
        while let Some(job) = jobs.recv().await {
            debug!(?job, "picked up capture job");
            if let Err(e) = self.handle(job).await {
                error!(error = %e, "capture job failed");
            }
        }
        info!("job queue closed, capture worker exiting");
    }

    async fn handle(&mut self, job: CaptureJob) -> Result<(), WorkerError> {
        match job {
            CaptureJob::Snapshot {
                cam_id,
                detection_type,
                detection_time,
                quality,
            } => {
                self.handle_snapshot(cam_id, &detection_type, &detection_time, quality)
                    .await
            }
            CaptureJob::Animation {
                cam_id,
                detection_type,
                detection_time,
                take_seconds,
                fps,
            } => {
                self.handle_animation(cam_id, &detection_type, &detection_time, take_seconds, fps)
                    .await
            }
        }
    }

    /// Two snapshots back to back: the first seeds the comparison state, the
    /// second is diffed, annotated, and delivered.
    async fn handle_snapshot(
        &mut self,
        cam_id: u8,
        detection_type: &str,
        detection_time: &str,
        quality: u8,
    ) -> Result<(), WorkerError> {
        let settings = self.settings();
        let cam = self
            .cams
            .get_mut(&cam_id)
            .ok_or(WorkerError::UnknownCamera(cam_id))?;

        debug!(camera = cam.name(), "taking snapshots");
        let frames = cam.snap_frames(2, self.capture.target_width).await?;
        let mut frames = frames.into_iter();
        let (Some(baseline), Some(current)) = (frames.next(), frames.next()) else {
            return Err(WorkerError::ShortCapture { got: 0, want: 2 });
        };

        debug!(camera = cam.name(), "comparing snapshots");
        let result = compare_snapshots(&baseline, &current, &settings)?;

        let jpeg = encode::jpeg_bytes(&result.frame, quality)?;
        let caption = motion_message(
            detection_type,
            cam.name(),
            detection_time,
            Some(MotionCounts::InFrame(result.contour_count)),
        );
        let camera = cam.name().to_string();
        let channel = cam.slack_channel().to_string();
        self.slack
            .upload(&channel, &format!("cam_{cam_id}_snap.jpg"), jpeg, &caption)
            .await?;
        info!(
            camera,
            contours = result.contour_count,
            "snapshot alert delivered"
        );
        Ok(())
    }

    /// Stream a short burst of frames, run the sequence pipeline, and
    /// deliver the animation when it shows enough activity.
    async fn handle_animation(
        &mut self,
        cam_id: u8,
        detection_type: &str,
        detection_time: &str,
        take_seconds: u32,
        fps: u32,
    ) -> Result<(), WorkerError> {
        let settings = self.settings();
        let mode = render_mode(&self.motion.gif_mode);
        let activity_threshold = self.motion.activity_threshold;
        let cam = self
            .cams
            .get_mut(&cam_id)
            .ok_or(WorkerError::UnknownCamera(cam_id))?;

        let n_frames = (take_seconds * fps) as usize;
        info!(
            camera = cam.name(),
            seconds = take_seconds,
            n_frames,
            "generating animation"
        );
        let frames = cam
            .stream_frames(n_frames, self.capture.target_width)
            .await?;

        let mut processor = SequenceProcessor::new(settings, mode);
        let result = processor.process(&frames)?;

        if result.avg_contours_per_frame < activity_threshold {
            info!(
                camera = cam.name(),
                avg = result.avg_contours_per_frame,
                threshold = activity_threshold,
                "average contours per frame below activity threshold, skipping upload"
            );
            return Ok(());
        }

        let gif = encode::gif_bytes(result.frames)?;
        let caption = motion_message(
            detection_type,
            cam.name(),
            detection_time,
            Some(MotionCounts::PerFrameAverage(result.avg_contours_per_frame)),
        );
        let channel = self
            .gif_channel
            .clone()
            .unwrap_or_else(|| cam.slack_channel().to_string());
        self.slack
            .upload(&channel, &format!("cam_{cam_id}_motion.gif"), gif, &caption)
            .await?;
        info!(
            channel,
            avg = result.avg_contours_per_frame,
            "animation delivered"
        );
        Ok(())
    }

    fn settings(&self) -> MotionSettings {
        MotionSettings {
            diff_threshold: self.motion.diff_threshold,
            area_bounds: AreaBounds::new(
                self.motion.min_contour_area,
                self.motion.max_contour_area,
            ),
        }
    }
}

fn render_mode(name: &str) -> RenderMode {
    match name {
        "normal" => RenderMode::Normal,
        _ => RenderMode::Optimized,
    }
}
