use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use vigil_common::config::Config;
use vigil_common::message::current_detection_time;

use crate::worker::CaptureJob;

pub struct AppState {
    pub jobs: mpsc::Sender<CaptureJob>,
    pub config: Config,
}

/// Query parameters shared by the capture routes. Everything is optional;
/// empty and unparseable values fall back to configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DetectionArgs {
    detection_type: Option<String>,
    detection_time: Option<String>,
    take_seconds: Option<String>,
    fps: Option<String>,
    quality: Option<String>,
}

impl DetectionArgs {
    fn detection_type(&self) -> String {
        non_empty(&self.detection_type)
            .unwrap_or("motion")
            .to_string()
    }

    fn detection_time(&self) -> String {
        non_empty(&self.detection_time)
            .map(str::to_string)
            .unwrap_or_else(current_detection_time)
    }

    fn take_seconds(&self, default: u32) -> u32 {
        parse_or(&self.take_seconds, default)
    }

    fn fps(&self, default: u32) -> u32 {
        parse_or(&self.fps, default)
    }

    fn quality(&self, default: u8) -> u8 {
        parse_or(&self.quality, default)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn parse_or<T: std::str::FromStr>(value: &Option<String>, default: T) -> T {
    non_empty(value)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/cam/:cam_id/snap", get(snapshot))
        .route("/cam/:cam_id/gif", get(animation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// GET /cam/:cam_id/snap — queue an annotated snapshot capture.
async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(cam_id): Path<u8>,
    Query(args): Query<DetectionArgs>,
) -> (StatusCode, &'static str) {
    if state.config.camera(cam_id).is_none() {
        return (StatusCode::NOT_FOUND, "unknown camera");
    }
    let job = CaptureJob::Snapshot {
        cam_id,
        detection_type: args.detection_type(),
        detection_time: args.detection_time(),
        quality: args.quality(state.config.capture.quality),
    };
    enqueue(&state, job)
}

/// GET /cam/:cam_id/gif — queue an animated capture.
async fn animation(
    State(state): State<Arc<AppState>>,
    Path(cam_id): Path<u8>,
    Query(args): Query<DetectionArgs>,
) -> (StatusCode, &'static str) {
    if state.config.camera(cam_id).is_none() {
        return (StatusCode::NOT_FOUND, "unknown camera");
    }
    let job = CaptureJob::Animation {
        cam_id,
        detection_type: args.detection_type(),
        detection_time: args.detection_time(),
        take_seconds: args.take_seconds(state.config.capture.take_seconds),
        fps: args.fps(state.config.capture.fps),
    };
    enqueue(&state, job)
}

fn enqueue(state: &AppState, job: CaptureJob) -> (StatusCode, &'static str) {
    match state.jobs.try_send(job) {
        Ok(()) => (StatusCode::ACCEPTED, "queued"),
        Err(e) => {
            warn!(error = %e, "job queue full, rejecting request");
            (StatusCode::SERVICE_UNAVAILABLE, "queue full")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_args_use_defaults() {
        let args = DetectionArgs::default();
        assert_eq!(args.detection_type(), "motion");
        assert_eq!(args.take_seconds(5), 5);
        assert_eq!(args.fps(10), 10);
        assert_eq!(args.quality(35), 35);
        assert!(!args.detection_time().is_empty());
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let args = DetectionArgs {
            detection_type: Some(String::new()),
            detection_time: Some(String::new()),
            take_seconds: Some(String::new()),
            fps: None,
            quality: None,
        };
        assert_eq!(args.detection_type(), "motion");
        assert_eq!(args.take_seconds(5), 5);
    }

    #[test]
    fn provided_args_override_defaults() {
        let args = DetectionArgs {
            detection_type: Some("person".into()),
            detection_time: Some("2026-08-07 09:00:00".into()),
            take_seconds: Some("8".into()),
            fps: Some("4".into()),
            quality: Some("60".into()),
        };
        assert_eq!(args.detection_type(), "person");
        assert_eq!(args.detection_time(), "2026-08-07 09:00:00");
        assert_eq!(args.take_seconds(5), 8);
        assert_eq!(args.fps(10), 4);
        assert_eq!(args.quality(35), 60);
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let args = DetectionArgs {
            take_seconds: Some("forever".into()),
            ..Default::default()
        };
        assert_eq!(args.take_seconds(5), 5);
    }
}
