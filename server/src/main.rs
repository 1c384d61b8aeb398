mod encode;
mod notify;
mod routes;
mod worker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use vigil_camera::CameraClient;
use vigil_common::config::Config;

/// Capture requests pending beyond this are rejected with 503.
const JOB_QUEUE_DEPTH: usize = 32;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        host = config.server.host,
        port = config.server.port,
        cameras = config.cameras.len(),
        gif_mode = config.motion.gif_mode,
        "starting vigil server"
    );

    // Open a session per configured camera up front, so token problems
    // surface at startup rather than on the first alert.
    let mut cams = HashMap::new();
    for cam_config in &config.cameras {
        match CameraClient::connect(cam_config.clone(), &config.capture.session_dir).await {
            Ok(client) => {
                info!(camera = cam_config.name, "camera session ready");
                cams.insert(cam_config.id, client);
            }
            Err(e) => {
                error!(camera = cam_config.name, error = %e, "failed to open camera session");
                std::process::exit(1);
            }
        }
    }

    let (jobs_tx, jobs_rx) = mpsc::channel(JOB_QUEUE_DEPTH);
    let worker = worker::Worker::new(&config, cams);
    tokio::spawn(worker.run(jobs_rx));

    let state = Arc::new(routes::AppState {
        jobs: jobs_tx,
        config: config.clone(),
    });
    let app = routes::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr, "listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server exited with error");
    }
}
