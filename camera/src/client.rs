use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use vigil_common::config::CameraConfig;

use crate::stream::MjpegAssembler;

/// Vendor response code signalling an expired session token.
const EXPIRED_TOKEN_CODE: i32 = -6;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vendor error {code}: {detail}")]
    Vendor { code: i32, detail: String },
    #[error("login reply did not contain a token")]
    MissingToken,
    #[error("unrecognized camera reply")]
    UnknownReply,
    #[error("failed to decode camera frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("camera stream ended after {got} of {want} frames")]
    StreamTruncated { got: usize, want: usize },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct VendorReply {
    value: Option<VendorValue>,
    error: Option<VendorError>,
}

#[derive(Debug, Deserialize)]
struct VendorValue {
    #[serde(rename = "Token")]
    token: Option<VendorToken>,
}

#[derive(Debug, Deserialize)]
struct VendorToken {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    detail: String,
    #[serde(rename = "rspCode")]
    rsp_code: i32,
}

/// One camera's HTTP session. Owns the vendor token and renews it when the
/// camera reports it expired; the processing pipeline never sees a token.
pub struct CameraClient {
    http: reqwest::Client,
    config: CameraConfig,
    token: String,
    token_path: PathBuf,
    /// Anti-cache query salt, regenerated per session.
    rs: String,
}

impl CameraClient {
    /// Build a session for `config`, reusing a cached token from
    /// `session_dir` when one exists, logging in otherwise.
    pub async fn connect(config: CameraConfig, session_dir: &str) -> Result<Self, CameraError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let token_path =
            PathBuf::from(session_dir).join(format!("{}_{}", config.id, config.name));
        let rs = format!("{:x}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));

        let mut client = Self {
            http,
            config,
            token: String::new(),
            token_path,
            rs,
        };

        match tokio::fs::read_to_string(&client.token_path).await {
            Ok(cached) => {
                info!(
                    camera = client.config.name,
                    "reusing cached session token"
                );
                client.token = cached.trim().to_string();
            }
            Err(_) => {
                client.login().await?;
            }
        }

        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Slack channel configured to receive this camera's alerts.
    pub fn slack_channel(&self) -> &str {
        &self.config.slack_channel
    }

    fn api_url(&self) -> String {
        format!("http://{}/cgi-bin/api.cgi", self.config.host)
    }

    /// Obtain a fresh session token and persist it for the next run.
    async fn login(&mut self) -> Result<(), CameraError> {
        info!(camera = self.config.name, "requesting new session token");
        let body = json!([{
            "cmd": "Login",
            "param": {
                "User": {
                    "Version": "0",
                    "userName": self.config.username,
                    "password": self.config.password,
                }
            }
        }]);

        let replies: Vec<VendorReply> = self
            .http
            .post(format!("{}?cmd=Login", self.api_url()))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let reply = replies.first().ok_or(CameraError::UnknownReply)?;
        if let Some(err) = &reply.error {
            return Err(CameraError::Vendor {
                code: err.rsp_code,
                detail: err.detail.clone(),
            });
        }
        let token = reply
            .value
            .as_ref()
            .and_then(|v| v.token.as_ref())
            .ok_or(CameraError::MissingToken)?;
        self.token = token.name.clone();

        if let Some(dir) = self.token_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.token_path, &self.token).await?;
        debug!(
            camera = self.config.name,
            path = self.token_path.display().to_string(),
            "session token persisted"
        );
        Ok(())
    }

    /// Fetch one JPEG snapshot. An expired token is renewed once; every
    /// other vendor error propagates untouched.
    async fn snap_jpeg(&mut self) -> Result<Vec<u8>, CameraError> {
        let mut renewed = false;
        loop {
            let url = format!(
                "{}?cmd=Snap&channel={}&rs={}&token={}",
                self.api_url(),
                self.config.channel,
                self.rs,
                self.token
            );
            let bytes = self.http.get(&url).send().await?.bytes().await?;

            if bytes.starts_with(&JPEG_SOI) {
                return Ok(bytes.to_vec());
            }

            // Not an image: the camera answered with its JSON error envelope.
            let replies: Vec<VendorReply> =
                serde_json::from_slice(&bytes).map_err(|_| CameraError::UnknownReply)?;
            let err = replies
                .first()
                .and_then(|r| r.error.as_ref())
                .ok_or(CameraError::UnknownReply)?;

            if err.rsp_code == EXPIRED_TOKEN_CODE && !renewed {
                warn!(
                    camera = self.config.name,
                    "snap rejected, token likely expired; renewing"
                );
                self.login().await?;
                renewed = true;
                continue;
            }
            return Err(CameraError::Vendor {
                code: err.rsp_code,
                detail: err.detail.clone(),
            });
        }
    }

    /// Take `count` snapshots, decoded and downscaled to `target_width`.
    pub async fn snap_frames(
        &mut self,
        count: usize,
        target_width: u32,
    ) -> Result<Vec<RgbImage>, CameraError> {
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            debug!(camera = self.config.name, snap = i + 1, "taking snapshot");
            let jpeg = self.snap_jpeg().await?;
            frames.push(decode_frame(&jpeg, target_width)?);
        }
        Ok(frames)
    }

    /// Collect `count` consecutive frames from the camera's MJPEG stream,
    /// decoded and downscaled to `target_width`. The stream closing early is
    /// an error; the caller decides whether a shorter capture is acceptable.
    pub async fn stream_frames(
        &mut self,
        count: usize,
        target_width: u32,
    ) -> Result<Vec<RgbImage>, CameraError> {
        let url = format!(
            "http://{}{}",
            self.config.host,
            self.config.stream_path
        );
        info!(camera = self.config.name, count, "collecting stream frames");

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let mut byte_stream = response.bytes_stream();
        let mut assembler = MjpegAssembler::new();
        let mut frames = Vec::with_capacity(count);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            for jpeg in assembler.push(&chunk) {
                frames.push(decode_frame(&jpeg, target_width)?);
                if frames.len() == count {
                    debug!(camera = self.config.name, "frame collection complete");
                    return Ok(frames);
                }
            }
        }

        Err(CameraError::StreamTruncated {
            got: frames.len(),
            want: count,
        })
    }
}

/// Decode a JPEG and downscale it to `target_width`, preserving aspect
/// ratio. Frames already narrow enough pass through at native size.
fn decode_frame(jpeg: &[u8], target_width: u32) -> Result<RgbImage, CameraError> {
    let decoded = ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()?
        .decode()?
        .to_rgb8();

    if decoded.width() <= target_width || target_width == 0 {
        return Ok(decoded);
    }
    let ratio = decoded.width() as f64 / target_width as f64;
    let target_height = (decoded.height() as f64 / ratio).round() as u32;
    Ok(image::imageops::resize(
        &decoded,
        target_width,
        target_height.max(1),
        FilterType::Triangle,
    ))
}
