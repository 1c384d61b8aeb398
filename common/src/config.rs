use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub slack: SlackConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub cameras: Vec<CameraConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub bot_token: String,
    /// Optional channel that receives every animation, overriding the
    /// per-camera channel.
    #[serde(default)]
    pub gif_channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_target_width")]
    pub target_width: u32,
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    #[serde(default = "default_take_seconds")]
    pub take_seconds: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: u8,
    #[serde(default = "default_min_contour_area")]
    pub min_contour_area: f64,
    #[serde(default = "default_max_contour_area")]
    pub max_contour_area: f64,
    /// Animations whose average contour count per frame falls below this
    /// value are not delivered.
    #[serde(default = "default_activity_threshold")]
    pub activity_threshold: f64,
    #[serde(default = "default_gif_mode")]
    pub gif_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub id: u8,
    pub name: String,
    /// Host or host:port of the camera's HTTP interface.
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub channel: u32,
    /// Path of the camera's MJPEG stream endpoint.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    /// Slack channel that receives this camera's alerts.
    pub slack_channel: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_width: default_target_width(),
            session_dir: default_session_dir(),
            take_seconds: default_take_seconds(),
            fps: default_fps(),
            quality: default_quality(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            diff_threshold: default_diff_threshold(),
            min_contour_area: default_min_contour_area(),
            max_contour_area: default_max_contour_area(),
            activity_threshold: default_activity_threshold(),
            gif_mode: default_gif_mode(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    pub fn camera(&self, cam_id: u8) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == cam_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5007
}
fn default_target_width() -> u32 {
    640
}
fn default_session_dir() -> String {
    ".sessions".into()
}
fn default_take_seconds() -> u32 {
    5
}
fn default_fps() -> u32 {
    10
}
fn default_quality() -> u8 {
    35
}
fn default_diff_threshold() -> u8 {
    20
}
fn default_min_contour_area() -> f64 {
    200.0
}
fn default_max_contour_area() -> f64 {
    90_000.0
}
fn default_activity_threshold() -> f64 {
    0.1
}
fn default_gif_mode() -> String {
    "optimized".into()
}
fn default_stream_path() -> String {
    "/cgi-bin/mjpeg".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"
        [slack]
        bot_token = "xoxb-test"

        [[cameras]]
        id = 2
        name = "porch"
        host = "192.168.1.2"
        username = "admin"
        password = "hunter2"
        slack_channel = "#porch-alerts"
    "##;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 5007);
        assert_eq!(config.capture.target_width, 640);
        assert_eq!(config.motion.diff_threshold, 20);
        assert_eq!(config.motion.min_contour_area, 200.0);
        assert_eq!(config.motion.max_contour_area, 90_000.0);
        assert_eq!(config.motion.gif_mode, "optimized");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cameras.len(), 1);
        assert_eq!(config.cameras[0].channel, 0);
        assert!(config.slack.gif_channel.is_none());
    }

    #[test]
    fn camera_lookup_by_id() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.camera(2).unwrap().name, "porch");
        assert!(config.camera(9).is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let toml_str =
            format!("{MINIMAL}\n[motion]\ndiff_threshold = 35\ngif_mode = \"normal\"\n");
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.motion.diff_threshold, 35);
        assert_eq!(config.motion.gif_mode, "normal");
        // Untouched fields in the same section still default.
        assert_eq!(config.motion.max_contour_area, 90_000.0);
    }

    #[test]
    fn missing_slack_section_is_an_error() {
        let result: Result<Config, _> = toml::from_str("[[cameras]]\nid = 1\n");
        assert!(result.is_err());
    }
}
