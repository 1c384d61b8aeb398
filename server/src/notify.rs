use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("slack request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack rejected the call: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct UploadTicket {
    ok: bool,
    error: Option<String>,
    upload_url: Option<String>,
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackAck {
    ok: bool,
    error: Option<String>,
}

/// Delivers annotated output to Slack via the external-upload flow:
/// reserve an upload URL, POST the bytes, then complete against a channel.
pub struct SlackNotifier {
    http: reqwest::Client,
    bot_token: String,
}

impl SlackNotifier {
    pub fn new(bot_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
        }
    }

    pub async fn upload(
        &self,
        channel: &str,
        filename: &str,
        data: Vec<u8>,
        comment: &str,
    ) -> Result<(), NotifyError> {
        let length = data.len();
        let ticket: UploadTicket = self
            .http
            .get("https://slack.com/api/files.getUploadURLExternal")
            .bearer_auth(&self.bot_token)
            .query(&[("filename", filename), ("length", &length.to_string())])
            .send()
            .await?
            .json()
            .await?;
        if !ticket.ok {
            return Err(NotifyError::Api(
                ticket.error.unwrap_or_else(|| "unknown".into()),
            ));
        }
        let (upload_url, file_id) = ticket
            .upload_url
            .zip(ticket.file_id)
            .ok_or_else(|| NotifyError::Api("upload ticket missing url or id".into()))?;
        debug!(filename, length, "upload URL reserved");

        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        self.http
            .post(&upload_url)
            .multipart(multipart::Form::new().part("file", part))
            .send()
            .await?
            .error_for_status()?;

        let complete = json!({
            "files": [{ "id": file_id, "title": filename }],
            "channel_id": channel,
            "initial_comment": comment,
        });
        let ack: SlackAck = self
            .http
            .post("https://slack.com/api/files.completeUploadExternal")
            .bearer_auth(&self.bot_token)
            .json(&complete)
            .send()
            .await?
            .json()
            .await?;
        if !ack.ok {
            return Err(NotifyError::Api(
                ack.error.unwrap_or_else(|| "unknown".into()),
            ));
        }

        info!(channel, filename, bytes = length, "upload delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_reply_parses() {
        let body = r#"{"ok":true,"upload_url":"https://files.slack.com/u/abc","file_id":"F123"}"#;
        let ticket: UploadTicket = serde_json::from_str(body).unwrap();
        assert!(ticket.ok);
        assert_eq!(ticket.file_id.as_deref(), Some("F123"));
    }

    #[test]
    fn error_reply_parses() {
        let body = r#"{"ok":false,"error":"invalid_auth"}"#;
        let ack: SlackAck = serde_json::from_str(body).unwrap();
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid_auth"));
    }
}
