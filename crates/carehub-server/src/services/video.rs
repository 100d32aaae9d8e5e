//! Meeting links for online consultations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::VideoConfig;

/// Consultation length requested from the provider, in minutes.
const MEETING_DURATION_MINUTES: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("video provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("video provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait VideoConferencing: Send + Sync {
    /// Creates a meeting and returns its join URL.
    async fn create_meeting(&self, topic: &str, start: NaiveDateTime) -> Result<String, VideoError>;
}

/// Zoom server-to-server OAuth client.
pub struct ZoomClient {
    http_client: Client,
    account_id: String,
    client_id: String,
    client_secret: String,
    api_base_url: String,
    oauth_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct MeetingResponse {
    join_url: String,
}

impl ZoomClient {
    pub fn new(
        account_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_base_url: impl Into<String>,
        oauth_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VideoError> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            account_id: account_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            oauth_url: oauth_url.into(),
        })
    }

    /// Returns `None` unless all credentials are configured.
    pub fn from_config(config: &VideoConfig) -> Result<Option<Self>, VideoError> {
        let (Some(account_id), Some(client_id), Some(client_secret)) = (
            config.account_id.as_deref(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        ) else {
            return Ok(None);
        };
        if !config.is_configured() {
            return Ok(None);
        }
        Self::new(
            account_id,
            client_id,
            client_secret,
            &config.api_base_url,
            &config.oauth_url,
            config.timeout(),
        )
        .map(Some)
    }

    async fn access_token(&self) -> Result<String, VideoError> {
        let response = self
            .http_client
            .post(&self.oauth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.account_id.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}

#[async_trait]
impl VideoConferencing for ZoomClient {
    async fn create_meeting(&self, topic: &str, start: NaiveDateTime) -> Result<String, VideoError> {
        let token = self.access_token().await?;
        let body = json!({
            "topic": topic,
            "type": 2,
            "start_time": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "duration": MEETING_DURATION_MINUTES,
        });
        let response = self
            .http_client
            .post(format!("{}/v2/users/me/meetings", self.api_base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<MeetingResponse>().await?.join_url)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, VideoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(VideoError::Status {
        status: status.as_u16(),
        body,
    })
}

pub struct VideoService {
    provider: Option<Arc<dyn VideoConferencing>>,
}

impl VideoService {
    pub fn new(provider: Option<Arc<dyn VideoConferencing>>) -> Self {
        Self { provider }
    }

    /// Join URL for a consultation. Falls back to a generated placeholder
    /// link when the provider is unconfigured or fails.
    pub async fn meeting_link(&self, topic: &str, start: NaiveDateTime) -> String {
        if let Some(provider) = &self.provider {
            match provider.create_meeting(topic, start).await {
                Ok(url) => return url,
                Err(e) => tracing::warn!(error = %e, "Meeting creation failed, using placeholder link"),
            }
        }
        placeholder_link()
    }
}

fn placeholder_link() -> String {
    let meeting_id: u64 = rand::thread_rng().gen_range(1_000_000_000..10_000_000_000);
    format!("https://zoom.us/j/{meeting_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDateTime {
        carehub_core::slot_datetime("2099-01-02", "10:00").unwrap()
    }

    #[tokio::test]
    async fn unconfigured_service_returns_placeholder() {
        let link = VideoService::new(None).meeting_link("Consult", start()).await;
        let id = link.strip_prefix("https://zoom.us/j/").unwrap();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn from_config_requires_credentials() {
        assert!(ZoomClient::from_config(&VideoConfig::default()).unwrap().is_none());
    }
}
