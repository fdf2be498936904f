//! HTTP client for the admin log API.
//!
//! Authenticates with basic auth (integration key / secret key). Two
//! endpoint generations are exposed: v1 endpoints only filter by `mintime`,
//! v2 endpoints paginate with an opaque `next_offset` token and wrap their
//! records in a per-endpoint items field.

use crate::source::{AdminLogSource, LogType, PageQuery, PageResponse};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct V1Envelope {
    response: Vec<Value>,
}

#[derive(Deserialize)]
struct V2Envelope {
    response: V2Body,
}

#[derive(Deserialize, Default)]
struct V2Body {
    #[serde(default)]
    authlogs: Vec<Value>,
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    metadata: V2Metadata,
}

#[derive(Deserialize, Default)]
struct V2Metadata {
    #[serde(default)]
    next_offset: Option<String>,
}

/// Client for the admin log API.
pub struct AdminApiClient {
    base_url: String,
    integration_key: String,
    secret_key: String,
    http_client: Client,
}

impl AdminApiClient {
    /// Create a client for an API hostname (e.g. "api.example.com").
    pub fn new(hostname: &str, integration_key: String, secret_key: String) -> Result<Self> {
        Self::with_base_url(format!("https://{}", hostname), integration_key, secret_key)
    }

    /// Create a client with a full base URL (for testing with a mock server).
    pub fn with_base_url(
        base_url: String,
        integration_key: String,
        secret_key: String,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("siphon-connector/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url,
            integration_key,
            secret_key,
            http_client,
        })
    }

    fn v1_path(log_type: LogType) -> Result<&'static str> {
        match log_type {
            LogType::Administration => Ok("admin/v1/logs/administrator"),
            LogType::Offline => Ok("admin/v1/logs/offline_enrollment"),
            other => bail!("'{}' is not a v1 (time-cursor) log type", other),
        }
    }

    fn v2_path(log_type: LogType) -> Result<&'static str> {
        match log_type {
            LogType::Authentication => Ok("admin/v2/logs/authentication"),
            LogType::Telephony => Ok("admin/v2/logs/telephony"),
            other => bail!("'{}' is not a v2 (offset-cursor) log type", other),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.integration_key, Some(&self.secret_key))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        check_response_status(&response)?;
        Ok(response)
    }
}

#[async_trait]
impl AdminLogSource for AdminApiClient {
    async fn fetch_since(&self, log_type: LogType, min_time: i64) -> Result<Vec<Value>> {
        let path = Self::v1_path(log_type)?;
        let response = self
            .get(path, &[("mintime", min_time.to_string())])
            .await?;

        let envelope: V1Envelope = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", log_type))?;

        Ok(envelope.response)
    }

    async fn fetch_page(&self, log_type: LogType, query: PageQuery) -> Result<PageResponse> {
        let path = Self::v2_path(log_type)?;

        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("sort", "ts:asc".to_string()),
        ];
        match (&query.next_offset, query.min_time) {
            (Some(offset), _) => params.push(("next_offset", offset.clone())),
            (None, min_time) => params.push(("mintime", min_time.unwrap_or(0).to_string())),
        }

        let response = self.get(path, &params).await?;

        let envelope: V2Envelope = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", log_type))?;

        let items = match log_type {
            LogType::Authentication => envelope.response.authlogs,
            _ => envelope.response.items,
        };

        Ok(PageResponse {
            items,
            next_offset: envelope.response.metadata.next_offset,
        })
    }
}

/// Check the response status and map known error codes to descriptive errors.
///
/// - 401 → auth error (bad integration or secret key)
/// - 429 → rate limit exceeded
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!(
            "Admin API auth error: integration or secret key rejected"
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Admin API rate limit exceeded")),
        s if !s.is_success() => Err(anyhow!("Admin API error: {}", s)),
        _ => Ok(()),
    }
}
