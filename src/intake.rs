//! Downstream intake forwarding.
//!
//! Workers hand the intake an ordered list of serialized records and get
//! back the accepted event ids. Failure semantics are opaque here: any
//! error is fatal for the calling worker cycle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Forwards batches of serialized records to the intake.
#[async_trait]
pub trait EventForwarder: Send + Sync {
    /// Pushes an ordered batch; returns the ids the intake accepted.
    async fn push_events(&self, events: Vec<String>) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    intake_key: &'a str,
    jsons: Vec<String>,
}

#[derive(Deserialize)]
struct BatchResponse {
    event_ids: Vec<String>,
}

/// HTTP client for the intake batch endpoint.
pub struct IntakeClient {
    base_url: String,
    intake_key: String,
    http_client: reqwest::Client,
}

impl IntakeClient {
    pub fn new(base_url: String, intake_key: String) -> Self {
        Self {
            base_url,
            intake_key,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventForwarder for IntakeClient {
    async fn push_events(&self, events: Vec<String>) -> Result<Vec<String>> {
        let url = format!("{}/batch", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&BatchRequest {
                intake_key: &self.intake_key,
                jsons: events,
            })
            .send()
            .await
            .context("Failed to send batch to intake")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            anyhow::bail!("Intake returned error status {}: {}", status, body);
        }

        let batch_response: BatchResponse = response
            .json()
            .await
            .context("Failed to parse intake response")?;

        Ok(batch_response.event_ids)
    }
}
