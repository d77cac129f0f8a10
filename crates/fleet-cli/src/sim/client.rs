//! HTTP client for the fleet server tracking API.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use fleet_core::models::{LocationReport, TrackingEvent};

#[derive(Debug, Serialize)]
struct BatchBody<'a> {
    updates: &'a [LocationReport],
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    event: &'a TrackingEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Part of the batch response the simulator reports on.
#[derive(Debug, Deserialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub progress: f64,
    #[serde(default)]
    pub anomalies: usize,
}

#[derive(Debug, Deserialize)]
pub struct EventSummary {
    pub event_id: String,
    pub shipment_status: String,
}

pub struct FleetClient {
    client: Client,
    base_url: String,
}

impl FleetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn post_batch(
        &self,
        shipment_id: &str,
        updates: &[LocationReport],
    ) -> Result<BatchSummary> {
        let url = format!("{}/v1/shipments/{}/locations/batch", self.base_url, shipment_id);
        let response = self
            .client
            .post(&url)
            .json(&BatchBody { updates })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let response = ensure_success(response).await?;
        response.json().await.context("decode batch response")
    }

    pub async fn post_event(
        &self,
        shipment_id: &str,
        event: &TrackingEvent,
        description: Option<&str>,
    ) -> Result<EventSummary> {
        let url = format!("{}/v1/shipments/{}/events", self.base_url, shipment_id);
        let response = self
            .client
            .post(&url)
            .json(&EventBody { event, description })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let response = ensure_success(response).await?;
        response.json().await.context("decode event response")
    }
}

/// Turn an error status into an error carrying the server's message.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("server returned {}: {}", status, body)
}
