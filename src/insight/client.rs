//! HTTP client for the summarization endpoint.

use super::{InsightRequest, InsightResponse};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct InsightSettings {
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub show_progress: bool,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321/functions/v1/generate-insights".to_string(),
            api_key_env: "CELULAS_INSIGHT_KEY".to_string(),
            timeout_seconds: 120,
            show_progress: true,
        }
    }
}

pub struct InsightClient {
    settings: InsightSettings,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl InsightClient {
    pub fn new(settings: InsightSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() {
            debug!(
                "{} is not set, calling {} without a token",
                settings.api_key_env, settings.endpoint
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            settings,
            api_key,
            http_client,
        })
    }

    /// Send one request. Failures are returned as-is; there is no retry.
    pub async fn generate(&self, request: &InsightRequest) -> Result<InsightResponse> {
        info!(
            "Requesting {:?} for {} cells ({})",
            request.kind,
            request.data.len(),
            request.period
        );

        let spinner = self.spinner()?;

        let mut builder = self.http_client.post(&self.settings.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let result = self.send(builder).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        result
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<InsightResponse> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Request timed out after {}s", self.settings.timeout_seconds)
            } else if e.is_connect() {
                anyhow::anyhow!("Cannot connect to insight endpoint at {}", self.settings.endpoint)
            } else {
                anyhow::anyhow!("Failed to send request: {}", e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Insight API error {}: {}", status, body));
        }

        response
            .json()
            .await
            .context("Failed to parse insight response")
    }

    fn spinner(&self) -> Result<Option<ProgressBar>> {
        if !self.settings.show_progress {
            return Ok(None);
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        pb.set_message("Generating insight...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Ok(Some(pb))
    }
}
