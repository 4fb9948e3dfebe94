//! HTTP collector platform
//!
//! Posts each event as JSON to a collector endpoint:
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {api_key}
//! Content-Type: application/json
//!
//! {"source": "autotrack", "event": {...}}
//! ```
//!
//! Any non-2xx response is a failed delivery. Nothing is retried; the router
//! logs the failure and moves on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::Platform;
use crate::error::{Error, Result};
use crate::types::Event;

/// Connection settings for an [`HttpPlatform`].
#[derive(Debug, Clone, Deserialize)]
pub struct HttpPlatformConfig {
    /// Full URL events are posted to
    pub endpoint: String,

    /// Bearer token (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_http_timeout() -> u64 {
    10
}

impl HttpPlatformConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout_secs: default_http_timeout(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "platform endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "platform timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request body for the collector endpoint
#[derive(Serialize)]
struct TrackRequest<'a> {
    source: &'static str,
    event: &'a Event,
}

/// Platform that ships events to an HTTP collector.
pub struct HttpPlatform {
    name: String,
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpPlatform {
    /// Build the platform and its HTTP client.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(name: impl Into<String>, config: HttpPlatformConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            endpoint: config.endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn track(&self, event: &Event) -> Result<()> {
        let body = TrackRequest {
            source: "autotrack",
            event,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::delivery(&self.name, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(platform = %self.name, event = %event.name, "Event accepted");
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::delivery(
                &self.name,
                format!("API error ({}): {}", status, error_text),
            ))
        }
    }
}
