use super::{decode_hosts, DiscoveryError, DiscoverySource};
use crate::models::{HostRecord, Measurement, SpeedtestResults};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

const HOSTS_PATH: &str = "/v1/hosts";
const SPEEDTEST_PATH: &str = "/v1/speedtest";

/// Polls a JSON bridge exposing the box's host list and speed test results.
///
/// 401/403 answers are authentication failures; anything else that is not a
/// success is transient.
pub struct HttpDiscovery {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpDiscovery {
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url, token }
    }

    async fn get_json(&self, path: &str) -> Result<Value, DiscoveryError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DiscoveryError::Transient(format!("{url}: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(DiscoveryError::Authentication(format!("{url}: {}", response.status())))
            }
            s if !s.is_success() => Err(DiscoveryError::Transient(format!("{url}: {s}"))),
            _ => response
                .json()
                .await
                .map_err(|e| DiscoveryError::Transient(format!("{url}: invalid JSON: {e}"))),
        }
    }
}

#[async_trait]
impl DiscoverySource for HttpDiscovery {
    async fn list_hosts(&self) -> Result<Vec<HostRecord>, DiscoveryError> {
        decode_hosts(self.get_json(HOSTS_PATH).await?)
    }

    async fn latest_speedtest(&self) -> Result<Option<Measurement>, DiscoveryError> {
        let body = self.get_json(SPEEDTEST_PATH).await?;
        // An unexpected shape means there is nothing new to report.
        let results: SpeedtestResults = serde_json::from_value(body).unwrap_or_default();
        Ok(results.latest())
    }
}
