//! Home Assistant REST API as a sensor sink.
//!
//! Reads and writes go through `HA_URL` (the supervisor proxy by default) with
//! the supervisor token. The proxy has no DELETE for states, so deletes go
//! straight to Home Assistant Core with the long-lived `HA_TOKEN`; see
//! [`resolve_delete_base_url`].

use super::{Attributes, Sink, SinkError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const SENSOR_DOMAIN: &str = "sensor.";
const SUPERVISOR_INFO_URL: &str = "http://supervisor/homeassistant/info";
const FALLBACK_CORE_URL: &str = "http://homeassistant:8123";

pub struct HomeAssistantSink {
    client: Client,
    base_url: String,
    delete_base_url: String,
    token: Option<String>,
    delete_token: Option<String>,
}

impl HomeAssistantSink {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        delete_base_url: impl Into<String>,
        token: Option<String>,
        delete_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: trim_base(base_url.into()),
            delete_base_url: trim_base(delete_base_url.into()),
            token,
            delete_token,
        }
    }

    fn state_url(base: &str, id: &str) -> String {
        format!("{base}/api/states/{SENSOR_DOMAIN}{id}")
    }

    async fn send(&self, request: RequestBuilder, token: Option<&str>, target: &str) -> Result<reqwest::Response, SinkError> {
        let request = match token {
            Some(t) => request.bearer_auth(t),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| SinkError::Transport(format!("{target}: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct StateEntry {
    entity_id: Option<String>,
}

/// Sensor ids under `prefix`, without the `sensor.` domain.
pub fn matching_sensor_ids(entity_ids: impl IntoIterator<Item = String>, prefix: &str) -> Vec<String> {
    let full_prefix = format!("{SENSOR_DOMAIN}{prefix}");
    entity_ids
        .into_iter()
        .filter(|id| id.starts_with(&full_prefix))
        .map(|id| id[SENSOR_DOMAIN.len()..].to_string())
        .collect()
}

#[async_trait]
impl Sink for HomeAssistantSink {
    async fn list_entities(&self, id_prefix: &str) -> Result<Vec<String>, SinkError> {
        let url = format!("{}/api/states", self.base_url);
        let response = self.send(self.client.get(&url), self.token.as_deref(), "states").await?;
        if !response.status().is_success() {
            return Err(SinkError::Status { target: "states".into(), status: response.status().as_u16() });
        }
        let states: Vec<StateEntry> = response.json().await.map_err(|e| SinkError::Decode(e.to_string()))?;
        Ok(matching_sensor_ids(states.into_iter().filter_map(|s| s.entity_id), id_prefix))
    }

    async fn upsert_entity(&self, id: &str, state: &Value, attributes: &Attributes) -> Result<(), SinkError> {
        let url = Self::state_url(&self.base_url, id);
        let body = json!({ "state": state, "attributes": attributes });
        let response = self
            .send(self.client.post(&url).json(&body), self.token.as_deref(), id)
            .await?;
        if !response.status().is_success() {
            return Err(SinkError::Status { target: id.into(), status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), SinkError> {
        let url = Self::state_url(&self.delete_base_url, id);
        let response = self.send(self.client.delete(&url), self.delete_token.as_deref(), id).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(id, "sensor already gone");
                Ok(())
            }
            s => Err(SinkError::Status { target: id.into(), status: s.as_u16() }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupervisorInfo {
    #[serde(default)]
    data: SupervisorCoreInfo,
}

#[derive(Debug, Default, Deserialize)]
struct SupervisorCoreInfo {
    ip_address: Option<String>,
    port: Option<u16>,
}

/// Base URL used for DELETE calls.
///
/// 1. An explicitly configured `HA_URL` that is not the supervisor proxy.
/// 2. Home Assistant Core address as reported by the supervisor.
/// 3. `http://homeassistant:8123`.
pub async fn resolve_delete_base_url(
    client: &Client,
    ha_url: &str,
    ha_url_explicit: bool,
    supervisor_token: Option<&str>,
) -> String {
    if ha_url_explicit && !ha_url.contains("supervisor/core") {
        debug!("Using configured HA_URL for deletes: {ha_url}");
        return trim_base(ha_url.to_string());
    }

    let mut request = client.get(SUPERVISOR_INFO_URL);
    if let Some(token) = supervisor_token {
        request = request.bearer_auth(token);
    }
    match request.send().await {
        Ok(response) if response.status().is_success() => match response.json::<SupervisorInfo>().await {
            Ok(info) => {
                let ip = info.data.ip_address.unwrap_or_else(|| "homeassistant".into());
                let port = info.data.port.unwrap_or(8123);
                let url = format!("http://{ip}:{port}");
                debug!("Using Home Assistant Core URL for deletes from supervisor info: {url}");
                return url;
            }
            Err(e) => warn!("Unreadable Home Assistant info from supervisor: {e}"),
        },
        Ok(response) => warn!("Failed to fetch Home Assistant info from supervisor: {}", response.status()),
        Err(e) => warn!("Error while fetching Home Assistant info from supervisor: {e}"),
    }

    info!("Falling back to default Home Assistant Core URL for deletes: {FALLBACK_CORE_URL}");
    FALLBACK_CORE_URL.to_string()
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
