use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::cache::ReadCache;
use crate::config::ControlHubConfig;
use crate::types::{
    AnalyticsSnapshot, InboundEvents, MandateDraft, MandateRecord, PaymentPlan, Receipt, Toggles,
    TogglesUpdate, X402ConfigEnvelope, X402FacilitatorConfig, X402FacilitatorConfigUpdate,
};

/// Internal failure taxonomy. Every variant collapses to the same
/// user-visible outcome at the public boundary (reads return `None`,
/// writes return `false`); the operator's remedy is identical in all
/// cases, so no distinction is surfaced beyond the log line.
#[derive(Debug, Error)]
pub enum ControlApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("decode error: {0}")]
    Decode(String),
}

/// Facade over the control API. Constructed once from configuration and
/// passed by reference to every call site; holds the only shared state
/// (the read cache). Issues one request per operator action with a fixed
/// timeout, never retries automatically, and never lets a failure escape
/// as a panic or error.
pub struct ControlHubClient {
    base_url: String,
    read_timeout: Duration,
    write_timeout: Duration,
    cache: ReadCache,
    http: reqwest::Client,
}

impl ControlHubClient {
    #[must_use]
    pub fn new(config: &ControlHubConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(250)),
            write_timeout: Duration::from_millis(config.write_timeout_ms.max(250)),
            cache: ReadCache::new(Duration::from_millis(config.cache_ttl_ms)),
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(&ControlHubConfig::from_env())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        let trimmed = path.trim();
        if trimmed.starts_with('/') {
            format!("{}{}", self.base_url, trimmed)
        } else {
            format!("{}/{}", self.base_url, trimmed)
        }
    }

    // Path helpers, deterministic and shared with tests.

    #[must_use]
    pub fn health_path() -> &'static str {
        "/api/health"
    }

    #[must_use]
    pub fn toggles_path() -> &'static str {
        "/api/admin/toggles"
    }

    #[must_use]
    pub fn diagnostics_path() -> &'static str {
        "/api/admin/diagnostics"
    }

    #[must_use]
    pub fn execute_path() -> &'static str {
        "/api/execute"
    }

    #[must_use]
    pub fn receipts_path() -> &'static str {
        "/api/receipts"
    }

    #[must_use]
    pub fn mandates_path() -> &'static str {
        "/api/mandates"
    }

    #[must_use]
    pub fn mandate_revoke_path(id: i64) -> String {
        format!("/api/mandates/{id}")
    }

    #[must_use]
    pub fn analytics_path(window_minutes: u32) -> String {
        format!("/api/analytics?window={window_minutes}")
    }

    #[must_use]
    pub fn inbound_events_path() -> &'static str {
        "/api/webhooks/inbound"
    }

    #[must_use]
    pub fn x402_config_path() -> &'static str {
        "/api/admin/x402-config"
    }

    #[must_use]
    pub fn license_path() -> &'static str {
        "/api/admin/license"
    }

    #[must_use]
    pub fn receipts_csv_path() -> &'static str {
        "/api/export/receipts.csv"
    }

    // Generic read/write layer.

    /// GET `base + path` as JSON. Connectivity failures, non-2xx statuses,
    /// and malformed bodies all collapse to `None` with a warning; nothing
    /// raises past this boundary. Successful reads are cached by path for
    /// the configured TTL, so repeated calls inside the window skip the
    /// network round-trip.
    pub async fn fetch_json(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.cache.get(path) {
            tracing::debug!(path, "read served from cache");
            return Some(value);
        }
        match self.get_value(path).await {
            Ok(value) => {
                self.cache.put(path, value.clone());
                Some(value)
            }
            Err(error) => {
                tracing::warn!(path, %error, "unable to reach control api");
                None
            }
        }
    }

    /// [`fetch_json`](Self::fetch_json) followed by a validated decode into
    /// a typed DTO. A payload that fails to decode collapses to `None`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.fetch_json(path).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!(path, %error, "malformed control api payload");
                None
            }
        }
    }

    /// Uncached GET for non-JSON bodies (CSV export). Same failure
    /// collapsing as [`fetch_json`](Self::fetch_json).
    pub async fn fetch_text(&self, path: &str) -> Option<String> {
        match self.get_text(path).await {
            Ok(body) => Some(body),
            Err(error) => {
                tracing::warn!(path, %error, "unable to reach control api");
                None
            }
        }
    }

    /// POST a JSON body; `true` only on a 2xx response. A success clears
    /// the entire read cache so dependent views re-fetch; a failure logs
    /// and leaves the cache intact. No automatic retry and no idempotency
    /// key — the operator decides whether to resubmit.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> bool {
        self.write_json(Method::POST, path, body).await
    }

    /// PUT counterpart of [`post_json`](Self::post_json).
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> bool {
        self.write_json(Method::PUT, path, body).await
    }

    // Typed operations, one per dashboard action.

    /// Liveness probe; `false` gates most operator affordances.
    pub async fn health(&self) -> bool {
        self.fetch_json(Self::health_path()).await.is_some()
    }

    pub async fn toggles(&self) -> Option<Toggles> {
        self.fetch_as(Self::toggles_path()).await
    }

    pub async fn save_toggles(&self, update: &TogglesUpdate) -> bool {
        self.put_json(Self::toggles_path(), update).await
    }

    /// Triggers a full end-to-end synthetic payment run server-side.
    pub async fn run_diagnostics(&self) -> bool {
        self.post_json(Self::diagnostics_path(), &json!({})).await
    }

    /// Submits mandate and intent in a single combined body; atomicity of
    /// the pair is the backend's responsibility.
    pub async fn execute_payment(&self, plan: &PaymentPlan) -> bool {
        self.post_json(Self::execute_path(), plan).await
    }

    pub async fn receipts(&self) -> Option<Vec<Receipt>> {
        self.fetch_as(Self::receipts_path()).await
    }

    pub async fn mandates(&self) -> Option<Vec<MandateRecord>> {
        self.fetch_as(Self::mandates_path()).await
    }

    pub async fn issue_mandate(&self, draft: &MandateDraft) -> bool {
        self.post_json(Self::mandates_path(), draft).await
    }

    /// Revocation is a POST to the per-id sub-path with an empty body.
    pub async fn revoke_mandate(&self, id: i64) -> bool {
        self.post_json(&Self::mandate_revoke_path(id), &json!({}))
            .await
    }

    pub async fn analytics(&self, window_minutes: u32) -> Option<AnalyticsSnapshot> {
        self.fetch_as(&Self::analytics_path(window_minutes)).await
    }

    pub async fn inbound_events(&self) -> Option<Vec<Value>> {
        self.fetch_as::<InboundEvents>(Self::inbound_events_path())
            .await
            .map(|wrapper| wrapper.events)
    }

    /// Facilitator settings, redacted by the backend. `None` covers both
    /// an unreachable API and a backend with nothing configured yet.
    pub async fn x402_config(&self) -> Option<X402FacilitatorConfig> {
        self.fetch_as::<X402ConfigEnvelope>(Self::x402_config_path())
            .await
            .and_then(|envelope| envelope.config)
    }

    pub async fn save_x402_config(&self, update: &X402FacilitatorConfigUpdate) -> bool {
        self.post_json(Self::x402_config_path(), update).await
    }

    pub async fn rotate_license(&self, key: &str) -> bool {
        self.put_json(Self::license_path(), &json!({ "key": key }))
            .await
    }

    pub async fn export_receipts_csv(&self) -> Option<String> {
        self.fetch_text(Self::receipts_csv_path()).await
    }

    // Transport plumbing.

    async fn write_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> bool {
        match self.send_write(method, path, body).await {
            Ok(()) => {
                self.cache.clear();
                tracing::debug!(path, "write succeeded, read cache cleared");
                true
            }
            Err(error) => {
                tracing::error!(path, %error, "control api write failed");
                false
            }
        }
    }

    async fn send_write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ControlApiError> {
        let response = self
            .http
            .request(method, self.endpoint(path))
            .header("x-request-id", request_id())
            .timeout(self.write_timeout)
            .json(body)
            .send()
            .await
            .map_err(|error| ControlApiError::Transport(error.to_string()))?;
        successful_body(response).await.map(|_| ())
    }

    async fn get_value(&self, path: &str) -> Result<Value, ControlApiError> {
        let bytes = self.get_bytes(path).await?;
        serde_json::from_slice(&bytes).map_err(|error| ControlApiError::Decode(error.to_string()))
    }

    async fn get_text(&self, path: &str) -> Result<String, ControlApiError> {
        let bytes = self.get_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ControlApiError> {
        let response = self
            .http
            .get(self.endpoint(path))
            .header("x-request-id", request_id())
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|error| ControlApiError::Transport(error.to_string()))?;
        successful_body(response).await
    }
}

async fn successful_body(response: reqwest::Response) -> Result<Vec<u8>, ControlApiError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| ControlApiError::Transport(error.to_string()))?;
    if !status.is_success() {
        return Err(ControlApiError::Http {
            status,
            body: String::from_utf8_lossy(&bytes).trim().to_string(),
        });
    }
    Ok(bytes.to_vec())
}

fn request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{ControlApiError, ControlHubClient};
    use crate::config::ControlHubConfig;

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = ControlHubClient::new(&ControlHubConfig::new("http://hub.example.com/"));
        assert_eq!(
            client.endpoint("/api/health"),
            "http://hub.example.com/api/health"
        );
        assert_eq!(
            client.endpoint("api/health"),
            "http://hub.example.com/api/health"
        );
    }

    #[test]
    fn path_helpers_are_deterministic() {
        assert_eq!(ControlHubClient::health_path(), "/api/health");
        assert_eq!(ControlHubClient::toggles_path(), "/api/admin/toggles");
        assert_eq!(
            ControlHubClient::mandate_revoke_path(123),
            "/api/mandates/123"
        );
        assert_eq!(
            ControlHubClient::analytics_path(60),
            "/api/analytics?window=60"
        );
        assert_eq!(
            ControlHubClient::inbound_events_path(),
            "/api/webhooks/inbound"
        );
        assert_eq!(
            ControlHubClient::receipts_csv_path(),
            "/api/export/receipts.csv"
        );
    }

    #[test]
    fn http_error_keeps_status_and_body() {
        let error = ControlApiError::Http {
            status: StatusCode::NOT_FOUND,
            body: "missing".to_string(),
        };
        assert_eq!(error.to_string(), "http 404 Not Found: missing");
    }
}
