//! WhatsApp gateway: live connection state of an instance.

use async_trait::async_trait;

use splia_core::SessionHandle;

use crate::error::{ClientError, check_status};

#[async_trait]
pub trait StatusGateway: Send + Sync {
    /// Raw state string reported for `handle` (e.g. `"open"`, `"connecting"`).
    async fn connection_state(&self, handle: &SessionHandle) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

pub struct HttpGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(http: reqwest::Client, config: GatewayConfig) -> Self {
        Self { http, config }
    }

    /// `GET {base}/instance/connectionState/{handle}` with the handle percent-encoded.
    pub(crate) fn state_url(&self, handle: &SessionHandle) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(["instance", "connectionState", handle.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl StatusGateway for HttpGateway {
    async fn connection_state(&self, handle: &SessionHandle) -> Result<String, ClientError> {
        let url = self.state_url(handle)?;
        let url_str = url.to_string();
        let mut request = self.http.get(url);
        if let Some(ref key) = self.config.api_key {
            request = request.header("apikey", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::request(&url_str, e))?;
        let body: serde_json::Value = check_status(&url_str, response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::decode(&url_str, e.to_string()))?;
        parse_state(&body).ok_or_else(|| ClientError::decode(&url_str, "no state field"))
    }
}

/// Accepts `{"instance": {"state": ..}}` and a flat `{"state": ..}`.
pub(crate) fn parse_state(body: &serde_json::Value) -> Option<String> {
    body["instance"]["state"]
        .as_str()
        .or_else(|| body["state"].as_str())
        .map(str::to_string)
}
