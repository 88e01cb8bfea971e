//! Hosted record store: password auth (`/auth/v1`) and the `lavanderias`
//! table (`/rest/v1`).

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use splia_core::metrics::DashboardMetrics;
use splia_core::{AccountRecord, ConnectionState};

use crate::error::{ClientError, check_status};
use crate::session::Session;

pub const ACCOUNTS_TABLE: &str = "lavanderias";
pub const METRICS_VIEW: &str = "metricas";

/// Account lookup and the single write the pairing flow performs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the account owned by `email`. `Ok(None)` when no row exists.
    async fn fetch_account(&self, email: &str) -> Result<Option<AccountRecord>, ClientError>;

    /// Flip the account's WhatsApp status to connected.
    async fn mark_connected(&self, email: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: String,
}

pub struct RestBackend {
    http: reqwest::Client,
    config: BackendConfig,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl RestBackend {
    pub fn new(http: reqwest::Client, config: BackendConfig) -> Self {
        Self {
            http,
            config,
            access_token: None,
        }
    }

    /// Requests carry the user's token instead of the anon key as bearer.
    #[must_use]
    pub fn with_session(mut self, session: &Session) -> Self {
        self.access_token = Some(session.access_token.clone());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(self.config.anon_key.as_str());
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<Session, ClientError> {
        let url = self.url("/auth/v1/token?grant_type=password");
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ClientError::request(&url, e))?;

        let status = response.status();
        if status.is_client_error() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(ClientError::Auth(auth_error_message(&body)));
        }
        let response = check_status(&url, response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::decode(&url, e.to_string()))?;

        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            remember_me,
            signed_in_at: Utc::now(),
        })
    }

    /// Revoke the token server-side. Local teardown happens regardless.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let url = self.url("/auth/v1/logout");
        let response = self
            .authed(self.http.post(&url))
            .send()
            .await
            .map_err(|e| ClientError::request(&url, e))?;
        check_status(&url, response).await?;
        Ok(())
    }

    /// Dashboard numbers; a missing view reads as all zeros.
    pub async fn fetch_metrics(&self, email: &str) -> Result<DashboardMetrics, ClientError> {
        let url = self.url(&format!("/rest/v1/{METRICS_VIEW}"));
        let response = self
            .authed(self.http.get(&url))
            .query(&[
                ("email_usuario", format!("eq.{email}")),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::request(&url, e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(DashboardMetrics::default());
        }
        let rows: Vec<DashboardMetrics> = check_status(&url, response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::decode(&url, e.to_string()))?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }
}

#[async_trait]
impl RecordStore for RestBackend {
    async fn fetch_account(&self, email: &str) -> Result<Option<AccountRecord>, ClientError> {
        let url = self.url(&format!("/rest/v1/{ACCOUNTS_TABLE}"));
        let response = self
            .authed(self.http.get(&url))
            .query(&[
                ("email_usuario", format!("eq.{email}")),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::request(&url, e))?;
        let rows: Vec<serde_json::Value> = check_status(&url, response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::decode(&url, e.to_string()))?;
        first_account(&url, rows)
    }

    async fn mark_connected(&self, email: &str) -> Result<(), ClientError> {
        let url = self.url(&format!("/rest/v1/{ACCOUNTS_TABLE}"));
        let response = self
            .authed(self.http.patch(&url))
            .query(&[("email_usuario", format!("eq.{email}"))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "whatsapp_status": ConnectionState::Connected }))
            .send()
            .await
            .map_err(|e| ClientError::request(&url, e))?;
        check_status(&url, response).await?;
        Ok(())
    }
}

fn first_account(
    url: &str,
    rows: Vec<serde_json::Value>,
) -> Result<Option<AccountRecord>, ClientError> {
    match rows.into_iter().next() {
        None => Ok(None),
        Some(row) => serde_json::from_value(row)
            .map(Some)
            .map_err(|e| ClientError::decode(url, e.to_string())),
    }
}

/// Human message for a rejected sign-in.
pub(crate) fn auth_error_message(body: &serde_json::Value) -> String {
    let raw = ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| body[*k].as_str())
        .unwrap_or("unknown error");
    if raw == "Invalid login credentials" {
        "Email ou senha incorretos".to_string()
    } else {
        raw.to_string()
    }
}
