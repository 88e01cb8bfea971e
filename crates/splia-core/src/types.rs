use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Connection & Subscription ────────────────────────────────────

/// WhatsApp link state as persisted on the account record.
/// Decoding never fails: a null or unrecognized column reads as disconnected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = SpliaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connected" | "conectado" => Ok(Self::Connected),
            "disconnected" | "desconectado" => Ok(Self::Disconnected),
            _ => Err(SpliaError::InvalidField {
                field: "connection",
                value: s.to_string(),
            }),
        }
    }
}

impl From<Option<String>> for ConnectionState {
    fn from(raw: Option<String>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

/// Same tolerance as [`ConnectionState`]: null or unknown reads as trial.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum SubscriptionState {
    #[default]
    Trial,
    Active,
    Blocked,
}

impl SubscriptionState {
    pub const ALL: [Self; 3] = [Self::Trial, Self::Active, Self::Blocked];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }

    /// Portuguese spelling some rows carry.
    fn alias(self) -> &'static str {
        match self {
            Self::Trial => "teste",
            Self::Active => "ativo",
            Self::Blocked => "bloqueado",
        }
    }

    /// Blocked accounts may only see the suspension page.
    pub fn allows_access(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionState {
    type Err = SpliaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == key || state.alias() == key)
            .ok_or_else(|| SpliaError::InvalidField {
                field: "subscription",
                value: s.to_string(),
            })
    }
}

impl From<Option<String>> for SubscriptionState {
    fn from(raw: Option<String>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

// ─── Session handle ───────────────────────────────────────────────

/// Gateway instance name correlating a pairing attempt with its live state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Returns `None` for blank handles, which the gateway cannot address.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Pairing image ────────────────────────────────────────────────

/// Base64 QR image as handed out by the onboarding webhook.
///
/// Accepts both bare base64 and `data:image/png;base64,...` URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingImage {
    raw: String,
}

impl PairingImage {
    pub fn new(raw: impl Into<String>) -> Result<Self, SpliaError> {
        let raw = raw.into().trim().to_string();
        let image = Self { raw };
        if image.base64_body().is_empty() {
            return Err(SpliaError::EmptyPairingImage);
        }
        Ok(image)
    }

    /// The stored form, data-URL prefix included.
    pub fn as_stored(&self) -> &str {
        &self.raw
    }

    /// The base64 payload without any data-URL prefix.
    pub fn base64_body(&self) -> &str {
        match self.raw.split_once(',') {
            Some((prefix, body)) if prefix.starts_with("data:") => body.trim(),
            _ => self.raw.as_str(),
        }
    }

    /// MIME type from a data URL, `image/png` otherwise.
    pub fn mime_type(&self) -> &str {
        self.raw
            .strip_prefix("data:")
            .and_then(|rest| rest.split([';', ',']).next())
            .filter(|mime| !mime.is_empty())
            .unwrap_or("image/png")
    }
}

// ─── Account record ───────────────────────────────────────────────

/// One row of the `lavanderias` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    #[serde(rename = "email_usuario")]
    pub owner_email: String,
    #[serde(rename = "nome_lavanderia", default)]
    pub display_name: Option<String>,
    #[serde(rename = "instance_name", default)]
    pub session_handle: Option<SessionHandle>,
    #[serde(rename = "whatsapp_status", default)]
    pub connection: ConnectionState,
    #[serde(rename = "status_assinatura", default)]
    pub subscription: SubscriptionState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Onboarding is complete once the laundromat has a non-blank name.
    pub fn is_onboarded(&self) -> bool {
        self.display_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

// ─── Error ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpliaError {
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("unknown route: {0}")]
    UnknownRoute(String),
    #[error("pairing image is empty")]
    EmptyPairingImage,
}

// ─── Tests ────────────────────────────────────────────────────────
