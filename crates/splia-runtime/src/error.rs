//! Error types for the HTTP boundary (record store, gateway, webhook).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {url}: {detail}")]
    Decode { url: String, detail: String },

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("sign-in rejected: {0}")]
    Auth(String),

    #[error("account has no WhatsApp instance yet")]
    MissingHandle,

    #[error("no account record for {0}")]
    MissingRecord(String),
}

impl ClientError {
    pub(crate) fn request(url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn decode(url: &str, detail: impl Into<String>) -> Self {
        Self::Decode {
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}

/// Turn a non-2xx response into [`ClientError::Status`], keeping the body for logs.
pub(crate) async fn check_status(
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: truncate(body.trim(), 200),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate("not found", 200), "not found");
    }

    #[test]
    fn truncate_long_bodies_on_char_boundary() {
        let body = "ã".repeat(300);
        let out = truncate(&body, 200);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn status_display() {
        let err = ClientError::Status {
            url: "https://x/rest/v1/lavanderias".into(),
            status: 401,
            body: "JWT expired".into(),
        };
        assert_eq!(
            err.to_string(),
            "https://x/rest/v1/lavanderias returned HTTP 401: JWT expired"
        );
    }
}
