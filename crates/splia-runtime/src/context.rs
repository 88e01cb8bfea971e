//! Per-invocation context: configuration, HTTP client, and the explicit
//! signed-in session handed to protected commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

use splia_core::routes::guard;
use splia_core::{AccountRecord, Route};

use crate::backend::{BackendConfig, RecordStore, RestBackend};
use crate::cli::{Cli, default_state_dir};
use crate::gateway::{GatewayConfig, HttpGateway};
use crate::session::{Session, SessionStore};
use crate::storage::{INSTANCE_NAME_KEY, LocalStorage, PAIRING_IMAGE_KEY};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AppContext {
    pub http: reqwest::Client,
    pub backend: BackendConfig,
    pub gateway: GatewayConfig,
    pub webhook_url: Option<String>,
    pub state_dir: PathBuf,
    pub use_color: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("splia/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        if cli.backend_url == crate::cli::PLACEHOLDER_BACKEND_URL {
            tracing::warn!("SPLIA_BACKEND_URL not set; using placeholder backend");
        }
        Ok(Self {
            http,
            backend: BackendConfig {
                base_url: cli.backend_url.clone(),
                anon_key: cli.anon_key.clone(),
            },
            gateway: GatewayConfig {
                base_url: cli.gateway_url.clone(),
                api_key: cli.gateway_key.clone(),
            },
            webhook_url: cli.webhook_url.clone(),
            state_dir: cli.state_dir.clone().unwrap_or_else(default_state_dir),
            use_color: resolve_color(&cli.color),
        })
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(&self.state_dir)
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.state_dir)
    }

    /// The stored session, or an error telling the user to sign in.
    pub fn require_session(&self) -> anyhow::Result<Session> {
        self.sessions()
            .load(Utc::now())
            .context("not signed in; run `splia login` first")
    }

    pub fn backend(&self, session: Option<&Session>) -> RestBackend {
        let backend = RestBackend::new(self.http.clone(), self.backend.clone());
        match session {
            Some(s) => backend.with_session(s),
            None => backend,
        }
    }

    pub fn gateway(&self) -> HttpGateway {
        HttpGateway::new(self.http.clone(), self.gateway.clone())
    }

    /// Sign-out teardown: revoke server-side (best effort), then drop the
    /// stored session and everything onboarding left behind.
    pub async fn sign_out(&self) -> anyhow::Result<bool> {
        let sessions = self.sessions();
        let Some(session) = sessions.load(Utc::now()) else {
            sessions.clear().context("clearing session")?;
            return Ok(false);
        };
        if let Err(e) = self.backend(Some(&session)).sign_out().await {
            tracing::warn!(email = %session.email, "server-side sign-out failed: {e}");
        }
        sessions.clear().context("clearing session")?;
        let storage = self.storage();
        for key in [PAIRING_IMAGE_KEY, INSTANCE_NAME_KEY] {
            storage
                .remove(key)
                .with_context(|| format!("clearing {key}"))?;
        }
        tracing::info!(email = %session.email, "signed out");
        Ok(true)
    }
}

/// Resolve the route a protected command may render. The record lookup
/// failing is not fatal: the page renders without account data.
pub async fn enter(
    store: &dyn RecordStore,
    session: &Session,
    route: Route,
) -> (Route, Option<AccountRecord>) {
    let record = match store.fetch_account(&session.email).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(email = %session.email, "account lookup failed: {e}");
            None
        }
    };
    (guard(route, record.as_ref()), record)
}

pub fn resolve_color(color: &str) -> bool {
    use std::io::IsTerminal;
    match color {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use clap::Parser;
    use splia_core::SubscriptionState;

    use crate::error::ClientError;

    struct FixedStore(Result<Option<AccountRecord>, ()>);

    #[async_trait]
    impl RecordStore for FixedStore {
        async fn fetch_account(&self, _email: &str) -> Result<Option<AccountRecord>, ClientError> {
            self.0
                .clone()
                .map_err(|()| ClientError::MissingRecord("x".into()))
        }

        async fn mark_connected(&self, _email: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn record(subscription: SubscriptionState) -> AccountRecord {
        AccountRecord {
            id: "1".into(),
            owner_email: "dona@lava.com".into(),
            display_name: Some("Lava Bem".into()),
            session_handle: None,
            connection: Default::default(),
            subscription,
            created_at: None,
        }
    }

    fn session() -> Session {
        Session {
            access_token: "jwt".into(),
            refresh_token: None,
            user_id: "u".into(),
            email: "dona@lava.com".into(),
            remember_me: false,
            signed_in_at: Utc::now(),
        }
    }

    fn context(dir: &std::path::Path) -> AppContext {
        let cli = Cli::parse_from([
            "splia",
            "menu",
            "--state-dir",
            dir.to_str().expect("utf-8 path"),
            "--color",
            "never",
        ]);
        AppContext::from_cli(&cli).expect("context")
    }

    #[test]
    fn resolve_color_explicit() {
        assert!(resolve_color("always"));
        assert!(!resolve_color("never"));
    }

    #[test]
    fn require_session_without_login_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = context(dir.path()).require_session().unwrap_err();
        assert!(err.to_string().contains("not signed in"));
    }

    #[test]
    fn require_session_after_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path());
        ctx.sessions().save(&session()).expect("save");
        assert_eq!(
            ctx.require_session().expect("session").email,
            "dona@lava.com"
        );
        assert!(!ctx.use_color);
    }

    #[tokio::test]
    async fn sign_out_without_session_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path());
        ctx.storage()
            .set(PAIRING_IMAGE_KEY, "AAAA")
            .expect("set");
        assert!(!ctx.sign_out().await.expect("sign out"));
        // Nothing to tear down without a session.
        assert!(ctx.storage().get(PAIRING_IMAGE_KEY).expect("get").is_some());
    }

    #[tokio::test]
    async fn enter_blocks_protected_routes() {
        let store = FixedStore(Ok(Some(record(SubscriptionState::Blocked))));
        let (route, rec) = enter(&store, &session(), Route::Dashboard).await;
        assert_eq!(route, Route::SubscriptionBlocked);
        assert!(rec.is_some());
    }

    #[tokio::test]
    async fn enter_survives_lookup_failure() {
        let store = FixedStore(Err(()));
        let (route, rec) = enter(&store, &session(), Route::ConnectWhatsApp).await;
        assert_eq!(route, Route::ConnectWhatsApp);
        assert!(rec.is_none());
    }
}
