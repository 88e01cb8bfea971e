//! `splia dashboard` and `splia subscription`.

use chrono::Utc;

use splia_core::Route;
use splia_core::metrics::stat_cards;
use splia_core::plans::plan_status;

use crate::backend::RestBackend;
use crate::context::{AppContext, enter};
use crate::display;
use crate::session::Session;

pub async fn cmd_dashboard(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.require_session()?;
    let backend = ctx.backend(Some(&session));
    show_dashboard(ctx, &backend, &session).await
}

pub(crate) async fn show_dashboard(
    ctx: &AppContext,
    backend: &RestBackend,
    session: &Session,
) -> anyhow::Result<()> {
    let (route, record) = enter(backend, session, Route::Dashboard).await;
    if route == Route::SubscriptionBlocked {
        print!("{}", display::format_blocked(ctx.use_color));
        return Ok(());
    }

    let metrics = match backend.fetch_metrics(&session.email).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(email = %session.email, "metrics unavailable: {e}");
            Default::default()
        }
    };
    let name = record.as_ref().and_then(|r| r.display_name.as_deref());
    print!(
        "{}",
        display::format_dashboard(name, &stat_cards(&metrics), ctx.use_color)
    );
    Ok(())
}

pub async fn cmd_subscription(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.require_session()?;
    let backend = ctx.backend(Some(&session));
    let (route, record) = enter(&backend, &session, Route::Subscription).await;
    if route == Route::SubscriptionBlocked {
        print!("{}", display::format_blocked(ctx.use_color));
        return Ok(());
    }

    let (state, created_at) = record
        .map(|r| (r.subscription, r.created_at))
        .unwrap_or_default();
    let status = plan_status(state, created_at, Utc::now());
    print!("{}", display::format_subscription(&status, ctx.use_color));
    Ok(())
}
