//! `splia login` / `splia logout`.

use anyhow::Context as _;

use splia_core::Route;
use splia_core::routes::route_after_login;
use splia_core::validation::LoginForm;

use crate::backend::RecordStore;
use crate::cli::{LoginOpts, command_for};
use crate::context::AppContext;

pub async fn cmd_login(ctx: &AppContext, opts: &LoginOpts) -> anyhow::Result<Route> {
    let form = LoginForm {
        email: opts.email.trim().to_string(),
        password: opts.password.clone(),
        remember_me: opts.remember_me,
    };
    if let Err(errors) = form.validate() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("{}", messages.join("; "));
    }

    let session = ctx
        .backend(None)
        .sign_in(&form.email, &form.password, form.remember_me)
        .await?;
    ctx.sessions()
        .save(&session)
        .with_context(|| format!("saving session to {}", ctx.state_dir.display()))?;
    tracing::info!(email = %session.email, remember_me = session.remember_me, "signed in");

    let lookup = ctx.backend(Some(&session)).fetch_account(&session.email).await;
    if let Err(ref e) = lookup {
        tracing::warn!(email = %session.email, "account lookup after sign-in failed: {e}");
    }
    let route = route_after_login(lookup.as_ref().map(Option::as_ref));

    println!("Login realizado com sucesso! Bem-vindo(a), {}.", session.email);
    println!("Próximo passo: {}", command_for(route));
    Ok(route)
}

pub async fn cmd_logout(ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.sign_out().await? {
        println!("Sessão encerrada.");
    } else {
        println!("Nenhuma sessão ativa.");
    }
    Ok(())
}
