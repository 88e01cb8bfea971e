//! splia: terminal client for the SPL IA laundromat WhatsApp assistant.
//! Talks to the hosted record store, the onboarding webhook and the
//! WhatsApp gateway; all business logic lives in those services.

use clap::Parser;

mod backend;
mod cli;
mod cmd_connect;
mod cmd_dashboard;
mod cmd_login;
mod cmd_onboard;
mod cmd_pages;
mod context;
mod display;
mod error;
mod gateway;
mod pairing;
mod session;
mod storage;
mod webhook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("SPLIA_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let ctx = context::AppContext::from_cli(&args)?;
    tracing::debug!(state_dir = %ctx.state_dir.display(), "starting");

    match args.command {
        cli::Command::Login(opts) => {
            cmd_login::cmd_login(&ctx, &opts).await?;
        }
        cli::Command::Logout => cmd_login::cmd_logout(&ctx).await?,
        cli::Command::Onboard(opts) => cmd_onboard::cmd_onboard(&ctx, &opts).await?,
        cli::Command::Connect(opts) => {
            let exit_code = cmd_connect::cmd_connect(&ctx, &opts).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        cli::Command::Dashboard => cmd_dashboard::cmd_dashboard(&ctx).await?,
        cli::Command::Subscription => cmd_dashboard::cmd_subscription(&ctx).await?,
        cli::Command::Page(opts) => cmd_pages::cmd_page(&ctx, &opts.name)?,
        cli::Command::Menu(opts) => cmd_pages::cmd_menu(&ctx, opts.current.as_deref())?,
    }

    Ok(())
}
