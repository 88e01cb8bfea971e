//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use splia_core::Route;

/// Used when no backend is configured; requests fail at the network boundary.
pub const PLACEHOLDER_BACKEND_URL: &str = "https://placeholder.supabase.co";
pub const PLACEHOLDER_ANON_KEY: &str = "placeholder-anon-key";

#[derive(Parser)]
#[command(name = "splia", about = "SPL IA laundromat assistant client")]
pub struct Cli {
    /// Record store base URL
    #[arg(long, global = true, env = "SPLIA_BACKEND_URL", default_value = PLACEHOLDER_BACKEND_URL)]
    pub backend_url: String,

    /// Record store anonymous API key
    #[arg(long, global = true, env = "SPLIA_ANON_KEY", default_value = PLACEHOLDER_ANON_KEY, hide_env_values = true)]
    pub anon_key: String,

    /// WhatsApp gateway base URL
    #[arg(long, global = true, env = "SPLIA_GATEWAY_URL", default_value = "http://localhost:8080")]
    pub gateway_url: String,

    /// WhatsApp gateway API key
    #[arg(long, global = true, env = "SPLIA_GATEWAY_KEY", hide_env_values = true)]
    pub gateway_key: Option<String>,

    /// Onboarding webhook URL
    #[arg(long, global = true, env = "SPLIA_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// State directory (default: $XDG_STATE_HOME/splia)
    #[arg(long, global = true, env = "SPLIA_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Color output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in and route to the next screen
    Login(LoginOpts),
    /// Sign out and clear the stored session
    Logout,
    /// Submit the laundromat details and receive the pairing QR code
    Onboard(OnboardOpts),
    /// Scan the QR code and wait for WhatsApp to connect
    Connect(ConnectOpts),
    /// Show today's metrics
    Dashboard,
    /// Show the current plan and the plan catalog
    Subscription,
    /// Show an informational page: marketing, adesivos, configuracoes
    Page(PageOpts),
    /// List the navigation menu
    Menu(MenuOpts),
}

#[derive(clap::Args)]
pub struct LoginOpts {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "SPLIA_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Keep the session for 30 days instead of 12 hours
    #[arg(long)]
    pub remember_me: bool,
}

#[derive(clap::Args)]
pub struct OnboardOpts {
    /// Laundromat name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub address: Option<String>,
}

#[derive(clap::Args)]
pub struct ConnectOpts {
    /// Seconds between connection checks
    #[arg(long, default_value = "5")]
    pub poll_secs: u64,

    /// Seconds before the QR code expires
    #[arg(long, default_value = "60")]
    pub expiry_secs: u32,
}

#[derive(clap::Args)]
pub struct PageOpts {
    /// Page name or path (e.g. `marketing`, `/adesivos`)
    pub name: String,
}

#[derive(clap::Args)]
pub struct MenuOpts {
    /// Highlight this route (e.g. `/assinatura`)
    pub current: Option<String>,
}

/// The command that renders `route`.
pub fn command_for(route: Route) -> &'static str {
    match route {
        Route::Login => "splia login --email <email>",
        Route::Onboarding => "splia onboard --name <nome da lavanderia>",
        Route::Dashboard => "splia dashboard",
        Route::ConnectWhatsApp => "splia connect",
        Route::Settings => "splia page configuracoes",
        Route::Stickers => "splia page adesivos",
        Route::Subscription | Route::SubscriptionBlocked => "splia subscription",
        Route::Marketing => "splia page marketing",
    }
}

/// Default state directory: `$XDG_STATE_HOME/splia`, else `~/.local/state/splia`.
pub fn default_state_dir() -> PathBuf {
    match std::env::var("XDG_STATE_HOME") {
        Ok(dir) if !dir.is_empty() => return PathBuf::from(dir).join("splia"),
        _ => {}
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local/state/splia")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_defaults() {
        let cli = Cli::parse_from(["splia", "connect"]);
        match cli.command {
            Command::Connect(opts) => {
                assert_eq!(opts.poll_secs, 5);
                assert_eq!(opts.expiry_secs, 60);
            }
            _ => panic!("expected connect"),
        }
        assert_eq!(cli.color, "auto");
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "splia",
            "page",
            "marketing",
            "--state-dir",
            "/tmp/splia-test",
            "--gateway-url",
            "https://wa.example.com",
        ]);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/splia-test")));
        assert_eq!(cli.gateway_url, "https://wa.example.com");
        assert!(matches!(cli.command, Command::Page(ref p) if p.name == "marketing"));
    }

    #[test]
    fn login_requires_email() {
        assert!(Cli::try_parse_from(["splia", "login", "--password", "secret1"]).is_err());
        let cli = Cli::parse_from([
            "splia",
            "login",
            "--email",
            "dona@lava.com",
            "--password",
            "secret1",
            "--remember-me",
        ]);
        assert!(matches!(cli.command, Command::Login(ref o) if o.remember_me));
    }

    #[test]
    fn every_route_has_a_command() {
        for route in Route::ALL {
            assert!(command_for(route).starts_with("splia "), "{route}");
        }
        assert_eq!(command_for(Route::Onboarding), "splia onboard --name <nome da lavanderia>");
    }
}
