//! `splia connect`: the WhatsApp pairing screen.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use splia_core::{PairingImage, PairingView, Phase, Route};

use crate::cli::{ConnectOpts, command_for};
use crate::cmd_dashboard;
use crate::context::{AppContext, enter};
use crate::display;
use crate::pairing::{
    Navigator, PairingFlow, PairingObserver, PairingOutcome, PairingTimings, UserCommand,
};

/// Map one line of keyboard input to a screen action.
pub(crate) fn parse_command(line: &str) -> Option<UserCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "c" | "check" | "verificar" => Some(UserCommand::CheckNow),
        "r" | "refresh" | "atualizar" => Some(UserCommand::Refresh),
        "b" | "back" | "voltar" => Some(UserCommand::Back),
        "q" | "quit" | "sair" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// Exit code for `splia connect`:
/// - 0: connected, or back to onboarding
/// - 1: QR code expired
/// - 2: no QR code stored
/// - 3: interrupted
pub fn exit_code(outcome: PairingOutcome) -> i32 {
    match outcome {
        PairingOutcome::Connected | PairingOutcome::Back => 0,
        PairingOutcome::Expired => 1,
        PairingOutcome::MissingImage => 2,
        PairingOutcome::Cancelled => 3,
    }
}

struct TerminalObserver {
    state_dir: PathBuf,
    use_color: bool,
    is_tty: bool,
    last: Option<(Phase, Option<String>)>,
}

impl TerminalObserver {
    /// Text to write for `view`, if anything changed.
    fn frame(&mut self, view: &PairingView) -> Option<String> {
        let line = display::pairing_status(view, self.use_color);
        if self.is_tty {
            // Redraw in place; a terminal phase keeps its line.
            let end = if view.phase.is_terminal() { "\n" } else { "" };
            return Some(format!("\r\x1b[2K{line}{end}"));
        }
        // Piped output: one line per phase or notice change, not per second.
        let key = (view.phase, view.notice.clone());
        if self.last.as_ref() == Some(&key) {
            return None;
        }
        self.last = Some(key);
        Some(format!("{line}\n"))
    }
}

impl PairingObserver for TerminalObserver {
    fn on_view(&mut self, view: &PairingView) {
        if let Some(text) = self.frame(view) {
            let mut out = std::io::stdout();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }

    fn on_image(&mut self, image: &PairingImage) {
        let path = match display::write_qr_image(&self.state_dir, image) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("cannot write QR image: {e}");
                None
            }
        };
        print!("{}", display::pairing_help(path.as_deref()));
    }
}

#[derive(Default)]
struct CliNavigator {
    target: Option<Route>,
}

impl Navigator for CliNavigator {
    fn navigate(&mut self, route: Route) {
        self.target = Some(route);
    }
}

/// Forward keyboard lines as commands. Runs on its own thread so a
/// pending read never holds the runtime open at exit.
fn spawn_input_reader(tx: mpsc::Sender<UserCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(cmd) => {
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("comando desconhecido: {}", line.trim()),
            }
        }
    });
}

pub async fn cmd_connect(ctx: &AppContext, opts: &ConnectOpts) -> anyhow::Result<i32> {
    let session = ctx.require_session()?;
    let backend = ctx.backend(Some(&session));
    let (route, _) = enter(&backend, &session, Route::ConnectWhatsApp).await;
    if route == Route::SubscriptionBlocked {
        print!("{}", display::format_blocked(ctx.use_color));
        return Ok(0);
    }

    let timings = PairingTimings {
        poll_interval: Duration::from_secs(opts.poll_secs),
        expiry_secs: opts.expiry_secs,
    };
    let flow = PairingFlow::new(
        Arc::new(backend),
        Arc::new(ctx.gateway()),
        ctx.storage(),
        session.email.clone(),
        timings,
    );

    let (tx, rx) = mpsc::channel(8);
    if std::io::stdin().is_terminal() {
        spawn_input_reader(tx);
    } else {
        drop(tx);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    println!("Conectar WhatsApp");
    let mut observer = TerminalObserver {
        state_dir: ctx.state_dir.clone(),
        use_color: ctx.use_color,
        is_tty: std::io::stdout().is_terminal(),
        last: None,
    };
    let mut navigator = CliNavigator::default();
    let outcome = flow.run(rx, cancel, &mut observer, &mut navigator).await;
    tracing::info!(?outcome, "pairing finished");

    match (outcome, navigator.target) {
        (PairingOutcome::Connected, Some(Route::Dashboard)) => {
            println!();
            let backend = ctx.backend(Some(&session));
            cmd_dashboard::show_dashboard(ctx, &backend, &session).await?;
        }
        (PairingOutcome::Back, Some(route)) => {
            println!("Voltando: {}", command_for(route));
        }
        (PairingOutcome::MissingImage, _) => {
            println!("Próximo passo: {}", command_for(Route::Onboarding));
        }
        (PairingOutcome::Expired, _) => {
            println!("Gere um novo QR Code: splia connect");
        }
        _ => {}
    }
    Ok(exit_code(outcome))
}
