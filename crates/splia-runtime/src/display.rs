//! Terminal rendering: pairing badges, metric cards, plans, static pages.
//!
//! Every formatter returns a `String` so output can be asserted in tests;
//! callers decide where it goes.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;

use splia_core::metrics::{EMPTY_ACTIVITY, StatCard};
use splia_core::pages::StaticPage;
use splia_core::plans::{PLANS, PlanStatus, RENEWAL_URL, SALES_URL, SUPPORT_EMAIL, recommended_plan};
use splia_core::routes::MenuItem;
use splia_core::{Failure, PairingImage, PairingView, Phase, Route};

/// File stem the decoded QR image is written to inside the state dir.
pub const QR_FILE_STEM: &str = "whatsapp-qr";

pub const PAIRING_STEPS: [(&str, &str); 3] = [
    ("Abra o WhatsApp", "No seu celular, abra o WhatsApp Business"),
    (
        "Acesse Dispositivos Conectados",
        "Toque em ⋮ e selecione \"Dispositivos conectados\"",
    ),
    ("Escaneie o QR Code", "Aponte a câmera para o QR Code"),
];

const BOLD: &str = "1";
const DIM: &str = "2";
const GREEN: &str = "32";
const YELLOW: &str = "1;33";
const RED: &str = "1;31";
const CYAN: &str = "36";

fn paint(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

// ─── Pairing ──────────────────────────────────────────────────────

/// One status line per view. Expiry reads differently from a generic error.
pub fn pairing_status(view: &PairingView, use_color: bool) -> String {
    let mut line = match (view.phase, view.failure) {
        (Phase::Loading, _) => paint("Carregando QR Code...", DIM, use_color),
        (Phase::Waiting, _) => format!(
            "{} expira em {}s",
            paint("[Aguardando conexão]", YELLOW, use_color),
            view.remaining_secs
        ),
        (Phase::Connected, _) => format!(
            "{} redirecionando para o dashboard...",
            paint("[WhatsApp conectado]", GREEN, use_color)
        ),
        (Phase::Error, Some(Failure::Expired)) => format!(
            "{} pressione r para gerar novamente",
            paint("[QR Code expirado]", RED, use_color)
        ),
        (Phase::Error, _) => format!(
            "{} refaça o onboarding (splia onboard)",
            paint("[QR Code não encontrado]", RED, use_color)
        ),
    };
    if let Some(ref notice) = view.notice {
        let _ = write!(
            line,
            "  {}",
            paint(&format!("[Erro] {notice}"), RED, use_color)
        );
    }
    line
}

pub fn pairing_help(qr_path: Option<&Path>) -> String {
    let mut out = String::new();
    if let Some(path) = qr_path {
        let _ = writeln!(out, "QR Code salvo em {}", path.display());
    }
    for (i, (title, detail)) in PAIRING_STEPS.iter().enumerate() {
        let _ = writeln!(out, "  {}. {title}: {detail}", i + 1);
    }
    out.push_str("Comandos: c = verificar agora, r = atualizar, b = voltar, q = sair\n");
    out
}

/// Decode the pairing image and write it next to the session state.
pub fn write_qr_image(state_dir: &Path, image: &PairingImage) -> io::Result<PathBuf> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(image.base64_body().trim())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let ext = match image.mime_type() {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        mime => mime.strip_prefix("image/").unwrap_or("png"),
    };
    std::fs::create_dir_all(state_dir)?;
    let path = state_dir.join(format!("{QR_FILE_STEM}.{ext}"));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

// ─── Dashboard ────────────────────────────────────────────────────

pub fn format_dashboard(display_name: Option<&str>, cards: &[StatCard], use_color: bool) -> String {
    let mut out = String::new();
    let title = match display_name {
        Some(name) => format!("Dashboard · {name}"),
        None => "Dashboard".to_string(),
    };
    let _ = writeln!(out, "{}", paint(&title, BOLD, use_color));
    out.push_str("Visão geral do seu atendimento\n\n");

    let width = cards.iter().map(|c| c.title.chars().count()).max().unwrap_or(0);
    for card in cards {
        let pad = width - card.title.chars().count();
        let change = paint(&card.change, CYAN, use_color);
        let _ = writeln!(
            out,
            "  {}{}  {:>6}  {change} vs. semana passada",
            card.title,
            " ".repeat(pad),
            card.value
        );
    }
    let _ = write!(out, "\nAtividade recente\n  {}\n", paint(EMPTY_ACTIVITY, DIM, use_color));
    out
}

// ─── Subscription ─────────────────────────────────────────────────

pub fn format_subscription(status: &PlanStatus, use_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", paint("Assinatura", BOLD, use_color));
    let badge_color = if status.badge == "Bloqueado" { RED } else { GREEN };
    let _ = writeln!(
        out,
        "Plano atual: {} {}",
        status.title,
        paint(&format!("[{}]", status.badge), badge_color, use_color)
    );
    let _ = writeln!(out, "  {}\n", status.detail);

    out.push_str("Planos disponíveis\n");
    let recommended = recommended_plan().name;
    for plan in &PLANS {
        let marker = if plan.name == recommended {
            format!(" {}", paint("[Recomendado]", YELLOW, use_color))
        } else {
            String::new()
        };
        let _ = writeln!(out, "  {} · {}{marker}", plan.name, plan.price_label());
        for feature in plan.features {
            let _ = writeln!(out, "    - {feature}");
        }
    }
    let _ = writeln!(out, "\nFale com vendas: {SALES_URL}");
    out
}

pub fn format_blocked(use_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", paint("Assinatura Suspensa", RED, use_color));
    out.push_str("Seu acesso está bloqueado por falta de pagamento.\n");
    out.push_str("Renove sua assinatura para voltar a usar o assistente.\n\n");
    let _ = writeln!(out, "Renovar: {RENEWAL_URL}");
    let _ = writeln!(out, "Dúvidas: {SUPPORT_EMAIL}");
    out
}

// ─── Pages & menu ─────────────────────────────────────────────────

pub fn format_page(page: &StaticPage, use_color: bool) -> String {
    let mut out = String::new();
    let title = match page.badge {
        Some(badge) => format!(
            "{} {}",
            paint(page.title, BOLD, use_color),
            paint(&format!("[{badge}]"), YELLOW, use_color)
        ),
        None => paint(page.title, BOLD, use_color),
    };
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", page.subtitle);
    for section in page.sections {
        out.push('\n');
        let _ = writeln!(out, "{}", paint(section.title, CYAN, use_color));
        if !section.description.is_empty() {
            let _ = writeln!(out, "  {}", section.description);
        }
        for item in section.items {
            let _ = writeln!(out, "  - {item}");
        }
    }
    out
}

pub fn format_menu(items: &[MenuItem], current: Option<Route>, use_color: bool) -> String {
    let mut out = String::new();
    for item in items {
        let marker = if Some(item.route) == current { ">" } else { " " };
        let badge = item
            .badge
            .map(|b| format!(" {}", paint(&format!("[{b}]"), YELLOW, use_color)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{marker} {:<20} {}{badge}",
            item.label,
            paint(item.route.path(), DIM, use_color)
        );
    }
    out
}
