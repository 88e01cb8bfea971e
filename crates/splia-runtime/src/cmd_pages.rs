//! `splia page` and `splia menu`.

use splia_core::Route;
use splia_core::pages::static_page;
use splia_core::routes::MENU;

use crate::context::AppContext;
use crate::display;

/// Accept `marketing`, `/marketing` and `marketing/`.
pub(crate) fn parse_route(name: &str) -> anyhow::Result<Route> {
    let name = name.trim();
    let path = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    };
    Ok(path.parse()?)
}

pub fn cmd_page(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    ctx.require_session()?;
    let route = parse_route(name)?;
    let page = static_page(route).ok_or_else(|| {
        anyhow::anyhow!("{route} is not an informational page (try marketing, adesivos, configuracoes)")
    })?;
    print!("{}", display::format_page(page, ctx.use_color));
    Ok(())
}

pub fn cmd_menu(ctx: &AppContext, current: Option<&str>) -> anyhow::Result<()> {
    let current = current.map(parse_route).transpose()?;
    print!("{}", display::format_menu(&MENU, current, ctx.use_color));
    Ok(())
}
