//! Screen routes, the navigation menu, and post-login routing rules.

use std::fmt;
use std::str::FromStr;

use crate::types::{AccountRecord, SpliaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Onboarding,
    Dashboard,
    ConnectWhatsApp,
    Settings,
    Stickers,
    Subscription,
    SubscriptionBlocked,
    Marketing,
}

impl Route {
    pub const ALL: [Self; 9] = [
        Self::Login,
        Self::Onboarding,
        Self::Dashboard,
        Self::ConnectWhatsApp,
        Self::Settings,
        Self::Stickers,
        Self::Subscription,
        Self::SubscriptionBlocked,
        Self::Marketing,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Onboarding => "/onboarding",
            Self::Dashboard => "/dashboard",
            Self::ConnectWhatsApp => "/conectar-whatsapp",
            Self::Settings => "/configuracoes",
            Self::Stickers => "/adesivos",
            Self::Subscription => "/assinatura",
            Self::SubscriptionBlocked => "/assinatura-bloqueada",
            Self::Marketing => "/marketing",
        }
    }

    /// Protected routes require a signed-in session.
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Login | Self::SubscriptionBlocked)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = SpliaError;

    /// `/` redirects to the dashboard.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::Dashboard);
        }
        Self::ALL
            .into_iter()
            .find(|r| r.path() == trimmed)
            .ok_or_else(|| SpliaError::UnknownRoute(s.to_string()))
    }
}

/// Sidebar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub route: Route,
    pub badge: Option<&'static str>,
}

pub const MENU: [MenuItem; 6] = [
    MenuItem { label: "Dashboard", route: Route::Dashboard, badge: None },
    MenuItem { label: "Conectar WhatsApp", route: Route::ConnectWhatsApp, badge: None },
    MenuItem { label: "Gerar Adesivos", route: Route::Stickers, badge: None },
    MenuItem { label: "Assinatura", route: Route::Subscription, badge: None },
    MenuItem { label: "Marketing", route: Route::Marketing, badge: Some("Em breve") },
    MenuItem { label: "Configurações", route: Route::Settings, badge: None },
];

/// Decide where a freshly signed-in user lands.
///
/// A failed account lookup is not fatal: the user goes to the dashboard and
/// the protected pages deal with the missing record.
pub fn route_after_login<E>(lookup: Result<Option<&AccountRecord>, E>) -> Route {
    match lookup {
        Ok(Some(record)) if !record.subscription.allows_access() => Route::SubscriptionBlocked,
        Ok(Some(record)) if record.is_onboarded() => Route::Dashboard,
        Ok(_) => Route::Onboarding,
        Err(_) => Route::Dashboard,
    }
}

/// Gate a protected route on the account's subscription.
pub fn guard(route: Route, record: Option<&AccountRecord>) -> Route {
    match record {
        Some(r) if route.is_protected() && !r.subscription.allows_access() => {
            Route::SubscriptionBlocked
        }
        _ => route,
    }
}
