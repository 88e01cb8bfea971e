//! Subscription plans and trial arithmetic.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::SubscriptionState;

/// Length of the free trial counted from account creation.
pub const TRIAL_DAYS: i64 = 30;

pub const RENEWAL_URL: &str = "https://pay.cakto.com.br/renovar-splia";
pub const SUPPORT_EMAIL: &str = "contato@splia.com";
pub const SALES_URL: &str = "https://wa.me/5511999999999";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub name: &'static str,
    /// Monthly price in whole reais.
    pub monthly_brl: u32,
    pub features: &'static [&'static str],
    pub recommended: bool,
}

impl Plan {
    pub fn price_label(&self) -> String {
        format!("R$ {}/mês", self.monthly_brl)
    }
}

pub const PLANS: [Plan; 3] = [
    Plan {
        name: "Básico",
        monthly_brl: 97,
        features: &[
            "Até 500 conversas/mês",
            "IA básica de atendimento",
            "Integração WhatsApp",
            "Dashboard de métricas",
        ],
        recommended: false,
    },
    Plan {
        name: "Profissional",
        monthly_brl: 197,
        features: &[
            "Até 2.000 conversas/mês",
            "IA avançada personalizada",
            "Múltiplos WhatsApp",
            "Dashboard completo",
            "Suporte prioritário",
        ],
        recommended: true,
    },
    Plan {
        name: "Empresarial",
        monthly_brl: 397,
        features: &[
            "Conversas ilimitadas",
            "IA premium personalizada",
            "Múltiplos WhatsApp",
            "Dashboard avançado",
            "Suporte VIP 24/7",
            "API personalizada",
        ],
        recommended: false,
    },
];

pub fn recommended_plan() -> &'static Plan {
    PLANS
        .iter()
        .find(|p| p.recommended)
        .unwrap_or(&PLANS[0])
}

/// What the subscription page shows as the current plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStatus {
    pub title: String,
    pub detail: String,
    pub badge: &'static str,
}

pub fn trial_ends_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + TimeDelta::days(TRIAL_DAYS)
}

/// Whole days left in the trial, never negative.
pub fn trial_days_left(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let left = trial_ends_at(created_at).signed_duration_since(now);
    // Round partial days up so the last day still reads "1 day left".
    let days = left.num_days();
    let partial = left - TimeDelta::days(days) > TimeDelta::zero();
    (days + i64::from(partial)).max(0)
}

pub fn plan_status(
    state: SubscriptionState,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PlanStatus {
    match state {
        SubscriptionState::Trial => {
            let detail = match created_at {
                Some(created) => format!(
                    "{} dias restantes (até {})",
                    trial_days_left(created, now),
                    trial_ends_at(created).format("%d/%m/%Y")
                ),
                None => format!("Válido até {TRIAL_DAYS} dias após cadastro"),
            };
            PlanStatus {
                title: "Plano Trial".to_string(),
                detail,
                badge: "Ativo",
            }
        }
        SubscriptionState::Active => PlanStatus {
            title: "Plano ativo".to_string(),
            detail: "Pagamento em dia".to_string(),
            badge: "Ativo",
        },
        SubscriptionState::Blocked => PlanStatus {
            title: "Assinatura Suspensa".to_string(),
            detail: "Seu acesso está bloqueado por falta de pagamento.".to_string(),
            badge: "Bloqueado",
        },
    }
}
