//! Dashboard metric cards.

use serde::{Deserialize, Serialize};

/// One row of the `metricas` view. Missing columns read as zero.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardMetrics {
    #[serde(rename = "conversas_hoje")]
    pub conversations_today: u64,
    #[serde(rename = "clientes_ativos")]
    pub active_customers: u64,
    /// Fraction in `0.0..=1.0`.
    #[serde(rename = "taxa_resposta")]
    pub response_rate: f64,
    #[serde(rename = "tempo_medio_min")]
    pub avg_response_minutes: f64,
    /// Week-over-week change per card, in percent.
    #[serde(rename = "variacao_conversas")]
    pub conversations_change: f64,
    #[serde(rename = "variacao_clientes")]
    pub customers_change: f64,
    #[serde(rename = "variacao_resposta")]
    pub response_rate_change: f64,
    #[serde(rename = "variacao_tempo")]
    pub avg_time_change: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub change: String,
}

pub const EMPTY_ACTIVITY: &str = "Nenhuma atividade ainda. Conecte seu WhatsApp para começar!";

/// `+0%`, `+12%`, `-3%`.
pub fn format_change(percent: f64) -> String {
    let rounded = if percent.is_finite() { percent.round() as i64 } else { 0 };
    if rounded < 0 {
        format!("{rounded}%")
    } else {
        format!("+{rounded}%")
    }
}

pub fn stat_cards(m: &DashboardMetrics) -> [StatCard; 4] {
    let rate = (m.response_rate.clamp(0.0, 1.0) * 100.0).round() as u64;
    [
        StatCard {
            title: "Conversas Hoje",
            value: m.conversations_today.to_string(),
            change: format_change(m.conversations_change),
        },
        StatCard {
            title: "Clientes Ativos",
            value: m.active_customers.to_string(),
            change: format_change(m.customers_change),
        },
        StatCard {
            title: "Taxa de Resposta",
            value: format!("{rate}%"),
            change: format_change(m.response_rate_change),
        },
        StatCard {
            title: "Tempo Médio",
            value: format!("{}min", m.avg_response_minutes.max(0.0).round() as u64),
            change: format_change(m.avg_time_change),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_render_zeros() {
        let cards = stat_cards(&DashboardMetrics::default());
        let values: Vec<&str> = cards.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["0", "0", "0%", "0min"]);
        assert!(cards.iter().all(|c| c.change == "+0%"));
    }

    #[test]
    fn metrics_from_partial_row() {
        let row = serde_json::json!({ "conversas_hoje": 14, "taxa_resposta": 0.934 });
        let m: DashboardMetrics = serde_json::from_value(row).expect("deserialize");
        let cards = stat_cards(&m);
        assert_eq!(cards[0].value, "14");
        assert_eq!(cards[2].value, "93%");
    }

    #[test]
    fn change_sign() {
        assert_eq!(format_change(12.4), "+12%");
        assert_eq!(format_change(-3.0), "-3%");
        assert_eq!(format_change(f64::NAN), "+0%");
    }
}
