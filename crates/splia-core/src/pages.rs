//! Static page content: screens with no live data behind them yet.

use crate::routes::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub title: &'static str,
    pub description: &'static str,
    pub items: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPage {
    pub route: Route,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub badge: Option<&'static str>,
    pub sections: &'static [Section],
}

pub const MARKETING: StaticPage = StaticPage {
    route: Route::Marketing,
    title: "Marketing",
    subtitle: "Funcionalidade em desenvolvimento",
    badge: Some("Em breve"),
    sections: &[Section {
        title: "Módulo em Desenvolvimento",
        description: "Estamos trabalhando em recursos de marketing para você",
        items: &[
            "Campanhas automatizadas via WhatsApp",
            "Segmentação de clientes",
            "Templates de mensagens personalizadas",
            "Análise de performance de campanhas",
            "Agendamento de envios",
        ],
    }],
};

pub const STICKERS: StaticPage = StaticPage {
    route: Route::Stickers,
    title: "Gerar Adesivos QR",
    subtitle: "Crie adesivos com QR Code para seus clientes",
    badge: None,
    sections: &[
        Section {
            title: "Tamanho",
            description: "Personalize seu adesivo",
            items: &["Pequeno", "Médio", "Grande"],
        },
        Section {
            title: "Formato",
            description: "Personalize seu adesivo",
            items: &["Quadrado", "Retangular"],
        },
        Section {
            title: "Dicas de Uso",
            description: "",
            items: &[
                "Cole os adesivos em locais visíveis da sua lavanderia",
                "Incentive clientes a escanear para atendimento rápido",
                "Você pode imprimir quantos adesivos precisar",
                "O QR Code é único para sua lavanderia",
            ],
        },
    ],
};

pub const SETTINGS: StaticPage = StaticPage {
    route: Route::Settings,
    title: "Configurações",
    subtitle: "Gerencie os dados da sua lavanderia",
    badge: None,
    sections: &[
        Section {
            title: "Empresa",
            description: "Informações básicas da sua lavanderia",
            items: &[],
        },
        Section {
            title: "Serviços",
            description: "Configure os serviços oferecidos",
            items: &[],
        },
        Section {
            title: "IA & Atendimento",
            description: "Personalize o atendimento automático",
            items: &[],
        },
    ],
};

pub fn static_page(route: Route) -> Option<&'static StaticPage> {
    [&MARKETING, &STICKERS, &SETTINGS]
        .into_iter()
        .find(|p| p.route == route)
}
