//! Fixed-income products

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentProduct {
    /// Certificado de Depósito Bancário
    Cdb,
    /// Letra de Crédito Imobiliário
    Lci,
    /// Letra de Crédito do Agronegócio
    Lca,
    TesouroSelic,
    Poupanca,
}

impl InvestmentProduct {
    /// Products exempt from income tax for individuals
    pub fn is_tax_exempt(&self) -> bool {
        matches!(
            self,
            InvestmentProduct::Lci | InvestmentProduct::Lca | InvestmentProduct::Poupanca
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            InvestmentProduct::Cdb => "CDB",
            InvestmentProduct::Lci => "LCI",
            InvestmentProduct::Lca => "LCA",
            InvestmentProduct::TesouroSelic => "Tesouro Selic",
            InvestmentProduct::Poupanca => "Poupança",
        }
    }
}
