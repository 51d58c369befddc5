// ============================================================================
// Structures : ReportKind, ReportRecord
// ============================================================================
// États financiers annuels (compte de résultat, bilan, flux de trésorerie)
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::models::Ticker;

/// Type d'état financier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Compte de résultat
    Financials,
    /// Bilan
    BalanceSheet,
    /// Tableau des flux de trésorerie
    CashFlow,
}

impl ReportKind {
    pub fn all() -> [ReportKind; 3] {
        [ReportKind::Financials, ReportKind::BalanceSheet, ReportKind::CashFlow]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Financials => "financials",
            ReportKind::BalanceSheet => "balance_sheet",
            ReportKind::CashFlow => "cash_flow",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "financials" => Ok(ReportKind::Financials),
            "balance_sheet" => Ok(ReportKind::BalanceSheet),
            "cash_flow" => Ok(ReportKind::CashFlow),
            other => Err(DataError::invalid_argument(format!(
                "type de rapport inconnu '{}' (attendu : financials, balance_sheet, cash_flow)",
                other
            ))),
        }
    }
}

/// Poste comptable -> (date de clôture "YYYY-MM-DD" -> valeur)
pub type ReportContent = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Un état financier normalisé
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub ticker: Ticker,

    pub report_kind: ReportKind,

    /// Horodatage de la normalisation (et non de la requête fournisseur) :
    /// deux normalisations du même tableau brut donnent deux `as_of`
    /// différents. C'est voulu, on enregistre l'heure de traitement.
    pub as_of: DateTime<Utc>,

    pub content: ReportContent,
}

impl ReportRecord {
    /// Liste des postes présents dans le rapport
    pub fn line_items(&self) -> impl Iterator<Item = &str> {
        self.content.keys().map(String::as_str)
    }

    /// Valeur d'un poste pour une date de clôture donnée
    pub fn value(&self, line_item: &str, period_end: &str) -> Option<&serde_json::Value> {
        self.content.get(line_item)?.get(period_end)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
