// ============================================================================
// Structures : PriceRecord, DividendRecord
// ============================================================================
// Enregistrements canoniques produits par le normaliseur
//
// - NaiveDate : date calendaire sans fuseau (jour de cotation de la place)
//   sérialisée par chrono au format "YYYY-MM-DD"
// - f64 : prix (précision suffisante pour de l'affichage/export)
// - u64 : volume, toujours positif
// ============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Une barre journalière OHLCV
///
/// `low <= open, close <= high` n'est PAS vérifié : on fait confiance au
/// fournisseur sur la cohérence des prix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Jour de cotation
    pub date: NaiveDate,

    /// Prix d'ouverture (Open)
    pub open: f64,

    /// Prix le plus haut (High)
    pub high: f64,

    /// Prix le plus bas (Low)
    pub low: f64,

    /// Prix de clôture (Close)
    pub close: f64,

    /// Volume échangé
    pub volume: u64,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Un détachement de dividende
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    /// Date ex-dividende
    pub date: NaiveDate,

    /// Montant par action, jamais négatif
    pub amount: f64,
}

impl DividendRecord {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
