// ============================================================================
// Structure : Ticker
// ============================================================================
// Représente un symbole boursier (action, ETF, indice, ...)
//
// Le symbole est opaque : seul le fournisseur sait s'il existe vraiment.
// Localement on se contente de le nettoyer (trim + majuscules) et de refuser
// la chaîne vide.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Symbole boursier normalisé en majuscules (ex: "AAPL", "BRK-B")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Crée un ticker à partir d'une saisie utilisateur
    ///
    /// # Erreurs
    /// * `DataError::InvalidArgument` si la chaîne est vide après trim
    pub fn parse(raw: &str) -> Result<Self, DataError> {
        let symbol = raw.trim();
        if symbol.is_empty() {
            return Err(DataError::invalid_argument("le ticker ne peut pas être vide"));
        }
        Ok(Self(symbol.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ticker {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticker::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
