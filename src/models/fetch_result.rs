// ============================================================================
// Structure : FetchResult<T>
// ============================================================================
// Enveloppe renvoyée par chaque opération de FinanceClient
//
// `items` vide est un résultat valide (rien dans l'intervalle) et ne doit pas
// être confondu avec un échec de récupération.
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Ticker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult<T> {
    pub ticker: Ticker,
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<T>,
}

impl<T> FetchResult<T> {
    /// Enveloppe les items, horodatée maintenant
    pub fn new(ticker: Ticker, items: Vec<T>) -> Self {
        Self {
            ticker,
            fetched_at: Utc::now(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }
}
