// ============================================================================
// Structure : CachedFinanceClient
// ============================================================================
// Cache mémoire posé DEVANT FinanceClient (décorateur), jamais dedans
//
// - Clé : (ticker, opération, intervalle de dates ou type de rapport)
// - Seuls les succès sont mis en cache ; les erreurs remontent telles quelles
// - Pas d'expiration implicite : invalidate(ticker) ou clear()
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::debug;

use crate::api::provider::TableSource;
use crate::client::FinanceClient;
use crate::error::{ClientResult, Operation};
use crate::models::{DividendRecord, FetchResult, PriceRecord, ReportRecord};

/// Paramètre distinctif d'une requête
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    Range(NaiveDate, NaiveDate),
    Kind(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    ticker: String,
    operation: Operation,
    scope: Scope,
}

impl CacheKey {
    fn new(ticker: &str, operation: Operation, scope: Scope) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            operation,
            scope,
        }
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Prices(FetchResult<PriceRecord>),
    Dividends(FetchResult<DividendRecord>),
    Reports(FetchResult<ReportRecord>),
}

pub struct CachedFinanceClient<S> {
    inner: FinanceClient<S>,
    entries: Mutex<HashMap<CacheKey, CachedValue>>,
}

impl<S: TableSource> CachedFinanceClient<S> {
    pub fn new(inner: FinanceClient<S>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &FinanceClient<S> {
        &self.inner
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned()
    }

    fn store(&self, key: CacheKey, value: CachedValue) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key, value);
    }

    pub async fn get_stock_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ClientResult<FetchResult<PriceRecord>> {
        let key = CacheKey::new(ticker, Operation::StockPrices, Scope::Range(start, end));
        if let Some(CachedValue::Prices(hit)) = self.lookup(&key) {
            debug!(ticker = %hit.ticker, "Price cache hit");
            return Ok(hit);
        }

        let fetched = self.inner.get_stock_prices(ticker, start, end).await?;
        self.store(key, CachedValue::Prices(fetched.clone()));
        Ok(fetched)
    }

    pub async fn get_stock_dividends(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ClientResult<FetchResult<DividendRecord>> {
        let key = CacheKey::new(ticker, Operation::StockDividends, Scope::Range(start, end));
        if let Some(CachedValue::Dividends(hit)) = self.lookup(&key) {
            debug!(ticker = %hit.ticker, "Dividend cache hit");
            return Ok(hit);
        }

        let fetched = self.inner.get_stock_dividends(ticker, start, end).await?;
        self.store(key, CachedValue::Dividends(fetched.clone()));
        Ok(fetched)
    }

    pub async fn get_stock_reports(
        &self,
        ticker: &str,
        kind: &str,
    ) -> ClientResult<FetchResult<ReportRecord>> {
        let key = CacheKey::new(ticker, Operation::StockReports, Scope::Kind(kind.trim().to_string()));
        if let Some(CachedValue::Reports(hit)) = self.lookup(&key) {
            debug!(ticker = %hit.ticker, "Report cache hit");
            return Ok(hit);
        }

        let fetched = self.inner.get_stock_reports(ticker, kind).await?;
        self.store(key, CachedValue::Reports(fetched.clone()));
        Ok(fetched)
    }

    /// Supprime toutes les entrées d'un ticker ; renvoie le nombre retiré
    pub fn invalidate(&self, ticker: &str) -> usize {
        let ticker = ticker.trim().to_uppercase();
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|key, _| key.ticker != ticker);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
