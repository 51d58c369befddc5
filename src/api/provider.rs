// ============================================================================
// ProviderAdapter : requêtes vers le fournisseur de données
// ============================================================================
// Deux couches :
// 1. TableSource : capacité minimale "récupère un tableau pour une requête",
//    implémentée par le fournisseur concret (Yahoo) ou un double de test
// 2. ProviderAdapter : règles de requête communes à tous les fournisseurs
//    (élargissement de la date de fin, politique NoData, préconditions)
//
// Chaque opération fait exactement un aller-retour réseau, sans retry.
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, instrument, warn};

use crate::error::{DataError, DataResult};
use crate::models::{ReportKind, Ticker};

/// Nom des colonnes brutes produites par les sources
pub mod columns {
    pub const OPEN: &str = "Open";
    pub const HIGH: &str = "High";
    pub const LOW: &str = "Low";
    pub const CLOSE: &str = "Close";
    pub const VOLUME: &str = "Volume";
    pub const DIVIDENDS: &str = "Dividends";
}

/// Une ligne brute : un index temporel + des cellules nommées
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Date/heure locale de la place de cotation
    pub index: NaiveDateTime,
    pub cells: BTreeMap<String, serde_json::Value>,
}

impl RawRow {
    pub fn new(index: NaiveDateTime) -> Self {
        Self {
            index,
            cells: BTreeMap::new(),
        }
    }

    /// Ajoute une cellule (builder)
    pub fn with(mut self, column: &str, value: impl Into<serde_json::Value>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.cells.get(column)
    }
}

/// Tableau brut tel que rendu par le fournisseur, dans son ordre
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Requête transmise à la source
///
/// Les intervalles sont `[start, end_exclusive)` : c'est la convention
/// native de la plupart des fournisseurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableQuery {
    PriceHistory {
        ticker: Ticker,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    },
    DividendHistory {
        ticker: Ticker,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    },
    FinancialStatement {
        ticker: Ticker,
        kind: ReportKind,
    },
}

impl TableQuery {
    pub fn ticker(&self) -> &Ticker {
        match self {
            TableQuery::PriceHistory { ticker, .. }
            | TableQuery::DividendHistory { ticker, .. }
            | TableQuery::FinancialStatement { ticker, .. } => ticker,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TableQuery::PriceHistory { .. } => "price_history",
            TableQuery::DividendHistory { .. } => "dividend_history",
            TableQuery::FinancialStatement { .. } => "financial_statement",
        }
    }
}

/// Capacité "récupère un tableau pour une requête"
///
/// Remplacer le fournisseur revient à implémenter ce trait : ni le
/// normaliseur ni FinanceClient n'ont à changer.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Un seul aller-retour réseau par appel
    ///
    /// Un tableau vide signifie "pas de données", pas une erreur.
    async fn fetch_table(&self, query: &TableQuery) -> DataResult<RawTable>;
}

/// Vérifie la précondition `start <= end`
pub fn ensure_range(start: NaiveDate, end: NaiveDate) -> DataResult<()> {
    if start > end {
        return Err(DataError::invalid_argument(format!(
            "date de début {} postérieure à la date de fin {}",
            start, end
        )));
    }
    Ok(())
}

/// Lendemain de `end` : borne exclusive pour inclure `end` lui-même
fn widen_end(end: NaiveDate) -> DataResult<NaiveDate> {
    end.checked_add_signed(Duration::days(1))
        .ok_or_else(|| DataError::invalid_argument(format!("date de fin hors limites : {}", end)))
}

/// Adaptateur générique au-dessus d'une source de tableaux
#[derive(Debug, Clone)]
pub struct ProviderAdapter<S> {
    source: S,
}

impl<S: TableSource> ProviderAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Historique OHLCV entre `start` et `end` inclus
    ///
    /// La fenêtre est élargie d'un jour (fournisseurs à borne exclusive),
    /// le normaliseur recoupe ensuite à `end` exactement.
    ///
    /// # Erreurs
    /// * `NoData` si le fournisseur ne renvoie aucune ligne : une série de
    ///   prix vide indique presque toujours un ticker ou des dates invalides
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn fetch_price_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<RawTable> {
        ensure_range(start, end)?;
        let query = TableQuery::PriceHistory {
            ticker: ticker.clone(),
            start,
            end_exclusive: widen_end(end)?,
        };

        let table = self.source.fetch_table(&query).await?;
        debug!(rows = table.len(), "Price history table received");

        if table.is_empty() {
            warn!(%start, %end, "Provider returned no price rows");
            return Err(DataError::no_data(format!(
                "aucun prix pour '{}' entre {} et {}",
                ticker, start, end
            )));
        }
        Ok(table)
    }

    /// Dividendes détachés entre `start` et `end` inclus (vide = aucun)
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn fetch_dividend_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<RawTable> {
        ensure_range(start, end)?;
        let query = TableQuery::DividendHistory {
            ticker: ticker.clone(),
            start,
            end_exclusive: widen_end(end)?,
        };

        let table = self.source.fetch_table(&query).await?;
        debug!(rows = table.len(), "Dividend table received");
        Ok(table)
    }

    /// État financier annuel du type demandé
    #[instrument(skip(self), fields(ticker = %ticker, kind = %kind))]
    pub async fn fetch_financial_statement(
        &self,
        ticker: &Ticker,
        kind: ReportKind,
    ) -> DataResult<RawTable> {
        let query = TableQuery::FinancialStatement {
            ticker: ticker.clone(),
            kind,
        };

        let table = self.source.fetch_table(&query).await?;
        debug!(rows = table.len(), "Financial statement table received");
        Ok(table)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    /// Source qui mémorise les requêtes reçues et renvoie un tableau fixe
    struct RecordingSource {
        table: RawTable,
        queries: Mutex<Vec<TableQuery>>,
    }

    impl RecordingSource {
        fn new(table: RawTable) -> Self {
            Self {
                table,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<TableQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TableSource for RecordingSource {
        async fn fetch_table(&self, query: &TableQuery) -> DataResult<RawTable> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.table.clone())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn one_row() -> RawTable {
        let index = date(2021, 1, 4).and_hms_opt(9, 30, 0).unwrap();
        RawTable::new(vec![RawRow::new(index).with(columns::CLOSE, 1.0)])
    }

    #[tokio::test]
    async fn test_price_query_end_is_widened_by_one_day() {
        let adapter = ProviderAdapter::new(RecordingSource::new(one_row()));
        let ticker = Ticker::parse("AAPL").unwrap();

        adapter
            .fetch_price_history(&ticker, date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap();

        assert_eq!(
            adapter.source().queries(),
            vec![TableQuery::PriceHistory {
                ticker,
                start: date(2021, 1, 1),
                end_exclusive: date(2021, 2, 1),
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_price_table_is_no_data() {
        let adapter = ProviderAdapter::new(RecordingSource::new(RawTable::empty()));
        let ticker = Ticker::parse("ZZZZ").unwrap();

        let err = adapter
            .fetch_price_history(&ticker, date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[tokio::test]
    async fn test_empty_dividend_table_is_ok() {
        let adapter = ProviderAdapter::new(RecordingSource::new(RawTable::empty()));
        let ticker = Ticker::parse("TSLA").unwrap();

        let table = adapter
            .fetch_dividend_history(&ticker, date(2021, 1, 1), date(2021, 12, 31))
            .await
            .unwrap();

        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_without_query() {
        let adapter = ProviderAdapter::new(RecordingSource::new(one_row()));
        let ticker = Ticker::parse("AAPL").unwrap();

        let err = adapter
            .fetch_dividend_history(&ticker, date(2021, 2, 1), date(2021, 1, 1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(adapter.source().queries().is_empty());
    }

    #[test]
    fn test_single_day_range_is_valid() {
        assert!(ensure_range(date(2021, 1, 4), date(2021, 1, 4)).is_ok());
    }
}
