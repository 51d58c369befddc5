// ============================================================================
// Structure : FinanceClient
// ============================================================================
// Façade unique pour toutes les données d'un ticker
//
// Chaque opération :
// 1. valide les entrées (ticker non vide, start <= end, type de rapport)
// 2. appelle l'adaptateur (un aller-retour réseau)
// 3. passe le tableau brut au normaliseur correspondant
// 4. enveloppe le résultat dans un FetchResult horodaté
//
// Toute erreur devient un ClientError portant l'opération, le ticker et la
// cause d'origine (dont le ErrorKind est conservé).
//
// Le client ne garde aucun état mutable : il peut être partagé (Arc) entre
// tâches et les appels concurrents sont indépendants.
// ============================================================================

use chrono::NaiveDate;
use tracing::{error, info, instrument};

use crate::api::provider::{ensure_range, ProviderAdapter, TableSource};
use crate::api::yahoo::YahooSource;
use crate::config::ProviderConfig;
use crate::error::{ClientError, ClientResult, DataError, DataResult, Operation};
use crate::models::{DividendRecord, FetchResult, PriceRecord, ReportKind, ReportRecord, Ticker};
use crate::normalize;

pub struct FinanceClient<S = YahooSource> {
    adapter: ProviderAdapter<S>,
}

impl FinanceClient<YahooSource> {
    /// Client adossé à Yahoo Finance
    pub fn yahoo(config: ProviderConfig) -> DataResult<Self> {
        Ok(Self::new(YahooSource::new(config)?))
    }
}

impl<S: TableSource> FinanceClient<S> {
    pub fn new(source: S) -> Self {
        Self {
            adapter: ProviderAdapter::new(source),
        }
    }

    pub fn adapter(&self) -> &ProviderAdapter<S> {
        &self.adapter
    }

    /// Historique journalier OHLCV de `start` à `end` inclus
    ///
    /// # Erreurs
    /// * `InvalidArgument` : ticker vide ou `start > end`
    /// * `NoData` : aucune barre dans l'intervalle
    /// * `Provider` : échec réseau/fournisseur
    /// * `DataShape` : ligne mal formée
    #[instrument(skip(self))]
    pub async fn get_stock_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ClientResult<FetchResult<PriceRecord>> {
        let operation = Operation::StockPrices;
        let result = async {
            let ticker = Ticker::parse(ticker)?;
            ensure_range(start, end)?;
            let raw = self.adapter.fetch_price_history(&ticker, start, end).await?;
            let items = normalize::normalize_prices(&raw, start, end)?;
            // Lignes reçues mais toutes hors de [start, end]
            if items.is_empty() {
                return Err(DataError::no_data(format!(
                    "aucun prix pour '{}' entre {} et {}",
                    ticker, start, end
                )));
            }
            Ok::<_, DataError>(FetchResult::new(ticker, items))
        }
        .await;

        finish(operation, ticker, result)
    }

    /// Dividendes de `start` à `end` inclus ; `items` vide si aucun
    #[instrument(skip(self))]
    pub async fn get_stock_dividends(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ClientResult<FetchResult<DividendRecord>> {
        let operation = Operation::StockDividends;
        let result = async {
            let ticker = Ticker::parse(ticker)?;
            ensure_range(start, end)?;
            let raw = self.adapter.fetch_dividend_history(&ticker, start, end).await?;
            let items = normalize::normalize_dividends(&raw, start, end)?;
            Ok::<_, DataError>(FetchResult::new(ticker, items))
        }
        .await;

        finish(operation, ticker, result)
    }

    /// État financier annuel ; `items` contient exactement un rapport
    ///
    /// `kind` vaut "financials", "balance_sheet" ou "cash_flow" ; toute autre
    /// valeur échoue en `InvalidArgument` avant le moindre appel réseau.
    #[instrument(skip(self))]
    pub async fn get_stock_reports(
        &self,
        ticker: &str,
        kind: &str,
    ) -> ClientResult<FetchResult<ReportRecord>> {
        let operation = Operation::StockReports;
        let result = async {
            let ticker = Ticker::parse(ticker)?;
            let kind: ReportKind = kind.parse()?;
            let raw = self.adapter.fetch_financial_statement(&ticker, kind).await?;
            let report = normalize::normalize_report(&raw, &ticker, kind)?;
            Ok::<_, DataError>(FetchResult::new(ticker, vec![report]))
        }
        .await;

        finish(operation, ticker, result)
    }
}

/// Log + enrobage de l'erreur avec l'opération et le ticker
fn finish<T>(
    operation: Operation,
    ticker: &str,
    result: DataResult<FetchResult<T>>,
) -> ClientResult<FetchResult<T>> {
    match result {
        Ok(fetched) => {
            info!(
                operation = %operation,
                ticker = %fetched.ticker,
                items = fetched.len(),
                "Fetch completed"
            );
            Ok(fetched)
        }
        Err(e) => {
            error!(operation = %operation, ticker = %ticker, kind = %e.kind(), error = %e, "Fetch failed");
            Err(ClientError::new(operation, ticker.trim().to_uppercase(), e))
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
// Double de test : une source en mémoire qui compte ses appels, pour vérifier
// quelles erreurs surviennent avant tout accès au fournisseur.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::provider::{columns, RawRow, RawTable, TableQuery};
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Reply {
        Table(RawTable),
        NetworkDown,
    }

    struct FakeSource {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn table(table: RawTable) -> Self {
            Self {
                reply: Reply::Table(table),
                calls: AtomicUsize::new(0),
            }
        }

        fn network_down() -> Self {
            Self {
                reply: Reply::NetworkDown,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TableSource for FakeSource {
        async fn fetch_table(&self, _query: &TableQuery) -> DataResult<RawTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Table(table) => Ok(table.clone()),
                Reply::NetworkDown => Err(DataError::provider_with_source(
                    "échec de la requête HTTP vers Yahoo Finance",
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
                )),
            }
        }
    }

    fn calls(client: &FinanceClient<FakeSource>) -> usize {
        client.adapter().source().calls.load(Ordering::SeqCst)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(day: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> RawRow {
        RawRow::new(day.and_hms_opt(9, 30, 0).unwrap())
            .with(columns::OPEN, open)
            .with(columns::HIGH, high)
            .with(columns::LOW, low)
            .with(columns::CLOSE, close)
            .with(columns::VOLUME, volume)
    }

    fn dividend(day: NaiveDate, amount: f64) -> RawRow {
        RawRow::new(day.and_hms_opt(9, 30, 0).unwrap()).with(columns::DIVIDENDS, amount)
    }

    #[tokio::test]
    async fn test_aapl_january_scenario() {
        let raw = RawTable::new(vec![
            bar(date(2021, 1, 4), 133.52, 133.61, 126.76, 129.41, 143_301_900),
            bar(date(2021, 1, 5), 128.89, 131.74, 128.43, 131.01, 97_664_900),
            bar(date(2021, 1, 6), 127.72, 131.05, 126.38, 126.60, 155_088_000),
        ]);
        let client = FinanceClient::new(FakeSource::table(raw));

        let before = chrono::Utc::now();
        let result = client
            .get_stock_prices("AAPL", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap();

        assert_eq!(result.ticker.as_str(), "AAPL");
        assert!(result.fetched_at >= before);
        assert_eq!(
            result.items,
            vec![
                PriceRecord::new(date(2021, 1, 4), 133.52, 133.61, 126.76, 129.41, 143_301_900),
                PriceRecord::new(date(2021, 1, 5), 128.89, 131.74, 128.43, 131.01, 97_664_900),
                PriceRecord::new(date(2021, 1, 6), 127.72, 131.05, 126.38, 126.60, 155_088_000),
            ]
        );
        assert_eq!(calls(&client), 1);
    }

    #[tokio::test]
    async fn test_network_error_is_provider_error_with_cause() {
        let client = FinanceClient::new(FakeSource::network_down());

        let err = client
            .get_stock_prices("AAPL", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.operation, Operation::StockPrices);
        assert_eq!(err.ticker, "AAPL");

        let root = err.source().and_then(|inner| inner.source()).unwrap();
        assert_eq!(root.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_empty_prices_is_no_data() {
        let client = FinanceClient::new(FakeSource::table(RawTable::empty()));

        let err = client
            .get_stock_prices("AAPL", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoData);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_prices_outside_range_only_is_no_data() {
        // Seule la ligne ajoutée par l'élargissement est renvoyée
        let raw = RawTable::new(vec![bar(date(2021, 2, 1), 1.0, 1.0, 1.0, 1.0, 1)]);
        let client = FinanceClient::new(FakeSource::table(raw));

        let err = client
            .get_stock_prices("AAPL", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoData);
        assert_eq!(err.operation, Operation::StockPrices);
        assert_eq!(calls(&client), 1);
    }

    #[tokio::test]
    async fn test_malformed_row_is_data_shape_error() {
        let mut broken = bar(date(2021, 1, 5), 1.0, 1.0, 1.0, 1.0, 1);
        broken.cells.remove(columns::VOLUME);
        let client = FinanceClient::new(FakeSource::table(RawTable::new(vec![broken])));

        let err = client
            .get_stock_prices("AAPL", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected_before_provider_call() {
        let client = FinanceClient::new(FakeSource::table(RawTable::empty()));

        let empty_ticker = client
            .get_stock_prices("  ", date(2021, 1, 1), date(2021, 1, 31))
            .await
            .unwrap_err();
        assert_eq!(empty_ticker.kind(), ErrorKind::InvalidArgument);

        let inverted = client
            .get_stock_dividends("AAPL", date(2021, 2, 1), date(2021, 1, 1))
            .await
            .unwrap_err();
        assert_eq!(inverted.kind(), ErrorKind::InvalidArgument);
        assert_eq!(inverted.operation, Operation::StockDividends);

        assert_eq!(calls(&client), 0);
    }

    #[tokio::test]
    async fn test_unknown_report_kind_fails_before_provider_call() {
        let client = FinanceClient::new(FakeSource::table(RawTable::empty()));

        let err = client.get_stock_reports("AAPL", "unknown").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.operation, Operation::StockReports);
        assert_eq!(calls(&client), 0);
    }

    #[tokio::test]
    async fn test_dividend_on_end_date_included() {
        let raw = RawTable::new(vec![
            dividend(date(2021, 2, 5), 0.205),
            dividend(date(2021, 5, 7), 0.22),
        ]);
        let client = FinanceClient::new(FakeSource::table(raw));

        let result = client
            .get_stock_dividends("aapl", date(2021, 1, 1), date(2021, 5, 7))
            .await
            .unwrap();

        assert_eq!(result.ticker.as_str(), "AAPL");
        assert_eq!(result.len(), 2);
        assert_eq!(result.last().unwrap(), &DividendRecord::new(date(2021, 5, 7), 0.22));
    }

    #[tokio::test]
    async fn test_empty_dividends_is_ok() {
        let client = FinanceClient::new(FakeSource::table(RawTable::empty()));

        let result = client
            .get_stock_dividends("TSLA", date(2021, 1, 1), date(2021, 12, 31))
            .await
            .unwrap();

        assert!(result.items.is_empty());
    }

    #[tokio::test]
    async fn test_report_single_item() {
        let raw = RawTable::new(vec![RawRow::new(date(2022, 9, 24).and_hms_opt(0, 0, 0).unwrap())
            .with("TotalAssets", 352755000000u64)]);
        let client = FinanceClient::new(FakeSource::table(raw));

        let result = client.get_stock_reports("AAPL", "balance_sheet").await.unwrap();

        assert_eq!(result.len(), 1);
        let report = &result.items[0];
        assert_eq!(report.report_kind, ReportKind::BalanceSheet);
        assert!(report.value("TotalAssets", "2022-09-24").is_some());
        assert_eq!(calls(&client), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let raw = RawTable::new(vec![bar(date(2021, 1, 4), 1.0, 2.0, 0.5, 1.5, 10)]);
        let client = Arc::new(FinanceClient::new(FakeSource::table(raw)));

        let handles: Vec<_> = ["AAPL", "MSFT", "AAPL"]
            .into_iter()
            .map(|ticker| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .get_stock_prices(ticker, date(2021, 1, 1), date(2021, 1, 31))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.len(), 1);
        }
        assert_eq!(calls(&client), 3);
    }
}
