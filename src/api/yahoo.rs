// ============================================================================
// API Client : Yahoo Finance
// ============================================================================
// Implémente TableSource au-dessus de deux endpoints Yahoo :
// - v8/finance/chart : barres journalières OHLCV + événements de dividendes
// - ws/fundamentals-timeseries : postes annuels des états financiers
//
// Chaque réponse JSON est convertie en RawTable, sans interprétation des
// valeurs : la validation des types est le travail du normaliseur.
// ============================================================================

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::api::provider::{columns, RawRow, RawTable, TableQuery, TableSource};
use crate::config::ProviderConfig;
use crate::error::{DataError, DataResult};
use crate::models::{ReportKind, Ticker};

// ============================================================================
// Structures pour parser la réponse JSON de l'API chart
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<Events>,
}

/// Métadonnées du ticker
#[derive(Debug, Deserialize)]
struct Meta {
    symbol: String,
    /// Décalage de la place de cotation par rapport à UTC, en secondes
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Colonnes OHLCV, chaque valeur pouvant être null
#[derive(Debug, Deserialize)]
struct Quote {
    open: Option<Vec<serde_json::Value>>,
    high: Option<Vec<serde_json::Value>>,
    low: Option<Vec<serde_json::Value>>,
    close: Option<Vec<serde_json::Value>>,
    volume: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Events {
    dividends: Option<HashMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: serde_json::Value,
    date: i64,
}

// ============================================================================
// Structures pour l'API fundamentals-timeseries
// ============================================================================
// Chaque élément de `result` porte une clé dynamique (ex: "annualTotalRevenue")
// d'où le passage par serde_json::Value pour le contenu.

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: Timeseries,
}

#[derive(Debug, Deserialize)]
struct Timeseries {
    result: Option<Vec<serde_json::Value>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeseriesEntry {
    as_of_date: NaiveDate,
    reported_value: Option<ReportedValue>,
}

#[derive(Debug, Deserialize)]
struct ReportedValue {
    raw: serde_json::Value,
}

/// Préfixe des séries annuelles, retiré des noms de postes
const ANNUAL_PREFIX: &str = "annual";

/// Premier exercice demandé à l'API fundamentals (fin 2016)
const TIMESERIES_PERIOD1: i64 = 1_483_142_400;

/// Postes demandés pour chaque type d'état financier
fn line_items(kind: ReportKind) -> &'static [&'static str] {
    match kind {
        ReportKind::Financials => &[
            "TotalRevenue",
            "CostOfRevenue",
            "GrossProfit",
            "ResearchAndDevelopment",
            "SellingGeneralAndAdministration",
            "OperatingExpense",
            "OperatingIncome",
            "InterestExpense",
            "PretaxIncome",
            "TaxProvision",
            "NetIncome",
            "NetIncomeCommonStockholders",
            "BasicEPS",
            "DilutedEPS",
            "BasicAverageShares",
            "DilutedAverageShares",
            "EBIT",
            "EBITDA",
        ],
        ReportKind::BalanceSheet => &[
            "TotalAssets",
            "CurrentAssets",
            "CashAndCashEquivalents",
            "AccountsReceivable",
            "Inventory",
            "NetPPE",
            "Goodwill",
            "TotalLiabilitiesNetMinorityInterest",
            "CurrentLiabilities",
            "AccountsPayable",
            "LongTermDebt",
            "TotalDebt",
            "StockholdersEquity",
            "RetainedEarnings",
            "OrdinarySharesNumber",
            "WorkingCapital",
            "TangibleBookValue",
            "InvestedCapital",
        ],
        ReportKind::CashFlow => &[
            "OperatingCashFlow",
            "InvestingCashFlow",
            "FinancingCashFlow",
            "FreeCashFlow",
            "CapitalExpenditure",
            "DepreciationAndAmortization",
            "StockBasedCompensation",
            "ChangeInWorkingCapital",
            "NetIncomeFromContinuingOperations",
            "CashDividendsPaid",
            "RepurchaseOfCapitalStock",
            "IssuanceOfDebt",
            "RepaymentOfDebt",
            "BeginningCashPosition",
            "EndCashPosition",
        ],
    }
}

// ============================================================================
// YahooSource
// ============================================================================

/// Source de tableaux adossée à l'API publique Yahoo Finance
#[derive(Debug, Clone)]
pub struct YahooSource {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl YahooSource {
    /// Construit le client HTTP (User-Agent + timeout de la config)
    pub fn new(config: ProviderConfig) -> DataResult<Self> {
        debug!(timeout = ?config.timeout, "Creating HTTP client");
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::provider_with_source("échec de la création du client HTTP", e))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// GET + lecture du corps ; renvoie None sur 404
    async fn get_body(&self, url: Url) -> DataResult<Option<String>> {
        debug!(url = %url, "Sending HTTP request to Yahoo Finance");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DataError::provider_with_source("échec de la requête HTTP vers Yahoo Finance", e))?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        // Symbole inconnu ou retiré de la cote : Yahoo répond 404
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(url = %url, "Yahoo Finance returned 404, treating as empty table");
            return Ok(None);
        }

        if !status.is_success() {
            error!(status = %status, "Yahoo Finance returned error status");
            return Err(DataError::provider(format!(
                "Yahoo Finance a retourné une erreur : HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DataError::provider_with_source("échec de la lecture de la réponse Yahoo", e))?;
        Ok(Some(body))
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn fetch_chart(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end_exclusive: NaiveDate,
        with_dividends: bool,
    ) -> DataResult<Option<ChartResult>> {
        let url = build_chart_url(
            &self.config.chart_base_url,
            ticker,
            start,
            end_exclusive,
            with_dividends,
        )?;

        let Some(body) = self.get_body(url).await? else {
            return Ok(None);
        };

        debug!("Parsing JSON response");
        let response: ChartResponse = serde_json::from_str(&body)
            .map_err(|e| DataError::data_shape(format!("réponse chart illisible : {}", e)))?;

        if let Some(err) = response.chart.error {
            return Err(chart_error(err));
        }

        Ok(response.chart.result.and_then(|results| results.into_iter().next()))
    }

    async fn fetch_prices(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> DataResult<RawTable> {
        match self.fetch_chart(ticker, start, end_exclusive, false).await? {
            Some(result) => parse_price_rows(result),
            None => Ok(RawTable::empty()),
        }
    }

    async fn fetch_dividends(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> DataResult<RawTable> {
        match self.fetch_chart(ticker, start, end_exclusive, true).await? {
            Some(result) => parse_dividend_rows(result),
            None => Ok(RawTable::empty()),
        }
    }

    #[instrument(skip(self), fields(ticker = %ticker, kind = %kind))]
    async fn fetch_statement(&self, ticker: &Ticker, kind: ReportKind) -> DataResult<RawTable> {
        let url = build_timeseries_url(
            &self.config.timeseries_base_url,
            ticker,
            kind,
            Utc::now().timestamp(),
        )?;

        let Some(body) = self.get_body(url).await? else {
            return Ok(RawTable::empty());
        };

        let response: TimeseriesResponse = serde_json::from_str(&body)
            .map_err(|e| DataError::data_shape(format!("réponse timeseries illisible : {}", e)))?;

        if let Some(err) = response.timeseries.error.filter(|e| !e.is_null()) {
            return Err(DataError::provider(format!("Yahoo Finance : {}", err)));
        }

        parse_statement_rows(response.timeseries.result.unwrap_or_default())
    }
}

#[async_trait]
impl TableSource for YahooSource {
    async fn fetch_table(&self, query: &TableQuery) -> DataResult<RawTable> {
        let table = match query {
            TableQuery::PriceHistory {
                ticker,
                start,
                end_exclusive,
            } => self.fetch_prices(ticker, *start, *end_exclusive).await?,
            TableQuery::DividendHistory {
                ticker,
                start,
                end_exclusive,
            } => self.fetch_dividends(ticker, *start, *end_exclusive).await?,
            TableQuery::FinancialStatement { ticker, kind } => {
                self.fetch_statement(ticker, *kind).await?
            }
        };

        info!(
            query = query.label(),
            ticker = %query.ticker(),
            rows = table.len(),
            "Successfully fetched Yahoo table"
        );
        Ok(table)
    }
}

// ============================================================================
// Construction des URLs
// ============================================================================

/// Minuit UTC du jour donné, en timestamp Unix
fn day_start_timestamp(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
        .unwrap_or_default()
}

/// Base + segments de chemin, chaque segment étant encodé séparément
fn endpoint_url(base_url: &str, segments: &[&str]) -> DataResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| DataError::provider_with_source(format!("URL de base invalide : {}", base_url), e))?;

    url.path_segments_mut()
        .map_err(|_| DataError::provider(format!("URL de base sans chemin : {}", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// URL de l'API chart
///
/// `period1` part de la veille de `start` : une barre datée `start` en heure
/// locale peut être horodatée la veille en UTC (places en avance sur UTC).
/// Le normaliseur écarte le jour en trop.
fn build_chart_url(
    base_url: &str,
    ticker: &Ticker,
    start: NaiveDate,
    end_exclusive: NaiveDate,
    with_dividends: bool,
) -> DataResult<Url> {
    let period1 = start.pred_opt().unwrap_or(start);

    let mut url = endpoint_url(base_url, &["v8", "finance", "chart", ticker.as_str()])?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("period1", &day_start_timestamp(period1).to_string())
            .append_pair("period2", &day_start_timestamp(end_exclusive).to_string())
            .append_pair("interval", "1d")
            .append_pair("includePrePost", "false");
        if with_dividends {
            query.append_pair("events", "div");
        }
    }
    Ok(url)
}

fn build_timeseries_url(
    base_url: &str,
    ticker: &Ticker,
    kind: ReportKind,
    period2: i64,
) -> DataResult<Url> {
    let types = line_items(kind)
        .iter()
        .map(|item| format!("{}{}", ANNUAL_PREFIX, item))
        .collect::<Vec<_>>()
        .join(",");

    let mut url = endpoint_url(
        base_url,
        &["ws", "fundamentals-timeseries", "v1", "finance", "timeseries", ticker.as_str()],
    )?;
    url.query_pairs_mut()
        .append_pair("symbol", ticker.as_str())
        .append_pair("type", &types)
        .append_pair("period1", &TIMESERIES_PERIOD1.to_string())
        .append_pair("period2", &period2.to_string());
    Ok(url)
}

// ============================================================================
// Conversion des réponses en RawTable
// ============================================================================

fn chart_error(err: ChartError) -> DataError {
    let description = err.description.unwrap_or_default();
    DataError::provider(format!("Yahoo Finance : {} {}", err.code, description).trim_end().to_string())
}

/// Timestamp Unix -> heure locale de la place de cotation
fn exchange_local(timestamp: i64, gmtoffset: i64) -> DataResult<NaiveDateTime> {
    timestamp
        .checked_add(gmtoffset)
        .and_then(|local| DateTime::from_timestamp(local, 0))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            DataError::data_shape(format!(
                "timestamp invalide : {} (gmtoffset {})",
                timestamp, gmtoffset
            ))
        })
}

fn cell_at(column: &Option<Vec<serde_json::Value>>, i: usize) -> Option<&serde_json::Value> {
    column.as_ref()?.get(i).filter(|value| !value.is_null())
}

fn parse_price_rows(result: ChartResult) -> DataResult<RawTable> {
    let timestamps = result.timestamp.unwrap_or_default();
    debug!(symbol = %result.meta.symbol, timestamp_count = timestamps.len(), "Received timestamps from Yahoo");

    if timestamps.is_empty() {
        return Ok(RawTable::empty());
    }

    let quote = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .ok_or_else(|| DataError::data_shape("pas de données OHLC dans la réponse"))?;

    let mut rows = Vec::with_capacity(timestamps.len());
    let mut skipped_count = 0;

    for (i, &timestamp) in timestamps.iter().enumerate() {
        let prices = [
            (columns::OPEN, cell_at(&quote.open, i)),
            (columns::HIGH, cell_at(&quote.high, i)),
            (columns::LOW, cell_at(&quote.low, i)),
            (columns::CLOSE, cell_at(&quote.close, i)),
        ];

        // Ligne fantôme (aucun prix) : Yahoo en insère les jours sans cotation
        if prices.iter().all(|(_, value)| value.is_none()) {
            skipped_count += 1;
            continue;
        }

        let mut row = RawRow::new(exchange_local(timestamp, result.meta.gmtoffset)?);
        let volume = (columns::VOLUME, cell_at(&quote.volume, i));
        for (column, value) in prices.into_iter().chain(std::iter::once(volume)) {
            if let Some(value) = value {
                row.cells.insert(column.to_string(), value.clone());
            }
        }
        rows.push(row);
    }

    if skipped_count > 0 {
        warn!(
            skipped = skipped_count,
            total = timestamps.len(),
            "Skipped placeholder rows without prices"
        );
    }

    Ok(RawTable::new(rows))
}

fn parse_dividend_rows(result: ChartResult) -> DataResult<RawTable> {
    let gmtoffset = result.meta.gmtoffset;
    let mut events: Vec<DividendEvent> = result
        .events
        .and_then(|events| events.dividends)
        .map(|dividends| dividends.into_values().collect())
        .unwrap_or_default();

    // Yahoo renvoie un objet indexé par timestamp, donc sans ordre
    events.sort_by_key(|event| event.date);

    let rows = events
        .into_iter()
        .map(|event| {
            Ok(RawRow::new(exchange_local(event.date, gmtoffset)?)
                .with(columns::DIVIDENDS, event.amount))
        })
        .collect::<DataResult<Vec<_>>>()?;

    debug!(dividends = rows.len(), "Parsed dividend events");
    Ok(RawTable::new(rows))
}

/// Pivot : une série par poste -> une ligne par date de clôture
fn parse_statement_rows(results: Vec<serde_json::Value>) -> DataResult<RawTable> {
    let mut by_period: BTreeMap<NaiveDate, RawRow> = BTreeMap::new();

    for series in results {
        let key = series
            .pointer("/meta/type/0")
            .and_then(|value| value.as_str())
            .ok_or_else(|| DataError::data_shape("série timeseries sans meta.type"))?
            .to_string();

        // Poste sans historique : la clé est simplement absente
        let Some(entries) = series.get(&key).and_then(|value| value.as_array()) else {
            continue;
        };

        let line_item = key.strip_prefix(ANNUAL_PREFIX).unwrap_or(&key).to_string();

        for entry in entries.iter().filter(|entry| !entry.is_null()) {
            let entry: TimeseriesEntry = serde_json::from_value(entry.clone()).map_err(|e| {
                DataError::data_shape(format!("entrée '{}' illisible : {}", key, e))
            })?;
            let Some(reported) = entry.reported_value else {
                continue;
            };

            let index = entry
                .as_of_date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| DataError::data_shape("date de clôture invalide"))?;
            by_period
                .entry(entry.as_of_date)
                .or_insert_with(|| RawRow::new(index))
                .cells
                .insert(line_item.clone(), reported.raw);
        }
    }

    debug!(periods = by_period.len(), "Parsed statement periods");
    Ok(RawTable::new(by_period.into_values().collect()))
}

// ============================================================================
// Tests unitaires
// ============================================================================
