// ============================================================================
// Module : backfill
// ============================================================================
// Complète une série de prix déjà stockée
//
// 1. valide la demande (ticker, start <= end, end pas dans le futur)
// 2. analyse la couverture des jours ouvrés sur les données existantes
// 3. ne demande au FinanceClient que les plages manquantes, une par une
// 4. fusionne existant + nouveau, triés par date
//
// L'échec d'une plage (jour férié isolé, erreur réseau...) est loggé puis
// ignoré : les autres plages sont quand même récupérées.
// ============================================================================

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::api::provider::{ensure_range, TableSource};
use crate::client::FinanceClient;
use crate::completeness::analyze_completeness;
use crate::error::{DataError, DataResult, ErrorKind};
use crate::models::{PriceRecord, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub total_records: usize,
    pub new_records: usize,
    /// Plages manquantes pour lesquelles une requête a été tentée
    pub missing_ranges_fetched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Backfill {
    /// Existant + nouveau, trié par date croissante et sans doublon
    pub data: Vec<PriceRecord>,
    /// Faux si la série était déjà complète (aucune requête)
    pub was_data_completed: bool,
    pub fetched_new_data: bool,
    pub summary: BackfillSummary,
}

impl Backfill {
    fn unchanged(existing: Vec<PriceRecord>) -> Self {
        let total_records = existing.len();
        Self {
            data: existing,
            was_data_completed: false,
            fetched_new_data: false,
            summary: BackfillSummary {
                total_records,
                new_records: 0,
                missing_ranges_fetched: 0,
            },
        }
    }
}

fn validate(ticker: &str, start: NaiveDate, end: NaiveDate) -> DataResult<Ticker> {
    let ticker = Ticker::parse(ticker)?;
    ensure_range(start, end)?;

    let today = Utc::now().date_naive();
    if end > today {
        return Err(DataError::invalid_argument(format!(
            "la date de fin {} est dans le futur",
            end
        )));
    }
    Ok(ticker)
}

/// Récupère uniquement les jours ouvrés absents de `existing`
///
/// # Erreurs
/// * `InvalidArgument` : ticker vide, `start > end` ou `end` dans le futur
///
/// Les erreurs des requêtes par plage ne remontent pas.
#[instrument(skip(client, existing), fields(existing = existing.len()))]
pub async fn fill_missing<S: TableSource>(
    client: &FinanceClient<S>,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    existing: Vec<PriceRecord>,
) -> DataResult<Backfill> {
    let ticker = validate(ticker, start, end)?;

    let report = analyze_completeness(ticker.as_str(), start, end, &existing)?;
    if report.is_complete {
        info!(%ticker, "Stored prices already complete, nothing to fetch");
        return Ok(Backfill::unchanged(existing));
    }

    let mut fetched = Vec::new();
    for range in &report.missing_ranges {
        info!(%ticker, start = %range.start, end = %range.end, "Fetching missing range");

        match client
            .get_stock_prices(ticker.as_str(), range.start, range.end)
            .await
        {
            Ok(result) => fetched.extend(result.items),
            Err(e) if e.kind() == ErrorKind::NoData => {
                warn!(%ticker, start = %range.start, end = %range.end, "No data returned for missing range");
            }
            Err(e) => {
                error!(%ticker, start = %range.start, end = %range.end, error = %e, "Failed to fetch missing range");
            }
        }
    }

    let new_records = fetched.len();
    let mut data = existing;
    data.extend(fetched);
    data.sort_by_key(|price| price.date);
    data.dedup_by_key(|price| price.date);

    let summary = BackfillSummary {
        total_records: data.len(),
        new_records,
        missing_ranges_fetched: report.missing_ranges.len(),
    };
    info!(%ticker, ?summary, "Backfill finished");

    Ok(Backfill {
        data,
        was_data_completed: true,
        fetched_new_data: new_records > 0,
        summary,
    })
}

// ============================================================================
// Tests unitaires
// ============================================================================
