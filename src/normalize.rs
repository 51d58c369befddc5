// ============================================================================
// Module : normalize
// ============================================================================
// Transforme les RawTable du fournisseur en enregistrements canoniques
//
// Fonctions pures et synchrones. Une ligne mal formée (cellule absente,
// valeur non numérique) fait échouer toute la normalisation avec
// DataError::DataShape : pas de succès partiel à ce niveau.
//
// L'ordre des lignes est celui du fournisseur. Il n'est jamais retrié :
// une date qui recule (ou se répète) est une erreur de forme, car les
// consommateurs (graphiques) comptent sur la monotonie.
// ============================================================================

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::api::provider::{columns, RawRow, RawTable};
use crate::error::{DataError, DataResult};
use crate::models::{DividendRecord, PriceRecord, ReportContent, ReportKind, ReportRecord, Ticker};

/// Lit une cellule numérique obligatoire
fn number_cell(row: &RawRow, column: &str) -> DataResult<f64> {
    let value = row.get(column).ok_or_else(|| {
        DataError::data_shape(format!("colonne '{}' absente à la ligne {}", column, row.index))
    })?;

    value.as_f64().ok_or_else(|| {
        DataError::data_shape(format!(
            "colonne '{}' non numérique à la ligne {} : {}",
            column, row.index, value
        ))
    })
}

/// Volume : entier positif, éventuellement transmis en flottant (ex: 1.5e6)
fn volume_cell(row: &RawRow) -> DataResult<u64> {
    let value = row.get(columns::VOLUME).ok_or_else(|| {
        DataError::data_shape(format!("colonne 'Volume' absente à la ligne {}", row.index))
    })?;

    if let Some(volume) = value.as_u64() {
        return Ok(volume);
    }

    match value.as_f64() {
        Some(volume) if volume >= 0.0 && volume.fract() == 0.0 && volume <= u64::MAX as f64 => {
            Ok(volume as u64)
        }
        _ => Err(DataError::data_shape(format!(
            "volume invalide à la ligne {} : {}",
            row.index, value
        ))),
    }
}

/// Garde la trace de la dernière date pour refuser tout recul
struct OrderGuard {
    previous: Option<NaiveDate>,
}

impl OrderGuard {
    fn new() -> Self {
        Self { previous: None }
    }

    fn check(&mut self, date: NaiveDate) -> DataResult<()> {
        if let Some(previous) = self.previous {
            if date <= previous {
                return Err(DataError::data_shape(format!(
                    "dates non croissantes : {} après {}",
                    date, previous
                )));
            }
        }
        self.previous = Some(date);
        Ok(())
    }
}

fn in_range(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= date && date <= end
}

/// Barres OHLCV comprises dans `[start, end]`
///
/// Traduction des colonnes : Open→open, High→high, Low→low, Close→close,
/// Volume→volume. Les lignes hors intervalle (dont celle ajoutée par
/// l'élargissement de la requête) sont ignorées.
pub fn normalize_prices(
    raw: &RawTable,
    start: NaiveDate,
    end: NaiveDate,
) -> DataResult<Vec<PriceRecord>> {
    let mut guard = OrderGuard::new();
    let mut records = Vec::with_capacity(raw.len());

    for row in &raw.rows {
        let date = row.index.date();
        if !in_range(date, start, end) {
            continue;
        }
        guard.check(date)?;

        records.push(PriceRecord::new(
            date,
            number_cell(row, columns::OPEN)?,
            number_cell(row, columns::HIGH)?,
            number_cell(row, columns::LOW)?,
            number_cell(row, columns::CLOSE)?,
            volume_cell(row)?,
        ));
    }

    debug!(
        kept = records.len(),
        total = raw.len(),
        "Finished normalizing price rows"
    );
    Ok(records)
}

/// Dividendes tels que `start <= date <= end` (bornes incluses)
pub fn normalize_dividends(
    raw: &RawTable,
    start: NaiveDate,
    end: NaiveDate,
) -> DataResult<Vec<DividendRecord>> {
    let mut guard = OrderGuard::new();
    let mut records = Vec::new();

    for row in &raw.rows {
        let date = row.index.date();
        if !in_range(date, start, end) {
            continue;
        }
        guard.check(date)?;

        let amount = number_cell(row, columns::DIVIDENDS)?;
        if amount < 0.0 {
            return Err(DataError::data_shape(format!(
                "dividende négatif le {} : {}",
                date, amount
            )));
        }
        records.push(DividendRecord::new(date, amount));
    }

    debug!(
        kept = records.len(),
        total = raw.len(),
        "Finished normalizing dividend rows"
    );
    Ok(records)
}

/// Re-indexe un état financier : poste -> (date "YYYY-MM-DD" -> valeur)
///
/// `as_of` est pris au moment de la normalisation : normaliser deux fois le
/// même tableau brut donne deux horodatages différents.
pub fn normalize_report(raw: &RawTable, ticker: &Ticker, kind: ReportKind) -> DataResult<ReportRecord> {
    let mut content = ReportContent::new();

    for row in &raw.rows {
        let period_end = row.index.date().format("%Y-%m-%d").to_string();
        for (line_item, value) in &row.cells {
            if line_item.is_empty() {
                return Err(DataError::data_shape(format!(
                    "poste sans nom pour la période {}",
                    period_end
                )));
            }
            let previous = content
                .entry(line_item.clone())
                .or_default()
                .insert(period_end.clone(), value.clone());
            if previous.is_some() {
                return Err(DataError::data_shape(format!(
                    "période {} en double pour le poste '{}'",
                    period_end, line_item
                )));
            }
        }
    }

    debug!(
        line_items = content.len(),
        periods = raw.len(),
        "Finished normalizing report"
    );

    Ok(ReportRecord {
        ticker: ticker.clone(),
        report_kind: kind,
        as_of: Utc::now(),
        content,
    })
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(day: NaiveDate, close: f64) -> RawRow {
        RawRow::new(day.and_hms_opt(9, 30, 0).unwrap())
            .with(columns::OPEN, close - 1.0)
            .with(columns::HIGH, close + 1.0)
            .with(columns::LOW, close - 2.0)
            .with(columns::CLOSE, close)
            .with(columns::VOLUME, 1_000u64)
    }

    fn dividend(day: NaiveDate, amount: f64) -> RawRow {
        RawRow::new(day.and_hms_opt(9, 30, 0).unwrap()).with(columns::DIVIDENDS, amount)
    }

    #[test]
    fn test_prices_field_translation() {
        let raw = RawTable::new(vec![RawRow::new(date(2021, 1, 4).and_hms_opt(9, 30, 0).unwrap())
            .with(columns::OPEN, 133.52)
            .with(columns::HIGH, 133.61)
            .with(columns::LOW, 126.76)
            .with(columns::CLOSE, 129.41)
            .with(columns::VOLUME, 143_301_900u64)]);

        let records = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap();
        assert_eq!(
            records,
            vec![PriceRecord::new(date(2021, 1, 4), 133.52, 133.61, 126.76, 129.41, 143_301_900)]
        );
    }

    #[test]
    fn test_prices_trimmed_to_range() {
        // La ligne du 1er février vient de l'élargissement de la requête
        let raw = RawTable::new(vec![
            bar(date(2020, 12, 31), 10.0),
            bar(date(2021, 1, 4), 11.0),
            bar(date(2021, 1, 29), 12.0),
            bar(date(2021, 2, 1), 13.0),
        ]);
        let (start, end) = (date(2021, 1, 1), date(2021, 1, 31));

        let records = normalize_prices(&raw, start, end).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| start <= r.date && r.date <= end));
    }

    #[test]
    fn test_prices_end_boundary_included() {
        let raw = RawTable::new(vec![bar(date(2021, 1, 4), 11.0), bar(date(2021, 1, 5), 12.0)]);
        let records = normalize_prices(&raw, date(2021, 1, 4), date(2021, 1, 5)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_prices_out_of_order_rejected() {
        let raw = RawTable::new(vec![bar(date(2021, 1, 6), 11.0), bar(date(2021, 1, 5), 12.0)]);
        let err = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_prices_duplicate_date_rejected() {
        let raw = RawTable::new(vec![bar(date(2021, 1, 5), 11.0), bar(date(2021, 1, 5), 12.0)]);
        let err = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_out_of_order_rows_outside_range_are_ignored() {
        // Le désordre hors intervalle ne concerne pas la sortie
        let raw = RawTable::new(vec![
            bar(date(2021, 3, 1), 9.0),
            bar(date(2021, 1, 4), 11.0),
            bar(date(2021, 1, 5), 12.0),
        ]);
        let records = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_prices_output_is_strictly_increasing() {
        let raw = RawTable::new(
            (4..=29)
                .filter_map(|d| NaiveDate::from_ymd_opt(2021, 1, d))
                .map(|d| bar(d, 100.0))
                .collect(),
        );
        let records = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap();
        assert!(records.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_missing_field_fails_whole_normalization() {
        let mut broken = bar(date(2021, 1, 5), 12.0);
        broken.cells.remove(columns::HIGH);
        let raw = RawTable::new(vec![bar(date(2021, 1, 4), 11.0), broken]);

        let err = normalize_prices(&raw, date(2021, 1, 1), date(2021, 1, 31)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
        assert!(err.to_string().contains("High"));
    }

    #[test]
    fn test_non_numeric_price_rejected() {
        let row = bar(date(2021, 1, 4), 11.0).with(columns::CLOSE, "n/a");
        let err = normalize_prices(&RawTable::new(vec![row]), date(2021, 1, 1), date(2021, 1, 31))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_volume_as_integral_float_accepted() {
        let row = bar(date(2021, 1, 4), 11.0).with(columns::VOLUME, 2_500_000.0);
        let records =
            normalize_prices(&RawTable::new(vec![row]), date(2021, 1, 1), date(2021, 1, 31)).unwrap();
        assert_eq!(records[0].volume, 2_500_000);
    }

    #[test]
    fn test_negative_volume_rejected() {
        let row = bar(date(2021, 1, 4), 11.0).with(columns::VOLUME, -5);
        let err = normalize_prices(&RawTable::new(vec![row]), date(2021, 1, 1), date(2021, 1, 31))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_dividends_inclusive_boundaries() {
        let raw = RawTable::new(vec![
            dividend(date(2020, 12, 31), 0.1),
            dividend(date(2021, 1, 1), 0.2),
            dividend(date(2021, 6, 1), 0.3),
            dividend(date(2021, 12, 31), 0.4),
            dividend(date(2022, 1, 1), 0.5),
        ]);

        let records = normalize_dividends(&raw, date(2021, 1, 1), date(2021, 12, 31)).unwrap();
        let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_dividends_empty_table_is_empty_vec() {
        let records =
            normalize_dividends(&RawTable::empty(), date(2021, 1, 1), date(2021, 12, 31)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_negative_dividend_rejected() {
        let raw = RawTable::new(vec![dividend(date(2021, 3, 1), -0.1)]);
        let err = normalize_dividends(&raw, date(2021, 1, 1), date(2021, 12, 31)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_report_rekeyed_by_line_item() {
        let period = |d| RawRow::new(d);
        let raw = RawTable::new(vec![
            period(date(2021, 9, 25).and_hms_opt(0, 0, 0).unwrap())
                .with("TotalRevenue", 365817000000u64)
                .with("NetIncome", 94680000000u64),
            period(date(2022, 9, 24).and_hms_opt(0, 0, 0).unwrap())
                .with("TotalRevenue", 394328000000u64)
                .with("NetIncome", serde_json::Value::Null),
        ]);
        let ticker = Ticker::parse("AAPL").unwrap();

        let report = normalize_report(&raw, &ticker, ReportKind::Financials).unwrap();

        assert_eq!(report.ticker, ticker);
        assert_eq!(report.report_kind, ReportKind::Financials);
        assert_eq!(report.content.len(), 2);
        assert_eq!(report.value("TotalRevenue", "2021-09-25"), Some(&json!(365817000000u64)));
        assert_eq!(report.value("NetIncome", "2022-09-24"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn test_report_empty_table_gives_empty_content() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let report = normalize_report(&RawTable::empty(), &ticker, ReportKind::CashFlow).unwrap();
        assert!(report.content.is_empty());
    }

    #[test]
    fn test_report_as_of_is_normalization_time() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let raw = RawTable::empty();

        let before = Utc::now();
        let first = normalize_report(&raw, &ticker, ReportKind::BalanceSheet).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = normalize_report(&raw, &ticker, ReportKind::BalanceSheet).unwrap();

        assert!(first.as_of >= before);
        assert!(second.as_of > first.as_of);
    }
}
