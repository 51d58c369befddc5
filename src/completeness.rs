// ============================================================================
// Module : completeness
// ============================================================================
// Vérifie qu'une série de prix couvre tous les jours ouvrés demandés
//
// Jours attendus : du lundi au vendredi entre start et end inclus (les jours
// fériés ne sont pas connus, ils apparaissent donc comme manquants).
// Les jours manquants sont regroupés en plages : deux dates manquantes
// espacées de 3 jours ou moins (un week-end) tombent dans la même plage.
// ============================================================================

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tracing::info;

use crate::api::provider::ensure_range;
use crate::error::DataResult;
use crate::models::PriceRecord;

/// Écart maximal (en jours) entre deux manques d'une même plage
const MAX_GAP_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub is_complete: bool,
    pub missing_ranges: Vec<DateRange>,
    pub total_expected_days: usize,
    pub total_existing_days: usize,
}

/// Jours ouvrés (lundi-vendredi) de `start` à `end` inclus
pub fn business_days(start: NaiveDate, end: NaiveDate) -> DataResult<Vec<NaiveDate>> {
    ensure_range(start, end)?;
    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect())
}

/// Regroupe des dates triées en plages continues (week-ends tolérés)
pub fn group_consecutive(dates: &[NaiveDate]) -> Vec<DateRange> {
    let mut ranges: Vec<DateRange> = Vec::new();

    for &date in dates {
        match ranges.last_mut() {
            Some(range) if (date - range.end).num_days() <= MAX_GAP_DAYS => range.end = date,
            _ => ranges.push(DateRange { start: date, end: date }),
        }
    }
    ranges
}

pub fn analyze_completeness(
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    prices: &[PriceRecord],
) -> DataResult<CompletenessReport> {
    let expected = business_days(start, end)?;
    let existing: HashSet<NaiveDate> = prices.iter().map(|price| price.date).collect();

    let missing: Vec<NaiveDate> = expected
        .iter()
        .copied()
        .filter(|day| !existing.contains(day))
        .collect();
    let missing_ranges = group_consecutive(&missing);

    let report = CompletenessReport {
        is_complete: missing_ranges.is_empty(),
        missing_ranges,
        total_expected_days: expected.len(),
        total_existing_days: prices.len(),
    };

    info!(
        ticker = %ticker,
        complete = report.is_complete,
        existing = report.total_existing_days,
        expected = report.total_expected_days,
        missing_ranges = report.missing_ranges.len(),
        "Analyzed data completeness"
    );
    Ok(report)
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn bar(date: NaiveDate) -> PriceRecord {
        PriceRecord::new(date, 1.0, 1.0, 1.0, 1.0, 1)
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 1er janvier 2021 : vendredi
        let days = business_days(jan(1), jan(11)).unwrap();
        assert_eq!(days, vec![jan(1), jan(4), jan(5), jan(6), jan(7), jan(8), jan(11)]);
    }

    #[test]
    fn test_business_days_inverted_range() {
        let err = business_days(jan(5), jan(4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_group_spans_weekend() {
        let ranges = group_consecutive(&[jan(8), jan(11), jan(20)]);
        assert_eq!(
            ranges,
            vec![
                DateRange { start: jan(8), end: jan(11) },
                DateRange { start: jan(20), end: jan(20) },
            ]
        );
    }

    #[test]
    fn test_group_empty() {
        assert!(group_consecutive(&[]).is_empty());
    }

    #[test]
    fn test_complete_series() {
        let prices: Vec<_> = [4, 5, 6, 7, 8].into_iter().map(|d| bar(jan(d))).collect();
        let report = analyze_completeness("AAPL", jan(4), jan(8), &prices).unwrap();

        assert!(report.is_complete);
        assert_eq!(report.total_expected_days, 5);
        assert_eq!(report.total_existing_days, 5);
    }

    #[test]
    fn test_missing_ranges_reported() {
        // Manquent le 1er (férié), puis le 7 et le 8
        let prices: Vec<_> = [4, 5, 6, 11].into_iter().map(|d| bar(jan(d))).collect();
        let report = analyze_completeness("AAPL", jan(1), jan(11), &prices).unwrap();

        assert!(!report.is_complete);
        assert_eq!(
            report.missing_ranges,
            vec![
                DateRange { start: jan(1), end: jan(1) },
                DateRange { start: jan(7), end: jan(8) },
            ]
        );
    }
}
