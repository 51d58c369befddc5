// ============================================================================
// Module : models
// ============================================================================
// Enregistrements canoniques, indépendants du fournisseur
//
// Tous sont créés à chaque appel, jamais modifiés ensuite, et appartiennent
// à l'appelant qui les a demandés.
// ============================================================================

pub mod fetch_result;
pub mod price;
pub mod report;
pub mod ticker;

pub use fetch_result::FetchResult;
pub use price::{DividendRecord, PriceRecord};
pub use report::{ReportContent, ReportKind, ReportRecord};
pub use ticker::Ticker;
