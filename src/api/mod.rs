// ============================================================================
// Module : api
// ============================================================================
// Accès au fournisseur de données de marché
//
// - provider : contrat commun (TableSource, RawTable, ProviderAdapter)
// - yahoo : implémentation HTTP pour Yahoo Finance
// ============================================================================

pub mod provider;
pub mod yahoo;

pub use provider::{ProviderAdapter, RawRow, RawTable, TableQuery, TableSource};
pub use yahoo::YahooSource;
