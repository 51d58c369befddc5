// ============================================================================
// StockFetch - Library
// ============================================================================
// Récupère prix, dividendes et états financiers d'un ticker depuis Yahoo
// Finance et les normalise en enregistrements stables
//
// Point d'entrée : client::FinanceClient
// ============================================================================

pub mod api;          // Fournisseur de données (trait + Yahoo)
pub mod backfill;     // Complément des plages de prix manquantes
pub mod cache;        // Décorateur de cache devant FinanceClient
pub mod client;       // Façade FinanceClient
pub mod completeness; // Couverture des jours ouvrés
pub mod config;       // Configuration (URLs, timeout, répertoires)
pub mod error;        // Taxonomie d'erreurs
pub mod export;       // Écriture CSV / JSON
pub mod models;       // Enregistrements canoniques
pub mod normalize;    // RawTable -> enregistrements

pub use client::FinanceClient;
pub use error::{ClientError, DataError, ErrorKind};
pub use models::{DividendRecord, FetchResult, PriceRecord, ReportKind, ReportRecord, Ticker};
