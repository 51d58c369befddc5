// ============================================================================
// Module : error
// ============================================================================
// Taxonomie d'erreurs de la couche fetch + normalisation
//
// Deux niveaux :
// - DataError : erreur produite par l'adaptateur ou le normaliseur
// - ClientError : erreur vue par l'appelant de FinanceClient, qui ajoute
//   l'opération et le ticker mais conserve le ErrorKind d'origine
// ============================================================================

use std::fmt;

use thiserror::Error;

/// Cause d'origine d'une erreur fournisseur (reqwest, serde_json, ...)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Catégorie d'erreur sur laquelle l'appelant peut brancher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ticker vide, dates inversées, type de rapport inconnu
    InvalidArgument,
    /// Le fournisseur n'a aucun prix dans l'intervalle
    NoData,
    /// Échec réseau ou côté fournisseur
    Provider,
    /// Le fournisseur a renvoyé une forme que le normaliseur ne sait pas lire
    DataShape,
}

impl ErrorKind {
    /// Seules les erreurs fournisseur valent la peine d'être retentées
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Provider)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NoData => "no_data",
            ErrorKind::Provider => "provider_error",
            ErrorKind::DataShape => "data_shape_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Erreur de l'adaptateur fournisseur ou du normaliseur
#[derive(Debug, Error)]
pub enum DataError {
    #[error("argument invalide : {0}")]
    InvalidArgument(String),

    #[error("aucune donnée : {0}")]
    NoData(String),

    #[error("erreur du fournisseur : {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("forme de données inattendue : {0}")]
    DataShape(String),
}

impl DataError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DataError::InvalidArgument(message.into())
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        DataError::NoData(message.into())
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        DataError::DataShape(message.into())
    }

    /// Erreur fournisseur sans cause sous-jacente (ex: statut HTTP)
    pub fn provider(message: impl Into<String>) -> Self {
        DataError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Erreur fournisseur qui conserve la cause d'origine
    pub fn provider_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        DataError::Provider {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DataError::NoData(_) => ErrorKind::NoData,
            DataError::Provider { .. } => ErrorKind::Provider,
            DataError::DataShape(_) => ErrorKind::DataShape,
        }
    }
}

/// Les trois opérations exposées par FinanceClient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StockPrices,
    StockDividends,
    StockReports,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::StockPrices => "get_stock_prices",
            Operation::StockDividends => "get_stock_dividends",
            Operation::StockReports => "get_stock_reports",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Erreur unique vue par les appelants de FinanceClient
#[derive(Debug, Error)]
#[error("{operation} a échoué pour '{ticker}' ({})", .source.kind())]
pub struct ClientError {
    pub operation: Operation,
    pub ticker: String,
    #[source]
    pub source: DataError,
}

impl ClientError {
    pub fn new(operation: Operation, ticker: impl Into<String>, source: DataError) -> Self {
        Self {
            operation,
            ticker: ticker.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type DataResult<T> = std::result::Result<T, DataError>;
pub type ClientResult<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests unitaires
// ============================================================================
