// ============================================================================
// Module : config
// ============================================================================
// Paramètres du client Yahoo et des répertoires de sortie
//
// Valeurs par défaut raisonnables, surchargées par variables d'environnement :
// - STOCKFETCH_DATA_DIR : répertoire des exports (CSV/JSON)
// - STOCKFETCH_LOG_DIR : répertoire des logs
// - STOCKFETCH_TIMEOUT_SECS : timeout HTTP en secondes
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// User-Agent de navigateur pour éviter le blocage par Yahoo
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TIMESERIES_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Paramètres du transport HTTP vers Yahoo Finance
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Hôte de l'API chart (prix, dividendes)
    pub chart_base_url: String,
    /// Hôte de l'API fundamentals-timeseries (états financiers)
    pub timeseries_base_url: String,
    pub user_agent: String,
    /// Timeout appliqué par reqwest à chaque requête
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            timeseries_base_url: DEFAULT_TIMESERIES_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ProviderConfig {
    /// Fait pointer les deux API vers le même hôte (serveur de test, proxy)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            chart_base_url: base_url.clone(),
            timeseries_base_url: base_url,
            ..Self::default()
        }
    }
}

/// Configuration complète de l'application
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            data_dir: default_data_dir(),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl Config {
    /// Charge la configuration par défaut puis applique l'environnement
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Variante testable : `lookup` remplace std::env::var
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("STOCKFETCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STOCKFETCH_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("STOCKFETCH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("STOCKFETCH_TIMEOUT_SECS invalide : '{}'", secs))?;
            config.provider.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// ~/.local/share/stockfetch/data sur Linux, ./data si introuvable
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("stockfetch").join("data"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

// ============================================================================
// Tests unitaires
// ============================================================================
