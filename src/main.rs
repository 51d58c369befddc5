// ============================================================================
// StockFetch - CLI
// ============================================================================
// Récupère les données d'un ticker via FinanceClient puis les exporte
// (CSV pour prix et dividendes, JSON pour les états financiers) ou les
// affiche en JSON sur la sortie standard.
//
// Exemples :
//   stockfetch prices AAPL --start 2021-01-01 --end 2021-01-31 --check
//   stockfetch prices AAPL --start 2020-01-01 --end 2021-12-31 --fill
//   stockfetch dividends MSFT --start 2020-01-01 --end 2023-12-31
//   stockfetch report AAPL --kind balance_sheet --stdout
// ============================================================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use stockfetch::backfill::fill_missing;
use stockfetch::completeness::analyze_completeness;
use stockfetch::config::Config;
use stockfetch::export::{self, DataPaths};
use stockfetch::{FetchResult, FinanceClient, Ticker};

#[derive(Debug, Parser)]
#[command(name = "stockfetch", version, about = "Historique de prix, dividendes et états financiers Yahoo Finance")]
struct Cli {
    /// Répertoire de sortie (défaut : STOCKFETCH_DATA_DIR ou ~/.local/share/stockfetch/data)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Affiche le résultat en JSON au lieu d'écrire des fichiers
    #[arg(long, global = true)]
    stdout: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Historique journalier OHLCV
    Prices {
        ticker: String,
        /// Date de début (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Date de fin incluse (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Signale les jours ouvrés sans cotation
        #[arg(long)]
        check: bool,
        /// Complète le CSV existant en ne demandant que les jours manquants
        #[arg(long, conflicts_with = "check")]
        fill: bool,
    },

    /// Dividendes détachés sur la période
    Dividends {
        ticker: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// État financier annuel
    Report {
        ticker: String,
        /// financials, balance_sheet ou cash_flow
        #[arg(long, default_value = "financials")]
        kind: String,
    },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les logs vont dans un fichier (rotation quotidienne) pour ne pas polluer
// la sortie standard, qui peut contenir du JSON.
//
// # Utilisation
// ```bash
// tail -f ./logs/stockfetch.log
// RUST_LOG=stockfetch=trace stockfetch prices AAPL ...
// ```
// ============================================================================

fn init_logging(config: &Config) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = config.log_dir.clone();
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "stockfetch.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockfetch=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.out_dir.clone() {
        config.data_dir = dir;
    }

    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(command = ?cli.command, "StockFetch starting up");

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli, config));

    if let Err(e) = &result {
        error!(error = ?e, "Command failed");
    }
    result
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let client = FinanceClient::yahoo(config.provider.clone())
        .context("Échec de l'initialisation du client Yahoo Finance")?;
    let paths = DataPaths::new(&config.data_dir);

    match cli.command {
        Command::Prices {
            ticker,
            start,
            end,
            fill: true,
            ..
        } => {
            let symbol = Ticker::parse(&ticker)?;
            let existing = export::load_prices(&paths, &symbol)?;
            let backfill = fill_missing(&client, &ticker, start, end, existing).await?;
            let summary = backfill.summary;
            let merged = FetchResult::new(symbol, backfill.data);

            if cli.stdout {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            } else {
                let path = export::save_prices(&paths, &merged)?;
                println!(
                    "✓ {} cotations ({} nouvelles, {} plages demandées) dans {}",
                    summary.total_records,
                    summary.new_records,
                    summary.missing_ranges_fetched,
                    path.display()
                );
            }
        }

        Command::Prices {
            ticker,
            start,
            end,
            check,
            ..
        } => {
            let prices = client.get_stock_prices(&ticker, start, end).await?;

            if check {
                let report = analyze_completeness(prices.ticker.as_str(), start, end, &prices.items)?;
                if !report.is_complete {
                    eprintln!(
                        "⚠ {}/{} jours ouvrés présents, plages manquantes :",
                        report.total_existing_days, report.total_expected_days
                    );
                    for range in &report.missing_ranges {
                        eprintln!("    {} → {}", range.start, range.end);
                    }
                }
            }

            if cli.stdout {
                println!("{}", serde_json::to_string_pretty(&prices)?);
            } else {
                let path = export::save_prices(&paths, &prices)?;
                println!("✓ {} cotations écrites dans {}", prices.len(), path.display());
            }
        }

        Command::Dividends { ticker, start, end } => {
            let dividends = client.get_stock_dividends(&ticker, start, end).await?;

            if cli.stdout {
                println!("{}", serde_json::to_string_pretty(&dividends)?);
            } else {
                let path = export::save_dividends(&paths, &dividends)?;
                println!("✓ {} dividendes écrits dans {}", dividends.len(), path.display());
            }
        }

        Command::Report { ticker, kind } => {
            let reports = client.get_stock_reports(&ticker, &kind).await?;

            if cli.stdout {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for path in export::save_reports(&paths, &reports)? {
                    println!("✓ Rapport écrit dans {}", path.display());
                }
            }
        }
    }

    Ok(())
}
