// ============================================================================
// Module : export
// ============================================================================
// Écriture des FetchResult sur disque
//
// - Prix et dividendes : CSV (une ligne par enregistrement, ticker en tête)
// - États financiers : JSON indenté
//
// Fichiers nommés par ticker dans le répertoire de données :
//   AAPL_stock_prices.csv, AAPL_dividends.csv, AAPL_financials_report.json
// Un `items` vide produit un CSV ne contenant que l'en-tête.
// ============================================================================

use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::models::{DividendRecord, FetchResult, PriceRecord, ReportKind, ReportRecord, Ticker};

const PRICE_HEADER: [&str; 7] = ["ticker", "date", "open", "high", "low", "close", "volume"];
const DIVIDEND_HEADER: [&str; 3] = ["ticker", "date", "dividend"];

/// Chemins des fichiers d'un ticker dans un répertoire de données
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stock_prices_csv(&self, ticker: &Ticker) -> PathBuf {
        self.root.join(format!("{}_stock_prices.csv", ticker))
    }

    pub fn dividends_csv(&self, ticker: &Ticker) -> PathBuf {
        self.root.join(format!("{}_dividends.csv", ticker))
    }

    pub fn report_json(&self, ticker: &Ticker, kind: ReportKind) -> PathBuf {
        self.root.join(format!("{}_{}_report.json", ticker, kind))
    }

    /// Crée le répertoire s'il n'existe pas
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Échec de la création du répertoire {}", self.root.display())
        })
    }
}

pub fn write_prices_csv<W: Write>(writer: W, prices: &FetchResult<PriceRecord>) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(PRICE_HEADER)
        .context("Échec de l'écriture de l'en-tête CSV")?;

    for p in &prices.items {
        let row = [
            prices.ticker.to_string(),
            p.date.format("%Y-%m-%d").to_string(),
            p.open.to_string(),
            p.high.to_string(),
            p.low.to_string(),
            p.close.to_string(),
            p.volume.to_string(),
        ];
        wtr.write_record(&row)
            .with_context(|| format!("Échec de l'écriture de la ligne du {}", p.date))?;
    }

    wtr.flush().context("Échec du flush CSV")?;
    Ok(())
}

pub fn write_dividends_csv<W: Write>(
    writer: W,
    dividends: &FetchResult<DividendRecord>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DIVIDEND_HEADER)
        .context("Échec de l'écriture de l'en-tête CSV")?;

    for d in &dividends.items {
        let row = [
            dividends.ticker.to_string(),
            d.date.format("%Y-%m-%d").to_string(),
            d.amount.to_string(),
        ];
        wtr.write_record(&row)
            .with_context(|| format!("Échec de l'écriture du dividende du {}", d.date))?;
    }

    wtr.flush().context("Échec du flush CSV")?;
    Ok(())
}

/// Ligne du CSV de prix telle qu'écrite par `write_prices_csv`
#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

pub fn read_prices_csv<R: Read>(reader: R) -> Result<Vec<PriceRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<PriceRow>()
        .map(|row| -> Result<PriceRecord> {
            let row = row.context("Ligne CSV de prix illisible")?;
            Ok(PriceRecord::new(row.date, row.open, row.high, row.low, row.close, row.volume))
        })
        .collect()
}

/// Prix déjà enregistrés pour un ticker (vide si le fichier n'existe pas)
pub fn load_prices(paths: &DataPaths, ticker: &Ticker) -> Result<Vec<PriceRecord>> {
    let path = paths.stock_prices_csv(ticker);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&path)
        .with_context(|| format!("Échec de l'ouverture de {}", path.display()))?;
    let prices = read_prices_csv(file)?;

    info!(path = %path.display(), rows = prices.len(), "Loaded stored stock prices");
    Ok(prices)
}

pub fn write_report_json<W: Write>(writer: W, report: &ReportRecord) -> Result<()> {
    serde_json::to_writer_pretty(writer, report).context("Échec de la sérialisation JSON du rapport")
}

/// Écrit dans un fichier temporaire du même répertoire puis le renomme
///
/// Le fichier cible n'est remplacé qu'une fois l'écriture terminée : en cas
/// d'erreur (ou de tâche annulée) l'ancien contenu reste intact et le
/// fichier temporaire est supprimé.
fn write_atomically<F>(paths: &DataPaths, path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    paths.ensure_root()?;
    let mut tmp = NamedTempFile::new_in(paths.root()).with_context(|| {
        format!("Échec de la création d'un fichier temporaire dans {}", paths.root().display())
    })?;

    write(&mut tmp)?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Échec de la synchronisation de {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Échec du remplacement de {}", path.display()))?;
    Ok(())
}

/// Écrit le CSV des prix dans le répertoire de données
pub fn save_prices(paths: &DataPaths, prices: &FetchResult<PriceRecord>) -> Result<PathBuf> {
    let path = paths.stock_prices_csv(&prices.ticker);
    write_atomically(paths, &path, |file| write_prices_csv(file, prices))?;

    info!(path = %path.display(), rows = prices.len(), "Saved stock prices");
    Ok(path)
}

pub fn save_dividends(paths: &DataPaths, dividends: &FetchResult<DividendRecord>) -> Result<PathBuf> {
    let path = paths.dividends_csv(&dividends.ticker);
    write_atomically(paths, &path, |file| write_dividends_csv(file, dividends))?;

    info!(path = %path.display(), rows = dividends.len(), "Saved dividends");
    Ok(path)
}

/// Un fichier JSON par rapport contenu dans le résultat
pub fn save_reports(paths: &DataPaths, reports: &FetchResult<ReportRecord>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(reports.len());

    for report in &reports.items {
        let path = paths.report_json(&report.ticker, report.report_kind);
        write_atomically(paths, &path, |file| {
            let mut writer = BufWriter::new(file);
            write_report_json(&mut writer, report)?;
            writer.flush().context("Échec du flush JSON")
        })?;

        info!(path = %path.display(), line_items = report.content.len(), "Saved financial report");
        written.push(path);
    }
    Ok(written)
}

// ============================================================================
// Tests unitaires
// ============================================================================
