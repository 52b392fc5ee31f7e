use crate::domain::stock::{ScanResult, StockRow};
use crate::storage::write_replace;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Column order shared by the cache file and CSV exports.
pub const CSV_HEADER: [&str; 7] = [
    "symbol",
    "name",
    "market_cap_b",
    "pe",
    "dividend_yield_pct",
    "scan_date",
    "detail_url",
];

/// Flat-file store holding the most recent full scan.
///
/// The record is either valid for the current month or stale/absent; there is
/// no partial state. Missing, empty, or malformed files all read as absent so
/// the caller falls back to a fresh scan.
#[derive(Debug, Clone)]
pub struct MonthlyCacheStore {
    path: PathBuf,
}

impl MonthlyCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the record as stored. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> anyhow::Result<Option<ScanResult>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let rows = decode_rows(&bytes)
            .with_context(|| format!("malformed result cache {}", self.path.display()))?;
        Ok(Some(ScanResult { rows }))
    }

    pub fn load_if_valid(&self, current_month: &str) -> Option<ScanResult> {
        let result = match self.load() {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable result cache");
                return None;
            }
        };

        if !result.is_valid_for_month(current_month) {
            tracing::info!(
                current_month,
                rows = result.len(),
                stored_month = result.rows.first().and_then(|r| r.scan_date.get(..7)),
                "result cache is stale"
            );
            return None;
        }
        Some(result)
    }

    /// Overwrites the record unconditionally.
    pub fn save(&self, result: &ScanResult) -> anyhow::Result<()> {
        let bytes = encode_rows(&result.rows)?;
        write_replace(&self.path, &bytes)?;
        tracing::info!(path = %self.path.display(), rows = result.len(), "saved result cache");
        Ok(())
    }
}

pub fn encode_rows(rows: &[StockRow]) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)
        .context("failed to write CSV header")?;
    for row in rows {
        wtr.serialize(row).context("failed to write CSV record")?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV writer: {}", e.error()))
}

pub fn decode_rows(bytes: &[u8]) -> anyhow::Result<Vec<StockRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let mut out = Vec::new();
    for (idx, rec) in rdr.deserialize::<StockRow>().enumerate() {
        out.push(rec.with_context(|| format!("bad CSV row {}", idx + 1))?);
    }
    Ok(out)
}
