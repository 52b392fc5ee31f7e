use crate::domain::stock::StockRow;
use crate::storage::result_cache::encode_rows;
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Spreadsheet tools need the byte-order mark to pick UTF-8 for non-ASCII
/// company names.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn export_file_name(month: &str) -> String {
    format!("value_screen_{month}.csv")
}

pub fn write_csv<W: Write>(rows: &[StockRow], mut out: W) -> anyhow::Result<()> {
    let body = encode_rows(rows)?;
    out.write_all(UTF8_BOM).context("failed to write BOM")?;
    out.write_all(&body).context("failed to write CSV body")?;
    out.flush().context("failed to flush CSV export")?;
    Ok(())
}

pub fn to_csv_bytes(rows: &[StockRow]) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(buf)
}

/// Writes `<dir>/value_screen_<month>.csv` and returns its path.
pub fn export_to_dir(dir: &Path, month: &str, rows: &[StockRow]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_file_name(month));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(rows, std::io::BufWriter::new(file))?;
    Ok(path)
}
