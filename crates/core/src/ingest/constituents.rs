//! Candidate symbols from the S&P 500 constituent page.
//!
//! The page is scraped for its first HTML table and the column headed
//! `Symbol`. The list changes rarely, so [`TickerSource`] keeps it in an
//! explicit on-disk cache with a stored timestamp and expiry window.

use crate::config::Settings;
use crate::domain::stock::TickerSymbol;
use crate::ingest::provider::BROWSER_USER_AGENT;
use crate::storage::ticker_cache::{TickerCache, TickerCacheRecord};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;

const SYMBOL_HEADER: &str = "Symbol";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("constituents request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("constituents HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("no table found in constituents page")]
    NoTable,

    #[error("first table has no \"Symbol\" column")]
    NoSymbolColumn,

    #[error("symbol column is empty")]
    Empty,
}

#[async_trait::async_trait]
pub trait ConstituentSource: Send + Sync {
    async fn fetch_symbols(&self) -> Result<Vec<TickerSymbol>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct WikipediaConstituents {
    http: reqwest::Client,
    url: String,
}

impl WikipediaConstituents {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.constituents_timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build constituents http client: {e}"))?;

        Ok(Self {
            http,
            url: settings.constituents_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ConstituentSource for WikipediaConstituents {
    async fn fetch_symbols(&self) -> Result<Vec<TickerSymbol>, SourceError> {
        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }
        let html = res.text().await?;
        parse_symbol_table(&html)
    }
}

/// Extracts the `Symbol` column of the first table in `html`, normalized to
/// the provider's symbol convention. Duplicate symbols keep their first
/// position.
pub fn parse_symbol_table(html: &str) -> Result<Vec<TickerSymbol>, SourceError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");
    let td_sel = selector("td");

    let table = document.select(&table_sel).next().ok_or(SourceError::NoTable)?;

    let mut symbol_idx: Option<usize> = None;
    let mut out: Vec<TickerSymbol> = Vec::new();

    for tr in table.select(&row_sel) {
        let is_data_row = tr.select(&td_sel).next().is_some();
        let cells: Vec<ElementRef<'_>> = tr.select(&cell_sel).collect();

        let Some(idx) = symbol_idx else {
            if !is_data_row {
                symbol_idx = cells.iter().position(|c| cell_text(c) == SYMBOL_HEADER);
                if symbol_idx.is_none() {
                    return Err(SourceError::NoSymbolColumn);
                }
            }
            continue;
        };

        if !is_data_row {
            continue;
        }
        let Some(cell) = cells.get(idx) else {
            continue;
        };
        if let Some(symbol) = TickerSymbol::normalize(&cell_text(cell)) {
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }
    }

    if symbol_idx.is_none() {
        return Err(SourceError::NoSymbolColumn);
    }
    if out.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(out)
}

fn selector(s: &str) -> Selector {
    // Static selectors; parsing cannot fail.
    Selector::parse(s).expect("static CSS selector")
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Candidate resolution with the explicit expiry cache in front of the
/// network source.
pub struct TickerSource {
    source: Box<dyn ConstituentSource>,
    cache: TickerCache,
}

impl TickerSource {
    pub fn new(source: Box<dyn ConstituentSource>, cache: TickerCache) -> Self {
        Self { source, cache }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let source = WikipediaConstituents::from_settings(settings)?;
        let cache = TickerCache::new(
            settings.ticker_cache_path.clone(),
            chrono::Duration::days(settings.ticker_expiry_days),
        );
        Ok(Self::new(Box::new(source), cache))
    }

    pub async fn resolve(&self, now: DateTime<Utc>) -> Result<Vec<TickerSymbol>, SourceError> {
        if let Some(symbols) = self.cache.load_fresh(now) {
            tracing::debug!(symbols = symbols.len(), "using cached constituent list");
            return Ok(symbols);
        }

        let symbols = self.source.fetch_symbols().await?;
        tracing::info!(symbols = symbols.len(), "fetched constituent list");

        let record = TickerCacheRecord {
            fetched_at: now,
            symbols: symbols.clone(),
        };
        if let Err(err) = self.cache.save(&record) {
            tracing::warn!(error = %err, "failed to persist constituent list; continuing");
        }
        Ok(symbols)
    }

    /// Soft variant: any failure yields an empty list, which callers treat
    /// as "no scan possible".
    pub async fn resolve_candidates(&self, now: DateTime<Utc>) -> Vec<TickerSymbol> {
        match self.resolve(now).await {
            Ok(symbols) => symbols,
            Err(err) => {
                tracing::warn!(error = %err, "constituent list unavailable");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PAGE: &str = r#"
        <html><body>
        <table id="constituents">
          <thead>
            <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th></tr>
          </thead>
          <tbody>
            <tr><td><a href="/q/MMM">MMM</a></td><td>3M</td><td>Industrials</td></tr>
            <tr><td>BRK.B</td><td>Berkshire Hathaway</td><td>Financials</td></tr>
            <tr><td> AAPL </td><td>Apple Inc.</td><td>Information Technology</td></tr>
            <tr><td>MMM</td><td>3M duplicate</td><td>Industrials</td></tr>
          </tbody>
        </table>
        <table><tr><th>Date</th></tr><tr><td>ZZZ</td></tr></table>
        </body></html>
    "#;

    #[test]
    fn extracts_and_normalizes_first_table_symbols() {
        let symbols = parse_symbol_table(PAGE).unwrap();
        let s: Vec<_> = symbols.iter().map(|s| s.as_str()).collect();
        assert_eq!(s, vec!["MMM", "BRK-B", "AAPL"]);
    }

    #[test]
    fn symbol_column_need_not_be_first() {
        let html = "<table><tr><th>Security</th><th>Symbol</th></tr>\
                    <tr><td>Brown-Forman</td><td>BF.B</td></tr></table>";
        let symbols = parse_symbol_table(html).unwrap();
        assert_eq!(symbols[0].as_str(), "BF-B");
    }

    #[test]
    fn missing_table_or_column_is_an_error() {
        assert!(matches!(
            parse_symbol_table("<html><p>blocked</p></html>"),
            Err(SourceError::NoTable)
        ));
        assert!(matches!(
            parse_symbol_table("<table><tr><th>Ticker</th></tr><tr><td>A</td></tr></table>"),
            Err(SourceError::NoSymbolColumn)
        ));
        assert!(matches!(
            parse_symbol_table("<table><tr><th>Symbol</th></tr></table>"),
            Err(SourceError::Empty)
        ));
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ConstituentSource for CountingSource {
        async fn fetch_symbols(&self) -> Result<Vec<TickerSymbol>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::NoTable);
            }
            Ok(vec![
                TickerSymbol::normalize("AAPL").unwrap(),
                TickerSymbol::normalize("MSFT").unwrap(),
            ])
        }
    }

    fn source(calls: &Arc<AtomicUsize>, fail: bool, dir: &std::path::Path) -> TickerSource {
        TickerSource::new(
            Box::new(CountingSource {
                calls: calls.clone(),
                fail,
            }),
            TickerCache::new(dir.join("tickers.json"), chrono::Duration::days(180)),
        )
    }

    #[tokio::test]
    async fn second_resolve_within_expiry_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let ts = source(&calls, false, dir.path());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let first = ts.resolve(now).await.unwrap();
        let later = now + chrono::Duration::days(179);
        let second = ts.resolve(later).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let expired = now + chrono::Duration::days(181);
        ts.resolve(expired).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn soft_resolve_returns_empty_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let ts = source(&calls, true, dir.path());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!(ts.resolve(now).await.is_err());
        assert!(ts.resolve_candidates(now).await.is_empty());
        assert!(!dir.path().join("tickers.json").exists());
    }
}
