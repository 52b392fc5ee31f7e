use crate::domain::stock::{round2, StockRow, TickerSymbol};
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{
    CompanyProfile, FetchOutcome, FetchProgress, FetchReport, SkipReason, Skipped, SymbolInfo,
};
use crate::time::month::scan_date_string;
use chrono::NaiveDate;
use std::sync::Arc;

const LOGGED_SKIP_LIMIT: usize = 10;
const PROGRESS_LOG_EVERY: usize = 50;

pub type ProgressFn<'a> = &'a mut (dyn FnMut(&FetchProgress) + Send);

/// Sequential per-symbol metric collection. One provider call per symbol, no
/// retry, no concurrency.
#[derive(Clone)]
pub struct MetricFetcher {
    provider: Arc<dyn MarketDataProvider>,
}

impl MetricFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub async fn fetch_one(&self, symbol: &TickerSymbol, scan_date: NaiveDate) -> FetchOutcome {
        let built = match self.provider.fetch_symbol_info(symbol).await {
            Ok(info) => build_row(symbol, info, scan_date),
            Err(err) => Err(SkipReason::Provider(format!("{err:#}"))),
        };
        match built {
            Ok(row) => FetchOutcome::Row(row),
            Err(reason) => FetchOutcome::Skipped(Skipped {
                symbol: symbol.clone(),
                reason,
            }),
        }
    }

    /// Walks the first `limit` symbols in input order. `progress` is invoked
    /// after every symbol, whether it produced a row or was skipped.
    pub async fn fetch(
        &self,
        symbols: &[TickerSymbol],
        limit: usize,
        scan_date: NaiveDate,
        mut progress: Option<ProgressFn<'_>>,
    ) -> FetchReport {
        let total = symbols.len().min(limit);
        let mut report = FetchReport::default();

        for (idx, symbol) in symbols.iter().take(total).enumerate() {
            let outcome = self.fetch_one(symbol, scan_date).await;
            report.scanned += 1;

            let included = match outcome {
                FetchOutcome::Row(row) => {
                    report.rows.push(row);
                    true
                }
                FetchOutcome::Skipped(skipped) => {
                    if report.skipped.len() < LOGGED_SKIP_LIMIT {
                        tracing::warn!(
                            idx,
                            symbol = %skipped.symbol,
                            reason = %skipped.reason,
                            "skipping symbol"
                        );
                    }
                    report.skipped.push(skipped);
                    false
                }
            };

            let n = idx + 1;
            if let Some(cb) = progress.as_deref_mut() {
                cb(&FetchProgress {
                    index: n,
                    total,
                    symbol: symbol.clone(),
                    included,
                });
            }
            if n == 1 || n == total || n % PROGRESS_LOG_EVERY == 0 {
                tracing::info!(
                    processed = n,
                    total,
                    rows = report.rows.len(),
                    skipped = report.skipped.len(),
                    "metric fetch progress"
                );
            }
        }

        report
    }

    pub async fn fetch_rows(
        &self,
        symbols: &[TickerSymbol],
        limit: usize,
        scan_date: NaiveDate,
    ) -> Vec<StockRow> {
        self.fetch(symbols, limit, scan_date, None).await.rows
    }

    pub async fn fetch_profile(&self, symbol: &TickerSymbol) -> anyhow::Result<CompanyProfile> {
        let info = self.provider.fetch_symbol_info(symbol).await?;
        Ok(info.into_profile(symbol.clone()))
    }
}

/// Shapes provider data into a row. Market cap and trailing P/E must both be
/// present and non-zero; dividend yield defaults to 0.
pub fn build_row(
    symbol: &TickerSymbol,
    info: SymbolInfo,
    scan_date: NaiveDate,
) -> Result<StockRow, SkipReason> {
    // Checked after rounding so a stored row never shows a zero cap.
    let market_cap_b = info
        .market_cap
        .map(|v| round2(v / 1e9))
        .filter(|v| *v > 0.0)
        .ok_or(SkipReason::MissingMarketCap)?;
    let pe = info
        .trailing_pe
        .filter(|v| *v != 0.0)
        .ok_or(SkipReason::MissingTrailingPe)?;
    let dividend_yield_pct = info
        .dividend_yield
        .filter(|v| *v != 0.0)
        .map(|v| round2(v * 100.0))
        .unwrap_or(0.0);

    let name = info
        .short_name
        .or(info.long_name)
        .unwrap_or_else(|| symbol.to_string());

    Ok(StockRow {
        symbol: symbol.clone(),
        name,
        market_cap_b,
        pe: round2(pe),
        dividend_yield_pct,
        scan_date: scan_date_string(scan_date),
        detail_url: Some(symbol.detail_url()),
    })
}
