use crate::domain::stock::{StockRow, TickerSymbol};
use serde::Serialize;
use thiserror::Error;

/// Provider fields the scan and the detail view rely on. Absent fields stay
/// `None`; no validation happens at this layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolInfo {
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    /// Fraction, e.g. `0.0044` for 0.44%.
    pub dividend_yield: Option<f64>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub long_business_summary: Option<String>,
}

impl SymbolInfo {
    pub fn into_profile(self, symbol: TickerSymbol) -> CompanyProfile {
        CompanyProfile {
            symbol,
            long_name: self.long_name.or(self.short_name),
            sector: self.sector,
            industry: self.industry,
            business_summary: self.long_business_summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyProfile {
    pub symbol: TickerSymbol,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub business_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("market cap missing or zero")]
    MissingMarketCap,
    #[error("trailing P/E missing or zero")]
    MissingTrailingPe,
    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub symbol: TickerSymbol,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Row(StockRow),
    Skipped(Skipped),
}

/// Everything one pass over the candidate list produced. `rows` is unsorted
/// and untruncated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub scanned: usize,
    pub rows: Vec<StockRow>,
    pub skipped: Vec<Skipped>,
}

impl FetchReport {
    pub fn provider_failures(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Provider(_)))
            .count()
    }

    /// True when every scanned symbol failed at the provider, which looks
    /// like an outage rather than a thin market.
    pub fn provider_unreachable(&self) -> bool {
        self.scanned > 0 && self.provider_failures() == self.scanned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchProgress {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub symbol: TickerSymbol,
    pub included: bool,
}
