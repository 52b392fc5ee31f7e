use serde::{Deserialize, Serialize};
use std::fmt;

const DETAIL_URL_BASE: &str = "https://finance.yahoo.com/quote/";

/// Equity symbol in the market-data provider's convention (`BRK.B` is
/// stored as `BRK-B`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Trims and normalizes a raw symbol. Returns `None` for blank input.
    pub fn normalize(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        Some(Self(t.replace('.', "-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn detail_url(&self) -> String {
        format!("{DETAIL_URL_BASE}{}", self.0)
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One snapshot per symbol. Field order is the persisted CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub symbol: TickerSymbol,
    pub name: String,
    /// Market capitalization in billions.
    pub market_cap_b: f64,
    /// Trailing price/earnings.
    pub pe: f64,
    pub dividend_yield_pct: f64,
    /// Full `YYYY-MM-DD`; only the month prefix matters for cache validity.
    pub scan_date: String,
    #[serde(default)]
    pub detail_url: Option<String>,
}

impl StockRow {
    pub fn is_from_month(&self, month: &str) -> bool {
        !month.is_empty() && self.scan_date.starts_with(month)
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Rows sorted descending by market cap and truncated to the configured top-N.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub rows: Vec<StockRow>,
}

impl ScanResult {
    pub fn from_rows(mut rows: Vec<StockRow>, top_n: usize) -> Self {
        rows.sort_by(|a, b| {
            b.market_cap_b
                .partial_cmp(&a.market_cap_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        rows.truncate(top_n);
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row must carry the given month. An empty result is never valid.
    pub fn is_valid_for_month(&self, month: &str) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.is_from_month(month))
    }

    pub fn find(&self, symbol: &TickerSymbol) -> Option<&StockRow> {
        self.rows.iter().find(|r| &r.symbol == symbol)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn row(symbol: &str, market_cap_b: f64, pe: f64, div: f64, scan_date: &str) -> StockRow {
        let symbol = TickerSymbol::normalize(symbol).unwrap();
        StockRow {
            name: format!("{symbol} Inc."),
            detail_url: Some(symbol.detail_url()),
            symbol,
            market_cap_b,
            pe,
            dividend_yield_pct: div,
            scan_date: scan_date.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::row;
    use super::*;

    #[test]
    fn normalizes_class_share_dots() {
        let s = TickerSymbol::normalize(" BRK.B ").unwrap();
        assert_eq!(s.as_str(), "BRK-B");
        assert_eq!(s.detail_url(), "https://finance.yahoo.com/quote/BRK-B");
        assert!(TickerSymbol::normalize("   ").is_none());
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2_999.996), 3_000.0);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn sorts_by_market_cap_desc_and_truncates() {
        let rows = vec![
            row("KO", 260.0, 24.0, 3.0, "2024-06-01"),
            row("AAPL", 3000.0, 30.0, 0.5, "2024-06-01"),
            row("MSFT", 3100.0, 35.0, 0.7, "2024-06-01"),
            row("XOM", 460.0, 13.0, 3.3, "2024-06-01"),
        ];
        let result = ScanResult::from_rows(rows, 3);
        let symbols: Vec<_> = result.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "XOM"]);
    }

    #[test]
    fn equal_market_caps_order_by_symbol() {
        let rows = vec![
            row("B", 10.0, 10.0, 0.0, "2024-06-01"),
            row("A", 10.0, 10.0, 0.0, "2024-06-01"),
        ];
        let result = ScanResult::from_rows(rows, 10);
        assert_eq!(result.rows[0].symbol.as_str(), "A");
    }

    #[test]
    fn validity_requires_every_row_in_month() {
        let mut result = ScanResult::from_rows(
            vec![
                row("AAPL", 3000.0, 30.0, 0.5, "2024-06-03"),
                row("MSFT", 3100.0, 35.0, 0.7, "2024-06-03"),
            ],
            200,
        );
        assert!(result.is_valid_for_month("2024-06"));
        assert!(!result.is_valid_for_month("2024-05"));

        result.rows[1].scan_date = "2024-05-30".to_string();
        assert!(!result.is_valid_for_month("2024-06"));

        assert!(!ScanResult::default().is_valid_for_month("2024-06"));
    }
}
