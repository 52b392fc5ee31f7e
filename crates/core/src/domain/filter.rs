use crate::domain::stock::StockRow;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

pub const MAX_PE_FLOOR: f64 = 5.0;
pub const MAX_PE_CEILING: f64 = 30.0;
pub const DEFAULT_MAX_PE: f64 = 20.0;

/// User-chosen thresholds applied to a cached or freshly scanned table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub max_pe: f64,
    pub min_dividend_yield: Option<f64>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            max_pe: DEFAULT_MAX_PE,
            min_dividend_yield: None,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (MAX_PE_FLOOR..=MAX_PE_CEILING).contains(&self.max_pe),
            "max_pe must be between {MAX_PE_FLOOR} and {MAX_PE_CEILING} (got {})",
            self.max_pe
        );
        if let Some(min) = self.min_dividend_yield {
            ensure!(
                min.is_finite() && min >= 0.0,
                "min_dividend_yield must be a non-negative percentage (got {min})"
            );
        }
        Ok(())
    }

    pub fn matches(&self, row: &StockRow) -> bool {
        if row.pe > self.max_pe {
            return false;
        }
        match self.min_dividend_yield {
            Some(min) => row.dividend_yield_pct >= min,
            None => true,
        }
    }
}

/// Order-preserving filter; no state is kept between calls.
pub fn apply(rows: &[StockRow], params: &FilterParams) -> Vec<StockRow> {
    rows.iter().filter(|r| params.matches(r)).cloned().collect()
}
