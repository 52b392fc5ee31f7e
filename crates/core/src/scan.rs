//! Monthly cache freshness check and refresh workflow.
//!
//! A session first consults the result cache. A record valid for the current
//! month is final and no network call happens. Otherwise, and only when the
//! caller triggers it, a full scan runs: resolve candidates, fetch metrics,
//! keep the top-N by market cap, and overwrite the cache.

use crate::config::Settings;
use crate::domain::stock::{ScanResult, TickerSymbol};
use crate::ingest::constituents::TickerSource;
use crate::ingest::fetcher::{MetricFetcher, ProgressFn};
use crate::ingest::provider::YahooQuoteProvider;
use crate::ingest::types::{CompanyProfile, Skipped};
use crate::storage::result_cache::MonthlyCacheStore;
use crate::time::month::ScanClock;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub limit: usize,
    pub top_n: usize,
    /// When false the scan runs but the cache file is left untouched.
    pub persist: bool,
}

impl ScanOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            limit: settings.scan_limit,
            top_n: settings.top_n,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStats {
    pub candidates: usize,
    pub scanned: usize,
    pub included: usize,
    pub skipped: Vec<Skipped>,
    pub provider_unreachable: bool,
    pub saved: bool,
    /// Set when the rows were scanned but the cache write failed.
    pub save_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Valid record for the current month; nothing was fetched.
    Cached { result: ScanResult },
    /// Fresh scan, truncated to top-N.
    Scanned { result: ScanResult, stats: ScanStats },
    /// Cache is stale or absent and no scan was requested.
    NotScanned,
    /// Candidate list could not be resolved; the cache was not touched.
    SourceUnavailable { reason: String },
}

impl ScanOutcome {
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            Self::Cached { result } | Self::Scanned { result, .. } => Some(result),
            Self::NotScanned | Self::SourceUnavailable { .. } => None,
        }
    }
}

pub struct ScanWorkflow {
    tickers: TickerSource,
    fetcher: MetricFetcher,
    store: MonthlyCacheStore,
    opts: ScanOptions,
}

impl ScanWorkflow {
    pub fn new(
        tickers: TickerSource,
        fetcher: MetricFetcher,
        store: MonthlyCacheStore,
        opts: ScanOptions,
    ) -> Self {
        Self {
            tickers,
            fetcher,
            store,
            opts,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let tickers = TickerSource::from_settings(settings)?;
        let provider = YahooQuoteProvider::from_settings(settings)?;
        let fetcher = MetricFetcher::new(Arc::new(provider));
        let store = MonthlyCacheStore::new(settings.result_cache_path.clone());
        Ok(Self::new(
            tickers,
            fetcher,
            store,
            ScanOptions::from_settings(settings),
        ))
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.opts.persist = persist;
        self
    }

    pub fn store(&self) -> &MonthlyCacheStore {
        &self.store
    }

    pub fn load_cached(&self, clock: &ScanClock) -> Option<ScanResult> {
        self.store.load_if_valid(&clock.current_month())
    }

    pub async fn run_scan(
        &self,
        clock: &ScanClock,
        progress: Option<ProgressFn<'_>>,
    ) -> anyhow::Result<ScanOutcome> {
        let candidates = match self.tickers.resolve(clock.now).await {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "no candidates; scan not started");
                return Ok(ScanOutcome::SourceUnavailable {
                    reason: err.to_string(),
                });
            }
        };

        tracing::info!(
            candidates = candidates.len(),
            limit = self.opts.limit,
            top_n = self.opts.top_n,
            provider = self.fetcher.provider_name(),
            "starting monthly scan"
        );

        let report = self
            .fetcher
            .fetch(&candidates, self.opts.limit, clock.today, progress)
            .await;
        let provider_unreachable = report.provider_unreachable();
        let scanned = report.scanned;
        let included = report.rows.len();
        let result = ScanResult::from_rows(report.rows, self.opts.top_n);

        let mut save_error = None;
        let saved = if result.is_empty() {
            tracing::warn!(
                scanned,
                provider_unreachable,
                "scan produced no rows; result cache left untouched"
            );
            false
        } else if self.opts.persist {
            match self.store.save(&result) {
                Ok(()) => true,
                Err(err) => {
                    let msg = format!("{err:#}");
                    tracing::error!(
                        path = %self.store.path().display(),
                        error = %msg,
                        "failed to save result cache; returning unsaved scan"
                    );
                    save_error = Some(msg);
                    false
                }
            }
        } else {
            false
        };

        tracing::info!(
            scanned,
            included,
            kept = result.len(),
            skipped = report.skipped.len(),
            saved,
            "monthly scan finished"
        );

        Ok(ScanOutcome::Scanned {
            result,
            stats: ScanStats {
                candidates: candidates.len(),
                scanned,
                included,
                skipped: report.skipped,
                provider_unreachable,
                saved,
                save_error,
            },
        })
    }

    /// One session: cache first, then a scan only if `trigger` is set.
    pub async fn session(
        &self,
        clock: &ScanClock,
        trigger: bool,
        progress: Option<ProgressFn<'_>>,
    ) -> anyhow::Result<ScanOutcome> {
        if let Some(result) = self.load_cached(clock) {
            tracing::info!(month = %clock.current_month(), rows = result.len(), "loaded cached scan");
            return Ok(ScanOutcome::Cached { result });
        }
        if !trigger {
            return Ok(ScanOutcome::NotScanned);
        }
        self.run_scan(clock, progress).await
    }

    pub async fn company_profile(&self, symbol: &TickerSymbol) -> anyhow::Result<CompanyProfile> {
        self.fetcher.fetch_profile(symbol).await
    }
}
