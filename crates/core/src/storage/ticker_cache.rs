use crate::domain::stock::TickerSymbol;
use crate::storage::write_replace;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerCacheRecord {
    pub fetched_at: DateTime<Utc>,
    pub symbols: Vec<TickerSymbol>,
}

impl TickerCacheRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        !self.symbols.is_empty() && now.signed_duration_since(self.fetched_at) < expiry
    }
}

/// JSON file holding the last constituent list and when it was fetched.
#[derive(Debug, Clone)]
pub struct TickerCache {
    path: PathBuf,
    expiry: Duration,
}

impl TickerCache {
    pub fn new(path: PathBuf, expiry: Duration) -> Self {
        Self { path, expiry }
    }

    pub fn load(&self) -> anyhow::Result<Option<TickerCacheRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let record = serde_json::from_str::<TickerCacheRecord>(&text)
            .with_context(|| format!("malformed ticker cache {}", self.path.display()))?;
        Ok(Some(record))
    }

    /// Cached symbols if the record exists, parses, and is younger than the
    /// expiry window. Unreadable records count as absent.
    pub fn load_fresh(&self, now: DateTime<Utc>) -> Option<Vec<TickerSymbol>> {
        match self.load() {
            Ok(Some(record)) if record.is_fresh(now, self.expiry) => Some(record.symbols),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable ticker cache");
                None
            }
        }
    }

    pub fn save(&self, record: &TickerCacheRecord) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(record).context("serialize ticker cache failed")?;
        write_replace(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(at: DateTime<Utc>) -> TickerCacheRecord {
        TickerCacheRecord {
            fetched_at: at,
            symbols: vec![TickerSymbol::normalize("BRK.B").unwrap()],
        }
    }

    #[test]
    fn freshness_is_bounded_by_expiry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let r = record(at);
        let expiry = Duration::days(180);
        assert!(r.is_fresh(at + Duration::days(179), expiry));
        assert!(!r.is_fresh(at + Duration::days(180), expiry));

        let empty = TickerCacheRecord {
            symbols: vec![],
            ..r
        };
        assert!(!empty.is_fresh(at, expiry));
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TickerCache::new(dir.path().join("nested/tickers.json"), Duration::days(180));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(cache.load().unwrap(), None);
        cache.save(&record(at)).unwrap();
        assert_eq!(cache.load().unwrap(), Some(record(at)));
        assert_eq!(
            cache.load_fresh(at + Duration::days(1)).unwrap()[0].as_str(),
            "BRK-B"
        );
    }

    #[test]
    fn malformed_file_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = TickerCache::new(path, Duration::days(180));
        assert!(cache.load().is_err());
        assert_eq!(cache.load_fresh(Utc::now()), None);
    }
}
