pub mod domain;
pub mod export;
pub mod ingest;
pub mod scan;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    pub const DEFAULT_RESULT_CACHE_PATH: &str = "scan_results_month.csv";
    pub const DEFAULT_TICKER_CACHE_PATH: &str = "sp500_tickers.json";
    pub const DEFAULT_TICKER_EXPIRY_DAYS: i64 = 180;
    pub const DEFAULT_CONSTITUENTS_URL: &str =
        "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
    pub const DEFAULT_CONSTITUENTS_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
    pub const DEFAULT_DATA_PROVIDER_TIMEOUT_SECS: u64 = 30;

    /// Symbols fetched per scan. Over-samples the top-N so rows dropped for
    /// missing data do not shrink the final table.
    pub const DEFAULT_SCAN_LIMIT: usize = 250;
    pub const DEFAULT_TOP_N: usize = 200;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub result_cache_path: PathBuf,
        pub ticker_cache_path: PathBuf,
        pub ticker_expiry_days: i64,
        pub constituents_url: String,
        pub constituents_timeout_secs: u64,
        pub yahoo_base_url: String,
        pub yahoo_cookie_url: String,
        pub data_provider_timeout_secs: u64,
        pub scan_limit: usize,
        pub top_n: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                result_cache_path: PathBuf::from(DEFAULT_RESULT_CACHE_PATH),
                ticker_cache_path: PathBuf::from(DEFAULT_TICKER_CACHE_PATH),
                ticker_expiry_days: DEFAULT_TICKER_EXPIRY_DAYS,
                constituents_url: DEFAULT_CONSTITUENTS_URL.to_string(),
                constituents_timeout_secs: DEFAULT_CONSTITUENTS_TIMEOUT_SECS,
                yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
                yahoo_cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
                data_provider_timeout_secs: DEFAULT_DATA_PROVIDER_TIMEOUT_SECS,
                scan_limit: DEFAULT_SCAN_LIMIT,
                top_n: DEFAULT_TOP_N,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            let settings = Self {
                result_cache_path: std::env::var("RESULT_CACHE_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.result_cache_path),
                ticker_cache_path: std::env::var("TICKER_CACHE_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ticker_cache_path),
                ticker_expiry_days: parse_env("TICKER_EXPIRY_DAYS")?
                    .unwrap_or(defaults.ticker_expiry_days),
                constituents_url: std::env::var("CONSTITUENTS_URL")
                    .unwrap_or(defaults.constituents_url),
                constituents_timeout_secs: parse_env("CONSTITUENTS_TIMEOUT_SECS")?
                    .unwrap_or(defaults.constituents_timeout_secs),
                yahoo_base_url: std::env::var("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
                yahoo_cookie_url: std::env::var("YAHOO_COOKIE_URL")
                    .unwrap_or(defaults.yahoo_cookie_url),
                data_provider_timeout_secs: parse_env("DATA_PROVIDER_TIMEOUT_SECS")?
                    .unwrap_or(defaults.data_provider_timeout_secs),
                scan_limit: parse_env("SCAN_LIMIT")?.unwrap_or(defaults.scan_limit),
                top_n: parse_env("TOP_N")?.unwrap_or(defaults.top_n),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            };
            settings.validate()?;
            Ok(settings)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(self.scan_limit >= 1, "SCAN_LIMIT must be >= 1");
            anyhow::ensure!(self.top_n >= 1, "TOP_N must be >= 1");
            anyhow::ensure!(
                self.ticker_expiry_days >= 0,
                "TICKER_EXPIRY_DAYS must be >= 0 (got {})",
                self.ticker_expiry_days
            );
            anyhow::ensure!(
                self.constituents_timeout_secs >= 1,
                "CONSTITUENTS_TIMEOUT_SECS must be >= 1"
            );
            anyhow::ensure!(
                self.data_provider_timeout_secs >= 1,
                "DATA_PROVIDER_TIMEOUT_SECS must be >= 1"
            );
            Ok(())
        }
    }

    /// `Ok(None)` when unset or blank; an error when set but unparseable.
    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        parse_value(key, std::env::var(key).ok())
    }

    fn parse_value<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid {key}: {raw:?}"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn defaults_match_monthly_scan_shape() {
            let s = Settings::default();
            assert_eq!(s.scan_limit, 250);
            assert_eq!(s.top_n, 200);
            assert_eq!(s.ticker_expiry_days, 180);
            assert_eq!(s.constituents_timeout_secs, 10);
            assert!(s.validate().is_ok());
        }

        #[test]
        fn malformed_numbers_are_errors_not_defaults() {
            assert!(parse_value::<usize>("TOP_N", Some("two hundred".into())).is_err());
            let err = parse_value::<usize>("SCAN_LIMIT", Some("-5".into())).unwrap_err();
            assert!(format!("{err:#}").contains("invalid SCAN_LIMIT"));
        }

        #[test]
        fn unset_or_blank_falls_back_and_values_are_trimmed() {
            assert_eq!(parse_value::<usize>("TOP_N", None).unwrap(), None);
            assert_eq!(parse_value::<usize>("TOP_N", Some("  ".into())).unwrap(), None);
            assert_eq!(parse_value::<i64>("TICKER_EXPIRY_DAYS", Some(" 30 ".into())).unwrap(), Some(30));
        }

        #[test]
        fn rejects_zero_timeouts() {
            let s = Settings {
                constituents_timeout_secs: 0,
                ..Settings::default()
            };
            assert!(s.validate().is_err());
            let s = Settings {
                data_provider_timeout_secs: 0,
                ..Settings::default()
            };
            assert!(s.validate().is_err());
        }

        #[test]
        fn rejects_zero_top_n() {
            let s = Settings {
                top_n: 0,
                ..Settings::default()
            };
            assert!(s.validate().is_err());
        }
    }
}
