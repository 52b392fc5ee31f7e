use crate::config::Settings;
use crate::domain::stock::TickerSymbol;
use crate::ingest::types::SymbolInfo;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const QUOTE_SUMMARY_MODULES: &str = "price,summaryDetail,assetProfile";

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_symbol_info(&self, symbol: &TickerSymbol) -> Result<SymbolInfo>;
}

/// Yahoo Finance quote-summary client.
///
/// Yahoo requires a session cookie plus a matching crumb on every
/// quote-summary call. The crumb is fetched lazily and kept for the life of
/// the client; an unauthorized response drops it so the next symbol
/// re-handshakes. Individual calls are never retried.
#[derive(Debug)]
pub struct YahooQuoteProvider {
    http: reqwest::Client,
    base_url: String,
    cookie_url: String,
    crumb_cache: tokio::sync::Mutex<Option<String>>,
}

impl YahooQuoteProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.data_provider_timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .cookie_store(true)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.yahoo_base_url.clone(),
            cookie_url: settings.yahoo_cookie_url.clone(),
            crumb_cache: tokio::sync::Mutex::new(None),
        })
    }

    fn quote_summary_url(&self, symbol: &TickerSymbol) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }

    async fn get_crumb_cached(&self) -> Result<String> {
        let mut guard = self.crumb_cache.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        let crumb = self.fetch_crumb().await?;
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // Only the Set-Cookie header matters; the body and status are ignored.
        let _ = self
            .http
            .get(&self.cookie_url)
            .send()
            .await
            .context("Yahoo cookie request failed")?;

        let url = format!("{}/v1/test/getcrumb", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Yahoo crumb request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Yahoo crumb response")?;
        if !status.is_success() {
            anyhow::bail!("Yahoo crumb HTTP {status}: {text}");
        }

        let crumb = text.trim().to_string();
        anyhow::ensure!(!crumb.is_empty(), "Yahoo crumb response was empty");
        Ok(crumb)
    }

    async fn invalidate_crumb(&self) {
        *self.crumb_cache.lock().await = None;
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooQuoteProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_quote_summary"
    }

    async fn fetch_symbol_info(&self, symbol: &TickerSymbol) -> Result<SymbolInfo> {
        let crumb = self.get_crumb_cached().await?;

        let res = self
            .http
            .get(self.quote_summary_url(symbol))
            .query(&[("modules", QUOTE_SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .send()
            .await
            .with_context(|| format!("quote summary request failed for {symbol}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read quote summary response")?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.invalidate_crumb().await;
        }

        // Yahoo reports unknown symbols as 404 with a JSON error body; prefer
        // that message over the bare status.
        let raw = serde_json::from_str::<Value>(&text).ok();
        match raw {
            Some(raw) => parse_quote_summary(raw, symbol),
            None if !status.is_success() => anyhow::bail!("quote summary HTTP {status}: {text}"),
            None => anyhow::bail!("quote summary response for {symbol} is not valid JSON"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<QuoteSummaryError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(default)]
    asset_profile: Option<AssetProfileModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(default)]
    market_cap: Option<RawNumber>,
    #[serde(default, rename = "trailingPE")]
    trailing_pe: Option<RawNumber>,
    #[serde(default)]
    dividend_yield: Option<RawNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfileModule {
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    long_business_summary: Option<String>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, sends `{}` when a
/// value is absent, and occasionally a string such as `"Infinity"`.
#[derive(Debug, Default, Deserialize)]
struct RawNumber {
    #[serde(default)]
    raw: Option<Value>,
}

impl RawNumber {
    fn value(&self) -> Option<f64> {
        self.raw
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }
}

fn raw_value(n: &Option<RawNumber>) -> Option<f64> {
    n.as_ref().and_then(RawNumber::value)
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn parse_quote_summary(raw: Value, symbol: &TickerSymbol) -> Result<SymbolInfo> {
    let envelope = serde_json::from_value::<QuoteSummaryEnvelope>(raw)
        .with_context(|| format!("unexpected quote summary shape for {symbol}"))?;

    if let Some(err) = envelope.quote_summary.error {
        anyhow::bail!(
            "quote summary error for {symbol}: {} ({})",
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        );
    }

    let result = envelope
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("quote summary result empty for {symbol}"))?;

    let price = result.price.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();
    let profile = result.asset_profile.unwrap_or_default();

    Ok(SymbolInfo {
        market_cap: raw_value(&detail.market_cap).or_else(|| raw_value(&price.market_cap)),
        trailing_pe: raw_value(&detail.trailing_pe),
        dividend_yield: raw_value(&detail.dividend_yield),
        short_name: non_blank(price.short_name),
        long_name: non_blank(price.long_name),
        sector: non_blank(profile.sector),
        industry: non_blank(profile.industry),
        long_business_summary: non_blank(profile.long_business_summary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aapl() -> TickerSymbol {
        TickerSymbol::normalize("AAPL").unwrap()
    }

    #[test]
    fn parses_expected_modules() {
        let v = json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "shortName": "Apple Inc.",
                        "longName": "Apple Inc.",
                        "marketCap": {"raw": 2.9e12, "fmt": "2.9T"}
                    },
                    "summaryDetail": {
                        "marketCap": {"raw": 3.0e12, "fmt": "3T"},
                        "trailingPE": {"raw": 29.87, "fmt": "29.87"},
                        "dividendYield": {"raw": 0.0044, "fmt": "0.44%"}
                    },
                    "assetProfile": {
                        "sector": "Technology",
                        "industry": "Consumer Electronics",
                        "longBusinessSummary": "Designs phones."
                    }
                }],
                "error": null
            }
        });

        let info = parse_quote_summary(v, &aapl()).unwrap();
        assert_eq!(info.market_cap, Some(3.0e12));
        assert_eq!(info.trailing_pe, Some(29.87));
        assert_eq!(info.dividend_yield, Some(0.0044));
        assert_eq!(info.short_name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn tolerates_empty_and_non_numeric_values() {
        let v = json!({
            "quoteSummary": {
                "result": [{
                    "price": {"shortName": "  ", "marketCap": {"raw": 1.5e11}},
                    "summaryDetail": {
                        "marketCap": {},
                        "trailingPE": {"raw": "Infinity", "fmt": "∞"},
                        "dividendYield": {}
                    }
                }],
                "error": null
            }
        });

        let info = parse_quote_summary(v, &aapl()).unwrap();
        assert_eq!(info.market_cap, Some(1.5e11));
        assert_eq!(info.trailing_pe, None);
        assert_eq!(info.dividend_yield, None);
        assert_eq!(info.short_name, None);
        assert_eq!(info.sector, None);
    }

    #[test]
    fn surfaces_provider_error_body() {
        let v = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}
            }
        });

        let err = parse_quote_summary(v, &aapl()).unwrap_err();
        assert!(format!("{err:#}").contains("Quote not found"));
    }

    #[test]
    fn rejects_unexpected_shape() {
        assert!(parse_quote_summary(json!({"chart": {}}), &aapl()).is_err());
    }
}
