use crate::config::env_or;
use crate::domain::PriceBar;
use crate::ingest::provider::{with_retries, FundamentalsProvider, MarketDataProvider};
use crate::ingest::types::{ChartEnvelope, ChartResult, QuoteEnvelope};
use crate::time::LookbackWindow;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RETRIES: u32 = 3;
const USER_AGENT: &str = "Mozilla/5.0";
const QUOTE_PATH: &str = "/v7/finance/quote";

fn base_url_from_env() -> String {
    std::env::var("MARKET_DATA_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn http_client(timeout_secs: u64, what: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| format!("failed to build {what} http client"))
}

/// Daily history from the Yahoo Finance v8 chart endpoint.
///
/// Prices are adjusted for splits and dividends: every OHLC value is scaled
/// by `adjclose / close` for its row.
#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = env_or("MARKET_DATA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            http: http_client(timeout_secs, "market data")?,
            base_url: base_url_from_env(),
            retries: env_or("MARKET_DATA_RETRIES", DEFAULT_RETRIES),
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker
        )
    }

    async fn fetch_once(&self, ticker: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        let (period1, period2) = period_bounds(window);
        let res = self
            .http
            .get(self.url(ticker))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,split".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        // Unknown symbols come back as 404 with a chart.error body.
        if status == StatusCode::NOT_FOUND {
            tracing::info!(ticker, "market data provider reports unknown symbol");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let envelope = serde_json::from_str::<ChartEnvelope>(&text)
            .with_context(|| format!("market data response is not a chart payload: {text}"))?;
        if let Some(err) = envelope.chart.error {
            if err.code.eq_ignore_ascii_case("Not Found") {
                return Ok(Vec::new());
            }
            anyhow::bail!("market data error {}: {}", err.code, err.description);
        }

        let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        Ok(bars_from_chart(&result, window))
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_history(&self, ticker: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        let bars = with_retries(self.retries, "market data", move || {
            self.fetch_once(ticker, window)
        })
        .await?;
        tracing::debug!(ticker, rows = bars.len(), start = %window.start, end = %window.end, "fetched price history");
        Ok(bars)
    }
}

/// Fundamentals from the Yahoo Finance quote endpoint, served by the same
/// host as the price history (`MARKET_DATA_BASE_URL`).
///
/// Returns the symbol's quote object as-is (`marketCap`, `trailingPE`,
/// `forwardPE`, ...). An unknown symbol yields an empty map.
#[derive(Debug, Clone)]
pub struct YahooQuoteFundamentalsProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooQuoteFundamentalsProvider {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = env_or("MARKET_DATA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            http: http_client(timeout_secs, "quote")?,
            base_url: base_url_from_env(),
            retries: env_or("MARKET_DATA_RETRIES", DEFAULT_RETRIES),
        })
    }

    fn url(&self) -> String {
        format!("{}{QUOTE_PATH}", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_once(&self, ticker: &str) -> Result<BTreeMap<String, Value>> {
        let res = self
            .http
            .get(self.url())
            .query(&[("symbols", ticker)])
            .send()
            .await
            .context("quote request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read quote response")?;
        if status == StatusCode::NOT_FOUND {
            return Ok(BTreeMap::new());
        }
        if !status.is_success() {
            anyhow::bail!("quote HTTP {status}: {text}");
        }

        let envelope = serde_json::from_str::<QuoteEnvelope>(&text)
            .with_context(|| format!("quote response is not a quoteResponse payload: {text}"))?;
        fundamentals_from_quote(envelope, ticker)
    }
}

#[async_trait::async_trait]
impl FundamentalsProvider for YahooQuoteFundamentalsProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_quote"
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<BTreeMap<String, Value>> {
        let map = with_retries(self.retries, "quote", move || self.fetch_once(ticker)).await?;
        tracing::debug!(ticker, fields = map.len(), "fetched quote fundamentals");
        Ok(map)
    }
}

/// Picks the quote object for `ticker`, falling back to the first result
/// when the provider echoes a different case or suffix.
pub(crate) fn fundamentals_from_quote(
    envelope: QuoteEnvelope,
    ticker: &str,
) -> Result<BTreeMap<String, Value>> {
    let response = envelope.quote_response;
    if let Some(err) = response.error {
        anyhow::bail!("quote error {}: {}", err.code, err.description);
    }
    let mut results = response.result.unwrap_or_default();
    let idx = results
        .iter()
        .position(|q| {
            q.get("symbol")
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case(ticker))
        })
        .unwrap_or(0);
    if idx >= results.len() {
        return Ok(BTreeMap::new());
    }
    Ok(results.swap_remove(idx))
}

/// Unix seconds covering `[start 00:00, end + 1 day 00:00)` in UTC.
fn period_bounds(window: &LookbackWindow) -> (i64, i64) {
    let start = window.start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
    let end = (window.end + ChronoDuration::days(1))
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc().timestamp());
    (start.unwrap_or(0), end.unwrap_or(i64::MAX))
}

/// Converts a chart result into ascending daily bars inside `window`.
///
/// Rows missing any OHLC value are skipped; a missing volume counts as 0.
/// When the provider repeats a trading date the later row wins.
pub(crate) fn bars_from_chart(result: &ChartResult, window: &LookbackWindow) -> Vec<PriceBar> {
    let Some(timestamps) = result.timestamp.as_deref() else {
        return Vec::new();
    };
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };
    let adjclose = result
        .indicators
        .adjclose
        .as_ref()
        .and_then(|a| a.first())
        .map(|a| a.adjclose.as_slice())
        .unwrap_or(&[]);

    let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(date) = local_date(*ts, result.meta.gmtoffset) else {
            continue;
        };
        if !window.contains(date) {
            continue;
        }
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        if close <= 0.0 {
            continue;
        }

        let factor = at(adjclose, i)
            .filter(|adj| *adj > 0.0)
            .map_or(1.0, |adj| adj / close);
        let bar = PriceBar {
            date,
            open: open * factor,
            high: high * factor,
            low: low * factor,
            close: close * factor,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        };

        match bars.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            Some(last) if last.date > bar.date => {}
            _ => bars.push(bar),
        }
    }
    bars
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|x| x.is_finite())
}

fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fundamentals;
    use crate::ingest::types::ChartEnvelope;
    use serde_json::json;

    fn window() -> LookbackWindow {
        LookbackWindow {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    fn result(v: serde_json::Value) -> ChartResult {
        let env: ChartEnvelope = serde_json::from_value(v).unwrap();
        env.chart.result.unwrap().into_iter().next().unwrap()
    }

    // 14:30 UTC (NYSE open) on 2024-01-02, 01-03 and 01-04.
    const TS1: i64 = 1_704_205_800;
    const TS2: i64 = 1_704_292_200;
    const TS3: i64 = 1_704_378_600;

    #[test]
    fn builds_adjusted_bars_and_skips_incomplete_rows() {
        let r = result(json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "gmtoffset": -18000},
                    "timestamp": [TS1, TS2, TS3],
                    "indicators": {
                        "quote": [{
                            "open":   [100.0, null, 102.0],
                            "high":   [110.0, 111.0, 112.0],
                            "low":    [90.0, 91.0, 92.0],
                            "close":  [100.0, 101.0, 104.0],
                            "volume": [1000.0, 1100.0, null]
                        }],
                        "adjclose": [{"adjclose": [50.0, 50.5, 52.0]}]
                    }
                }],
                "error": null
            }
        }));

        let bars = bars_from_chart(&r, &window());
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, 50.0);
        assert_eq!(bars[0].open, 50.0);
        assert_eq!(bars[0].high, 55.0);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(bars[1].close, 52.0);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn missing_adjclose_keeps_raw_prices() {
        let r = result(json!({
            "chart": {
                "result": [{
                    "timestamp": [TS1],
                    "indicators": {
                        "quote": [{
                            "open": [10.0], "high": [11.0], "low": [9.0],
                            "close": [10.5], "volume": [5.0]
                        }]
                    }
                }]
            }
        }));
        let bars = bars_from_chart(&r, &window());
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 10.5);
    }

    #[test]
    fn duplicate_dates_keep_latest_and_window_filters() {
        let outside = 1_672_756_200; // 2023-01-03
        let r = result(json!({
            "chart": {
                "result": [{
                    "timestamp": [outside, TS1, TS1 + 3600],
                    "indicators": {
                        "quote": [{
                            "open": [1.0, 1.0, 1.0], "high": [1.0, 1.0, 1.0],
                            "low": [1.0, 1.0, 1.0], "close": [1.0, 2.0, 3.0],
                            "volume": [1.0, 1.0, 1.0]
                        }]
                    }
                }]
            }
        }));
        let bars = bars_from_chart(&r, &window());
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 3.0);
    }

    #[test]
    fn empty_result_yields_no_bars() {
        let r = result(json!({
            "chart": {"result": [{"indicators": {"quote": []}}]}
        }));
        assert!(bars_from_chart(&r, &window()).is_empty());
    }

    #[test]
    fn chart_error_payload_decodes() {
        let env: ChartEnvelope = serde_json::from_value(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }))
        .unwrap();
        assert_eq!(env.chart.error.unwrap().code, "Not Found");
    }

    #[test]
    fn period_bounds_cover_the_whole_end_day() {
        let (p1, p2) = period_bounds(&window());
        assert_eq!(p1, 1_704_067_200);
        assert_eq!(p2, 1_735_689_600);
    }

    fn quote(v: serde_json::Value) -> QuoteEnvelope {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn quote_payload_feeds_fundamental_snapshot() {
        let env = quote(json!({
            "quoteResponse": {
                "result": [{
                    "symbol": "AAPL",
                    "marketCap": 3.1e12,
                    "trailingPE": 33.4,
                    "forwardPE": 29.8,
                    "regularMarketPrice": 227.5
                }],
                "error": null
            }
        }));
        let raw = fundamentals_from_quote(env, "AAPL").unwrap();
        let snap = fundamentals::snapshot(&raw);
        assert_eq!(snap.market_cap, Some(3.1e12));
        assert_eq!(snap.pe_ratio, Some(33.4));
        assert_eq!(snap.forward_pe, Some(29.8));
        assert_eq!(snap.sector, None);
    }

    #[test]
    fn quote_picks_the_requested_symbol() {
        let env = quote(json!({
            "quoteResponse": {
                "result": [
                    {"symbol": "MSFT", "trailingPE": 36.0},
                    {"symbol": "BRK-B", "trailingPE": 9.5}
                ]
            }
        }));
        let raw = fundamentals_from_quote(env, "brk-b").unwrap();
        assert_eq!(raw.get("trailingPE"), Some(&json!(9.5)));
    }

    #[test]
    fn empty_quote_result_is_an_empty_map() {
        let env = quote(json!({"quoteResponse": {"result": [], "error": null}}));
        assert!(fundamentals_from_quote(env, "ZZZZ").unwrap().is_empty());
    }

    #[test]
    fn quote_error_payload_is_an_error() {
        let env = quote(json!({
            "quoteResponse": {
                "result": null,
                "error": {"code": "Unauthorized", "description": "Invalid Crumb"}
            }
        }));
        let err = fundamentals_from_quote(env, "AAPL").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid Crumb"));
    }
}
