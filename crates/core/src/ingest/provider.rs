use crate::config::{env_or, Settings};
use crate::domain::PriceBar;
use crate::time::LookbackWindow;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/fundamentals";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars inside `window`, oldest first. An unknown ticker yields an
    /// empty vector rather than an error.
    async fn fetch_history(&self, ticker: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>>;
}

#[async_trait::async_trait]
pub trait FundamentalsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<BTreeMap<String, Value>>;
}

/// Runs `op` up to `retries` times with 1s, 2s, 4s... backoff between attempts.
pub(crate) async fn with_retries<T, F, Fut>(retries: u32, what: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retries = retries.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if attempt >= retries {
                    return Err(err);
                }
                let backoff = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?backoff, error = %err, "{what} fetch failed; retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Generic HTTP JSON fundamentals source: `GET {base}{path}?ticker=T`
/// returning a flat object (optionally wrapped in `{"data": {...}}`).
#[derive(Debug, Clone)]
pub struct HttpJsonFundamentalsProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonFundamentalsProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_fundamentals_provider_base_url()?.to_string();
        let api_key = settings.fundamentals_provider_api_key.clone();

        let timeout_secs = env_or("FUNDAMENTALS_PROVIDER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let retries = env_or("FUNDAMENTALS_PROVIDER_RETRIES", DEFAULT_RETRIES);

        let path = std::env::var("FUNDAMENTALS_PROVIDER_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build fundamentals provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, ticker: &str) -> Result<BTreeMap<String, Value>> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[("ticker", ticker)])
            .send()
            .await
            .context("fundamentals provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read fundamentals provider response")?;
        if !status.is_success() {
            anyhow::bail!("fundamentals provider HTTP {status}: {text}");
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("fundamentals response is not valid JSON: {text}"))?;
        parse_fundamentals(raw_json)
    }
}

#[async_trait::async_trait]
impl FundamentalsProvider for HttpJsonFundamentalsProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<BTreeMap<String, Value>> {
        with_retries(self.retries, "fundamentals", move || self.fetch_once(ticker)).await
    }
}

fn parse_fundamentals(raw: Value) -> Result<BTreeMap<String, Value>> {
    let body = match raw {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                map.insert("data".to_string(), other);
                map
            }
            None => map,
        },
        other => anyhow::bail!("fundamentals response must be a JSON object, got {other}"),
    };
    Ok(body.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn parses_flat_object() {
        let map = parse_fundamentals(json!({"marketCap": 1.0e9, "sector": "Energy"})).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("sector"), Some(&json!("Energy")));
    }

    #[test]
    fn unwraps_data_envelope() {
        let map = parse_fundamentals(json!({"data": {"trailingPE": 14.2}})).unwrap();
        assert_eq!(map.get("trailingPE"), Some(&json!(14.2)));
        assert!(!map.contains_key("data"));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(parse_fundamentals(json!([1, 2, 3])).is_err());
        assert!(parse_fundamentals(json!("oops")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = with_retries(3, "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                anyhow::bail!("transient {n}")
            }
            Ok(n)
        })
        .await
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_configured_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let res: Result<()> = with_retries(2, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("down")
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
