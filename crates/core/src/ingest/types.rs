//! Wire shapes of the Yahoo Finance chart and quote endpoints.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<YahooError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEnvelope {
    pub quote_response: QuoteResponse,
}

/// One loosely typed object per requested symbol; field coverage varies by
/// instrument, so values are kept raw.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub result: Option<Vec<BTreeMap<String, Value>>>,
    #[serde(default)]
    pub error: Option<YahooError>,
}
