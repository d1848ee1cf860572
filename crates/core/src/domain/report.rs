use crate::domain::metrics::{FundamentalMetrics, RiskMetrics, TechnicalIndicators};
use crate::domain::recommendation::RecommendationPackage;
use crate::error::{AnalysisError, AnalysisErrorKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Structured bundle handed to the AI collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    pub ticker: String,
    pub technicals: TechnicalIndicators,
    pub risk: RiskMetrics,
    pub fundamentals: Option<FundamentalMetrics>,
}

impl AnalysisContext {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: String,
    pub analyzed_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<AnalysisErrorKind>,
    pub data_range: Option<DataRange>,
    pub fundamentals: Option<FundamentalMetrics>,
    pub technicals: Option<TechnicalIndicators>,
    pub risk: Option<RiskMetrics>,
    pub recommendation: Option<RecommendationPackage>,
    pub final_report: String,
    pub llm_used: bool,
    /// Why the offline rules produced the recommendation, when they did.
    #[serde(default)]
    pub fallback_reason: Option<String>,
}

impl AnalysisResult {
    /// Result for a request that failed before any analytics ran.
    pub fn failed(ticker: impl Into<String>, err: &AnalysisError) -> Self {
        let ticker = ticker.into();
        let message = err.to_string();
        let final_report = format!(
            "**Error:** {message}\n\nAnalysis could not be completed for ticker '{ticker}'. \
Please verify the ticker symbol is correct and try again."
        );
        Self {
            ticker,
            analyzed_at: Utc::now(),
            success: false,
            error: Some(message),
            error_kind: Some(err.kind()),
            data_range: None,
            fundamentals: None,
            technicals: None,
            risk: None,
            recommendation: None,
            final_report,
            llm_used: false,
            fallback_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_is_stamped_and_round_trips() {
        let before = Utc::now();
        let err = AnalysisError::InvalidInput("ticker must not be empty".to_string());
        let out = AnalysisResult::failed("", &err);
        assert!(out.analyzed_at >= before && out.analyzed_at <= Utc::now());
        assert_eq!(out.fallback_reason, None);

        let json = serde_json::to_value(&out).unwrap();
        assert!(json["analyzed_at"].is_string());
        let back: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.analyzed_at, out.analyzed_at);
    }
}
