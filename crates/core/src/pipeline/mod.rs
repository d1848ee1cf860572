//! End-to-end analysis of one ticker.

use crate::analytics::{fundamentals, indicators, risk};
use crate::config::{env_or, Settings};
use crate::domain::{
    AnalysisContext, AnalysisResult, DataRange, FundamentalMetrics, PriceSeries, RiskMetrics,
    TechnicalIndicators,
};
use crate::error::AnalysisError;
use crate::ingest::{
    FundamentalsProvider, HttpJsonFundamentalsProvider, MarketDataProvider, YahooChartProvider,
    YahooQuoteFundamentalsProvider,
};
use crate::llm::AnthropicClient;
use crate::synth::{
    insufficient_data_package, FallbackCause, RuleThresholds, Synthesizer, DEFAULT_LLM_TIMEOUT,
};
use crate::time::{resolve_window, LookbackWindow, DEFAULT_LOOKBACK_YEARS};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_TICKER_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_rate: f64,
    pub lookback_years: u32,
    pub llm_timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }
}

impl AnalysisOptions {
    pub fn from_env() -> Self {
        let d = Self::default();
        let risk_free_rate = env_or("RISK_FREE_RATE", d.risk_free_rate);
        Self {
            risk_free_rate: if risk_free_rate.is_finite() {
                risk_free_rate
            } else {
                d.risk_free_rate
            },
            lookback_years: env_or("LOOKBACK_YEARS", d.lookback_years).max(1),
            llm_timeout: Duration::from_secs(env_or("LLM_TIMEOUT_SECS", d.llm_timeout.as_secs())),
        }
    }
}

/// Normalizes a user-supplied symbol: trimmed, upper-cased, limited to
/// characters that appear in exchange tickers (`BRK.B`, `^GSPC`, `EURUSD=X`).
pub fn validate_ticker(raw: &str) -> Result<String, AnalysisError> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "ticker must not be empty".to_string(),
        ));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(AnalysisError::InvalidInput(format!(
            "ticker '{ticker}' exceeds {MAX_TICKER_LEN} characters"
        )));
    }
    if let Some(c) = ticker
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
    {
        return Err(AnalysisError::InvalidInput(format!(
            "ticker '{ticker}' contains invalid character '{c}'"
        )));
    }
    Ok(ticker)
}

#[derive(Clone)]
pub struct Analyzer {
    market: Arc<dyn MarketDataProvider>,
    fundamentals: Option<Arc<dyn FundamentalsProvider>>,
    synthesizer: Synthesizer,
    options: AnalysisOptions,
}

impl Analyzer {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        fundamentals: Option<Arc<dyn FundamentalsProvider>>,
        synthesizer: Synthesizer,
        options: AnalysisOptions,
    ) -> Self {
        Self {
            market,
            fundamentals,
            synthesizer,
            options,
        }
    }

    /// Wires the production collaborators. Fundamentals come from the Yahoo
    /// quote endpoint unless `FUNDAMENTALS_PROVIDER_BASE_URL` points at
    /// another JSON source. An unset API key disables the AI collaborator.
    pub fn from_settings(settings: &Settings, offline: bool) -> anyhow::Result<Self> {
        let options = AnalysisOptions::from_env();
        let thresholds = RuleThresholds::from_env();

        let market: Arc<dyn MarketDataProvider> = Arc::new(YahooChartProvider::from_env()?);

        let fundamentals: Arc<dyn FundamentalsProvider> =
            if settings.fundamentals_provider_base_url.is_some() {
                Arc::new(HttpJsonFundamentalsProvider::from_settings(settings)?)
            } else {
                Arc::new(YahooQuoteFundamentalsProvider::from_env()?)
            };
        tracing::info!(provider = fundamentals.provider_name(), "fundamentals source selected");

        let synthesizer = if offline || settings.anthropic_api_key.is_none() {
            tracing::info!(offline, "AI collaborator disabled; recommendations use offline rules");
            Synthesizer::offline(thresholds)
        } else {
            Synthesizer::with_llm(
                Arc::new(AnthropicClient::from_settings(settings)?),
                thresholds,
                options.llm_timeout,
            )
        };

        Ok(Self::new(market, Some(fundamentals), synthesizer, options))
    }

    /// Runs the whole pipeline. Failures are reported inside the result
    /// (`success = false`) and never returned as errors.
    #[tracing::instrument(skip_all, fields(ticker = %raw_ticker))]
    pub async fn analyze(&self, raw_ticker: &str) -> AnalysisResult {
        let ticker = match validate_ticker(raw_ticker) {
            Ok(t) => t,
            Err(err) => {
                tracing::info!(error = %err, "rejected ticker");
                return AnalysisResult::failed(raw_ticker.trim(), &err);
            }
        };

        let window = match resolve_window(None, Utc::now(), self.options.lookback_years) {
            Ok(w) => w,
            Err(err) => {
                let err = AnalysisError::InvalidInput(format!("{err:#}"));
                return AnalysisResult::failed(ticker, &err);
            }
        };

        let (history, fundamentals) = tokio::join!(
            self.load_series(&ticker, &window),
            self.load_fundamentals(&ticker)
        );

        let series = match history {
            Ok(series) => series,
            Err(err) => {
                tracing::warn!(error = %err, "price history unavailable");
                return AnalysisResult::failed(ticker, &err);
            }
        };
        let data_range = DataRange {
            start: series.first_date().unwrap_or(window.start),
            end: series.last_date().unwrap_or(window.end),
            rows: series.len(),
        };

        if series.len() < indicators::MIN_HISTORY_BARS {
            let err = AnalysisError::InsufficientHistory {
                required: indicators::MIN_HISTORY_BARS,
                actual: series.len(),
            };
            tracing::warn!(rows = series.len(), "not enough history; skipping analytics");
            return insufficient_history_result(ticker, data_range, fundamentals, &err);
        }

        let technicals = match indicators::compute(&series) {
            Ok(t) => t,
            Err(err) => return insufficient_history_result(ticker, data_range, fundamentals, &err),
        };
        let risk = risk::compute(&series, self.options.risk_free_rate);
        tracing::debug!(
            trend = ?technicals.trend,
            rsi = ?technicals.rsi_14,
            volatility = ?risk.volatility,
            sharpe = ?risk.sharpe_ratio,
            "analytics computed"
        );

        let ctx = AnalysisContext {
            ticker: ticker.clone(),
            technicals,
            risk,
            fundamentals,
        };
        let synthesis = self.synthesizer.synthesize(&ctx).await;
        let llm_used = synthesis.llm_used();
        let fallback_reason = synthesis.fallback_cause().map(ToString::to_string);
        let package = synthesis.into_package();
        tracing::info!(
            recommendation = %package.recommendation,
            risk_level = %package.risk_level,
            llm_used,
            fallback = fallback_reason.as_deref().unwrap_or("none"),
            "analysis complete"
        );

        AnalysisResult {
            final_report: package.render_report(),
            ticker: ctx.ticker,
            analyzed_at: Utc::now(),
            success: true,
            error: None,
            error_kind: None,
            data_range: Some(data_range),
            fundamentals: ctx.fundamentals,
            technicals: Some(ctx.technicals),
            risk: Some(ctx.risk),
            recommendation: Some(package),
            llm_used,
            fallback_reason,
        }
    }

    async fn load_series(
        &self,
        ticker: &str,
        window: &LookbackWindow,
    ) -> Result<PriceSeries, AnalysisError> {
        let unavailable = |detail: String| AnalysisError::DataUnavailable {
            ticker: ticker.to_string(),
            detail,
        };

        let bars = self
            .market
            .fetch_history(ticker, window)
            .await
            .map_err(|err| unavailable(format!("{} fetch failed: {err:#}", self.market.provider_name())))?;
        if bars.is_empty() {
            return Err(unavailable("provider returned no rows".to_string()));
        }
        PriceSeries::try_new(ticker, bars).map_err(|err| unavailable(format!("{err:#}")))
    }

    async fn load_fundamentals(&self, ticker: &str) -> Option<FundamentalMetrics> {
        let provider = self.fundamentals.as_ref()?;
        match provider.fetch_fundamentals(ticker).await {
            Ok(raw) => Some(fundamentals::snapshot(&raw)),
            Err(err) => {
                tracing::warn!(
                    provider = provider.provider_name(),
                    error = %err,
                    "fundamentals unavailable; continuing without them"
                );
                None
            }
        }
    }
}

fn insufficient_history_result(
    ticker: String,
    data_range: DataRange,
    fundamentals: Option<FundamentalMetrics>,
    err: &AnalysisError,
) -> AnalysisResult {
    let package = insufficient_data_package();
    let final_report = format!("**Error:** {err}\n\n{}", package.render_report());
    AnalysisResult {
        ticker,
        analyzed_at: Utc::now(),
        success: false,
        error: Some(err.to_string()),
        error_kind: Some(err.kind()),
        data_range: Some(data_range),
        fundamentals,
        technicals: Some(TechnicalIndicators::default()),
        risk: Some(RiskMetrics::default()),
        recommendation: Some(package),
        final_report,
        llm_used: false,
        fallback_reason: Some(FallbackCause::InsufficientData.to_string()),
    }
}
