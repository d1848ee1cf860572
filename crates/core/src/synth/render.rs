use crate::domain::{
    Recommendation, RecommendationPackage, RiskLevel, RiskMetrics, TechnicalIndicators,
};
use crate::synth::rules::{self, Decision};
use crate::synth::thresholds::RuleThresholds;

const UNAVAILABLE: &str = "unavailable";

fn num(v: Option<f64>) -> String {
    v.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{v:.2}"))
}

fn pct(v: Option<f64>) -> String {
    v.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Templated explanation built only from the computed values.
pub fn reasoning(
    t: &TechnicalIndicators,
    r: &RiskMetrics,
    decision: Decision,
    th: &RuleThresholds,
) -> String {
    let mut parts = Vec::with_capacity(4);

    parts.push(match t.trend {
        Some(trend) => format!(
            "Technical analysis shows a {} trend with RSI at {}.",
            trend.to_string().to_lowercase(),
            num(t.rsi_14)
        ),
        None => format!(
            "The MACD trend signal is unavailable and RSI is {}.",
            num(t.rsi_14)
        ),
    });
    parts.push(format!(
        "Volatility is {} with a Sharpe ratio of {}.",
        pct(r.volatility),
        num(r.sharpe_ratio)
    ));
    parts.push(format!(
        "Current drawdown is {} against a maximum drawdown of {} over the lookback window.",
        pct(r.current_drawdown),
        pct(r.max_drawdown)
    ));
    parts.push(match decision.recommendation {
        Recommendation::Buy => format!(
            "A bullish trend with RSI below {:.0} and a Sharpe ratio of at least {:.2} supports a BUY.",
            th.buy_rsi_ceiling, th.buy_min_sharpe
        ),
        Recommendation::Sell => format!(
            "A bearish trend with a current drawdown deeper than {} supports a SELL.",
            pct(Some(th.sell_drawdown))
        ),
        Recommendation::Hold => "Signals are mixed or incomplete, so the position is HOLD.".to_string(),
    });

    parts.join(" ")
}

/// Fixed-order facts: trend, RSI, Sharpe, volatility, current drawdown.
pub fn key_drivers(t: &TechnicalIndicators, r: &RiskMetrics) -> Vec<String> {
    vec![
        format!(
            "Trend signal: {}",
            t.trend.map_or_else(|| UNAVAILABLE.to_string(), |v| v.to_string())
        ),
        format!("RSI (14): {}", num(t.rsi_14)),
        format!("Sharpe ratio: {}", num(r.sharpe_ratio)),
        format!("Volatility: {}", pct(r.volatility)),
        format!("Current drawdown: {}", pct(r.current_drawdown)),
    ]
}

pub fn fallback_package(
    t: &TechnicalIndicators,
    r: &RiskMetrics,
    th: &RuleThresholds,
) -> RecommendationPackage {
    let decision = rules::decide(t, r, th);
    RecommendationPackage {
        recommendation: decision.recommendation,
        risk_level: decision.risk_level,
        reasoning: reasoning(t, r, decision, th),
        key_drivers: key_drivers(t, r),
        llm_used: false,
    }
}

pub fn insufficient_data_package() -> RecommendationPackage {
    RecommendationPackage {
        recommendation: Recommendation::Hold,
        risk_level: RiskLevel::Unknown,
        reasoning: "Data was insufficient to compute technical indicators or risk metrics, \
so no directional call is made."
            .to_string(),
        key_drivers: vec!["Insufficient price history".to_string()],
        llm_used: false,
    }
}
