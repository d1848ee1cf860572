use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Bullish => "Bullish",
            Trend::Bearish => "Bearish",
            Trend::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

/// Latest-bar technical readings. `Default` is the "unavailable" value:
/// every field `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub current_price: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd_line: Option<f64>,
    pub signal_line: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub trend: Option<Trend>,
}

impl TechnicalIndicators {
    pub fn is_unavailable(&self) -> bool {
        *self == Self::default()
    }
}

/// Point-in-time company metrics. Missing provider fields stay `None`;
/// they are never defaulted to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized standard deviation of daily returns.
    pub volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    /// Worst peak-to-trough decline over the window, always <= 0.
    pub max_drawdown: Option<f64>,
    /// Decline of the latest close from its running peak, always <= 0.
    pub current_drawdown: Option<f64>,
}

impl RiskMetrics {
    pub fn is_unavailable(&self) -> bool {
        *self == Self::default()
    }
}
