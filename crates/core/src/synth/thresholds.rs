use crate::config::env_or;
use serde::{Deserialize, Serialize};

/// Every constant the offline rule set depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// BUY requires RSI strictly below this.
    pub buy_rsi_ceiling: f64,
    /// BUY requires Sharpe at or above this.
    pub buy_min_sharpe: f64,
    /// SELL requires current drawdown strictly below this.
    pub sell_drawdown: f64,
    /// High risk at or above this volatility.
    pub high_volatility: f64,
    /// High risk when max drawdown is strictly below this.
    pub high_max_drawdown: f64,
    /// Low risk requires volatility strictly below this.
    pub low_volatility: f64,
    /// Low risk requires Sharpe at or above this.
    pub low_min_sharpe: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            buy_rsi_ceiling: 70.0,
            buy_min_sharpe: 0.5,
            sell_drawdown: -0.15,
            high_volatility: 0.35,
            high_max_drawdown: -0.30,
            low_volatility: 0.20,
            low_min_sharpe: 0.7,
        }
    }
}

impl RuleThresholds {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            buy_rsi_ceiling: env_or("RULE_BUY_RSI_CEILING", d.buy_rsi_ceiling),
            buy_min_sharpe: env_or("RULE_BUY_MIN_SHARPE", d.buy_min_sharpe),
            sell_drawdown: env_or("RULE_SELL_DRAWDOWN", d.sell_drawdown),
            high_volatility: env_or("RULE_HIGH_VOLATILITY", d.high_volatility),
            high_max_drawdown: env_or("RULE_HIGH_MAX_DRAWDOWN", d.high_max_drawdown),
            low_volatility: env_or("RULE_LOW_VOLATILITY", d.low_volatility),
            low_min_sharpe: env_or("RULE_LOW_MIN_SHARPE", d.low_min_sharpe),
        }
    }
}
