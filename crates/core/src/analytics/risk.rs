use crate::domain::{PriceSeries, RiskMetrics};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple daily returns `close_t / close_{t-1} - 1`.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    sample_std(returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized Sharpe ratio; `None` when volatility is zero or undefined.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let vol = annualized_volatility(returns)?;
    if vol == 0.0 || !vol.is_finite() {
        return None;
    }
    let annual_return = mean(returns)? * TRADING_DAYS_PER_YEAR;
    Some((annual_return - risk_free_rate) / vol)
}

/// Drawdown of every close from its running peak, each value <= 0.
pub fn drawdowns(closes: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    closes
        .iter()
        .map(|&c| {
            peak = peak.max(c);
            if peak > 0.0 {
                (c - peak) / peak
            } else {
                0.0
            }
        })
        .collect()
}

pub fn compute(series: &PriceSeries, risk_free_rate: f64) -> RiskMetrics {
    let closes = series.closes();
    if closes.len() < 2 {
        return RiskMetrics::default();
    }

    let returns = daily_returns(&closes);
    let dd = drawdowns(&closes);

    RiskMetrics {
        volatility: annualized_volatility(&returns),
        sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
        max_drawdown: dd.iter().copied().reduce(f64::min),
        current_drawdown: dd.last().copied(),
    }
}
