use crate::domain::{PriceSeries, TechnicalIndicators, Trend};
use crate::error::AnalysisError;

/// Bars needed before any indicator is reported: MACD(12, 26, 9) needs 34,
/// SMA(50) needs 50.
pub const MIN_HISTORY_BARS: usize = 50;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

// MACD and signal closer than this are treated as equal (float noise).
const TREND_EPSILON: f64 = 1e-9;

/// Simple moving average; element `i` covers `values[i..i + period]`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Element 0 corresponds to `values[period - 1]`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &x in &values[period..] {
        // Same as x*k + prev*(1-k), but a constant input stays exactly constant.
        prev += k * (x - prev);
        out.push(prev);
    }
    out
}

/// Latest RSI with Wilder smoothing. `None` until `period + 1` closes exist.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            }
        })
        .unzip();

    let p = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / p;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / p;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (p - 1.0) + gains[i]) / p;
        avg_loss = (avg_loss * (p - 1.0) + losses[i]) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd_line: f64,
    pub signal_line: f64,
}

/// Latest MACD line and signal line.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdReading> {
    if fast == 0 || slow <= fast || signal == 0 {
        return None;
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    if ema_slow.is_empty() {
        return None;
    }

    // Align both series on the close index: ema_fast[j] is close j + fast - 1.
    let offset = slow - fast;
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(j, slow_v)| ema_fast[j + offset] - slow_v)
        .collect();

    let signal_line = ema(&macd_line, signal);
    Some(MacdReading {
        macd_line: *macd_line.last()?,
        signal_line: *signal_line.last()?,
    })
}

pub fn classify_trend(reading: MacdReading) -> Trend {
    let diff = reading.macd_line - reading.signal_line;
    if diff.abs() <= TREND_EPSILON {
        Trend::Neutral
    } else if diff > 0.0 {
        Trend::Bullish
    } else {
        Trend::Bearish
    }
}

/// Computes the latest technical readings. Series shorter than
/// [`MIN_HISTORY_BARS`] are rejected rather than producing unstable values.
pub fn compute(series: &PriceSeries) -> Result<TechnicalIndicators, AnalysisError> {
    if series.len() < MIN_HISTORY_BARS {
        return Err(AnalysisError::InsufficientHistory {
            required: MIN_HISTORY_BARS,
            actual: series.len(),
        });
    }

    let closes = series.closes();
    let reading = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

    Ok(TechnicalIndicators {
        current_price: closes.last().copied(),
        rsi_14: rsi(&closes, RSI_PERIOD),
        macd_line: reading.map(|r| r.macd_line),
        signal_line: reading.map(|r| r.signal_line),
        sma_20: sma(&closes, 20).last().copied(),
        sma_50: sma(&closes, 50).last().copied(),
        trend: reading.map(classify_trend),
    })
}
