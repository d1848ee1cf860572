use crate::domain::{Recommendation, RiskLevel, RiskMetrics, TechnicalIndicators, Trend};
use crate::synth::thresholds::RuleThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
}

/// Offline decision. A missing metric never satisfies a condition.
pub fn decide(t: &TechnicalIndicators, r: &RiskMetrics, th: &RuleThresholds) -> Decision {
    Decision {
        recommendation: recommend(t, r, th),
        risk_level: assess_risk(r, th),
    }
}

fn recommend(t: &TechnicalIndicators, r: &RiskMetrics, th: &RuleThresholds) -> Recommendation {
    let rsi_ok = t.rsi_14.is_some_and(|v| v < th.buy_rsi_ceiling);
    let sharpe_ok = r.sharpe_ratio.is_some_and(|v| v >= th.buy_min_sharpe);
    let drawdown_severe = r.current_drawdown.is_some_and(|v| v < th.sell_drawdown);

    match t.trend {
        Some(Trend::Bullish) if rsi_ok && sharpe_ok => Recommendation::Buy,
        Some(Trend::Bearish) if drawdown_severe => Recommendation::Sell,
        _ => Recommendation::Hold,
    }
}

fn assess_risk(r: &RiskMetrics, th: &RuleThresholds) -> RiskLevel {
    let vol_high = r.volatility.is_some_and(|v| v >= th.high_volatility);
    let dd_high = r.max_drawdown.is_some_and(|v| v < th.high_max_drawdown);
    if vol_high || dd_high {
        return RiskLevel::High;
    }

    let vol_low = r.volatility.is_some_and(|v| v < th.low_volatility);
    let sharpe_strong = r.sharpe_ratio.is_some_and(|v| v >= th.low_min_sharpe);
    if vol_low && sharpe_strong {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(trend: Option<Trend>, rsi: Option<f64>) -> TechnicalIndicators {
        TechnicalIndicators {
            current_price: Some(100.0),
            rsi_14: rsi,
            macd_line: Some(1.0),
            signal_line: Some(0.5),
            sma_20: None,
            sma_50: None,
            trend,
        }
    }

    fn risk(vol: f64, sharpe: Option<f64>, max_dd: f64, cur_dd: f64) -> RiskMetrics {
        RiskMetrics {
            volatility: Some(vol),
            sharpe_ratio: sharpe,
            max_drawdown: Some(max_dd),
            current_drawdown: Some(cur_dd),
        }
    }

    fn th() -> RuleThresholds {
        RuleThresholds::default()
    }

    #[test]
    fn buy_requires_bullish_rsi_and_sharpe() {
        let r = risk(0.25, Some(0.5), -0.10, -0.02);
        let d = decide(&tech(Some(Trend::Bullish), Some(69.99)), &r, &th());
        assert_eq!(d.recommendation, Recommendation::Buy);

        let d = decide(&tech(Some(Trend::Bullish), Some(70.0)), &r, &th());
        assert_eq!(d.recommendation, Recommendation::Hold);

        let weak = risk(0.25, Some(0.49), -0.10, -0.02);
        let d = decide(&tech(Some(Trend::Bullish), Some(50.0)), &weak, &th());
        assert_eq!(d.recommendation, Recommendation::Hold);
    }

    #[test]
    fn sell_requires_bearish_and_deep_current_drawdown() {
        let d = decide(
            &tech(Some(Trend::Bearish), Some(40.0)),
            &risk(0.25, Some(0.1), -0.2, -0.16),
            &th(),
        );
        assert_eq!(d.recommendation, Recommendation::Sell);

        let d = decide(
            &tech(Some(Trend::Bearish), Some(40.0)),
            &risk(0.25, Some(0.1), -0.2, -0.15),
            &th(),
        );
        assert_eq!(d.recommendation, Recommendation::Hold);
    }

    #[test]
    fn neutral_or_missing_trend_holds() {
        let r = risk(0.1, Some(2.0), -0.05, -0.5);
        assert_eq!(
            decide(&tech(Some(Trend::Neutral), Some(50.0)), &r, &th()).recommendation,
            Recommendation::Hold
        );
        assert_eq!(
            decide(&tech(None, None), &r, &th()).recommendation,
            Recommendation::Hold
        );
    }

    #[test]
    fn missing_sharpe_blocks_buy() {
        let d = decide(
            &tech(Some(Trend::Bullish), Some(50.0)),
            &risk(0.0, None, 0.0, 0.0),
            &th(),
        );
        assert_eq!(d.recommendation, Recommendation::Hold);
    }

    #[test]
    fn risk_level_thresholds() {
        let t = tech(Some(Trend::Neutral), Some(50.0));
        assert_eq!(decide(&t, &risk(0.35, Some(1.0), -0.1, 0.0), &th()).risk_level, RiskLevel::High);
        assert_eq!(decide(&t, &risk(0.1, Some(1.0), -0.31, 0.0), &th()).risk_level, RiskLevel::High);
        assert_eq!(decide(&t, &risk(0.19, Some(0.7), -0.1, 0.0), &th()).risk_level, RiskLevel::Low);
        assert_eq!(decide(&t, &risk(0.20, Some(0.7), -0.1, 0.0), &th()).risk_level, RiskLevel::Medium);
        assert_eq!(decide(&t, &risk(0.19, Some(0.69), -0.1, 0.0), &th()).risk_level, RiskLevel::Medium);
        assert_eq!(decide(&t, &RiskMetrics::default(), &th()).risk_level, RiskLevel::Medium);
    }

    #[test]
    fn is_deterministic() {
        let t = tech(Some(Trend::Bullish), Some(55.0));
        let r = risk(0.18, Some(0.9), -0.12, -0.01);
        let first = decide(&t, &r, &th());
        for _ in 0..10 {
            assert_eq!(decide(&t, &r, &th()), first);
        }
        assert_eq!(first.recommendation, Recommendation::Buy);
        assert_eq!(first.risk_level, RiskLevel::Low);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = RuleThresholds {
            buy_rsi_ceiling: 50.0,
            ..RuleThresholds::default()
        };
        let d = decide(
            &tech(Some(Trend::Bullish), Some(55.0)),
            &risk(0.25, Some(1.0), -0.1, 0.0),
            &strict,
        );
        assert_eq!(d.recommendation, Recommendation::Hold);
    }
}
