use crate::domain::recommendation::{Recommendation, RecommendationPackage, RiskLevel};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

pub const MAX_KEY_DRIVERS: usize = 8;

/// Shape a model is asked to emit. Kept stringly-typed so that a response
/// with an out-of-vocabulary value fails validation with a readable message
/// instead of a serde error deep in the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRecommendationPackage {
    pub recommendation: String,
    pub risk_level: String,
    pub reasoning: String,
    pub key_drivers: Vec<String>,
}

impl LlmRecommendationPackage {
    pub fn validate_and_into_package(self) -> anyhow::Result<RecommendationPackage> {
        let recommendation = self
            .recommendation
            .parse::<Recommendation>()
            .context("LLM output has an invalid recommendation")?;
        let risk_level = self
            .risk_level
            .parse::<RiskLevel>()
            .context("LLM output has an invalid risk_level")?;

        let reasoning = self.reasoning.trim().to_string();
        ensure!(!reasoning.is_empty(), "reasoning must be non-empty");

        ensure!(
            (1..=MAX_KEY_DRIVERS).contains(&self.key_drivers.len()),
            "key_drivers must have 1..={MAX_KEY_DRIVERS} entries (got {})",
            self.key_drivers.len()
        );
        let key_drivers: Vec<String> = self
            .key_drivers
            .into_iter()
            .map(|d| d.trim().to_string())
            .collect();
        ensure!(
            key_drivers.iter().all(|d| !d.is_empty()),
            "key_drivers entries must be non-empty"
        );

        Ok(RecommendationPackage {
            recommendation,
            risk_level,
            reasoning,
            key_drivers,
            llm_used: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(recommendation: &str, risk_level: &str, drivers: Vec<&str>) -> LlmRecommendationPackage {
        LlmRecommendationPackage {
            recommendation: recommendation.to_string(),
            risk_level: risk_level.to_string(),
            reasoning: "  Strong momentum with contained drawdown.  ".to_string(),
            key_drivers: drivers.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn accepts_well_formed_output() {
        let pkg = raw("buy", "Moderate", vec![" RSI of 61 ", "Sharpe 1.1"])
            .validate_and_into_package()
            .unwrap();
        assert_eq!(pkg.recommendation, Recommendation::Buy);
        assert_eq!(pkg.risk_level, RiskLevel::Medium);
        assert_eq!(pkg.reasoning, "Strong momentum with contained drawdown.");
        assert_eq!(pkg.key_drivers, vec!["RSI of 61", "Sharpe 1.1"]);
        assert!(pkg.llm_used);
    }

    #[test]
    fn rejects_unknown_recommendation() {
        assert!(raw("ACCUMULATE", "Low", vec!["x"])
            .validate_and_into_package()
            .is_err());
    }

    #[test]
    fn rejects_empty_or_blank_drivers() {
        assert!(raw("HOLD", "Low", vec![]).validate_and_into_package().is_err());
        assert!(raw("HOLD", "Low", vec!["ok", "  "])
            .validate_and_into_package()
            .is_err());
    }

    #[test]
    fn rejects_blank_reasoning() {
        let mut r = raw("HOLD", "High", vec!["x"]);
        r.reasoning = "   ".to_string();
        assert!(r.validate_and_into_package().is_err());
    }
}
