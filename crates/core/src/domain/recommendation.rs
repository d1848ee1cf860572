use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

impl FromStr for Recommendation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Recommendation::Buy),
            "SELL" => Ok(Recommendation::Sell),
            "HOLD" => Ok(Recommendation::Hold),
            other => anyhow::bail!("unknown recommendation: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    /// Accepts the levels a model is asked to emit. "Unknown" is reserved for
    /// the insufficient-data outcome and is rejected here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "moderate" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => anyhow::bail!("unknown risk level: {other:?}"),
        }
    }
}

/// Final decision handed back to the caller, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPackage {
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub reasoning: String,
    pub key_drivers: Vec<String>,
    pub llm_used: bool,
}

impl RecommendationPackage {
    pub fn render_report(&self) -> String {
        let mut out = format!(
            "**Recommendation:** {}\n**Risk Level:** {}\n\n**Reasoning:**\n{}\n\n**Key Drivers:**",
            self.recommendation, self.risk_level, self.reasoning
        );
        for driver in &self.key_drivers {
            out.push_str("\n- ");
            out.push_str(driver);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recommendation_case_insensitively() {
        assert_eq!(" buy ".parse::<Recommendation>().unwrap(), Recommendation::Buy);
        assert_eq!("Sell".parse::<Recommendation>().unwrap(), Recommendation::Sell);
        assert!("STRONG BUY".parse::<Recommendation>().is_err());
    }

    #[test]
    fn moderate_is_an_alias_for_medium() {
        assert_eq!("Moderate".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("Unknown".parse::<RiskLevel>().is_err());
        assert!("Extreme".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn serializes_recommendation_upper_case() {
        let v = serde_json::to_value(Recommendation::Hold).unwrap();
        assert_eq!(v, serde_json::json!("HOLD"));
    }

    #[test]
    fn renders_markdown_report() {
        let pkg = RecommendationPackage {
            recommendation: Recommendation::Buy,
            risk_level: RiskLevel::Low,
            reasoning: "Momentum is strong.".to_string(),
            key_drivers: vec!["Trend signal: Bullish".to_string(), "RSI (14): 55.00".to_string()],
            llm_used: false,
        };
        assert_eq!(
            pkg.render_report(),
            "**Recommendation:** BUY\n**Risk Level:** Low\n\n**Reasoning:**\nMomentum is strong.\n\n\
**Key Drivers:**\n- Trend signal: Bullish\n- RSI (14): 55.00"
        );
    }
}
