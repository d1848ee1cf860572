use crate::domain::contract::LlmRecommendationPackage;
use crate::domain::RecommendationPackage;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_package(text: &str) -> anyhow::Result<RecommendationPackage> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmRecommendationPackage>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for recommendation schema: {json_str}"))?;
    parsed.validate_and_into_package()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Recommendation, RiskLevel};
    use serde_json::json;

    fn valid_json() -> String {
        json!({
            "recommendation": "BUY",
            "risk_level": "Low",
            "reasoning": "Uptrend with RSI at 55 and Sharpe of 1.1.",
            "key_drivers": ["Bullish MACD crossover", "Sharpe ratio 1.10"],
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Here is my answer: {\"a\":1} hope it helps";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no braces here"), None);
    }

    #[test]
    fn parse_package_accepts_valid_json() {
        let pkg = parse_package(&valid_json()).unwrap();
        assert_eq!(pkg.recommendation, Recommendation::Buy);
        assert_eq!(pkg.risk_level, RiskLevel::Low);
        assert_eq!(pkg.key_drivers.len(), 2);
        assert!(pkg.llm_used);
    }

    #[test]
    fn parse_package_accepts_prose_wrapped_json() {
        let text = format!("Sure.\n```json\n{}\n```", valid_json());
        assert!(parse_package(&text).is_ok());
    }

    #[test]
    fn parse_package_rejects_missing_fields() {
        let json = json!({ "recommendation": "HOLD", "risk_level": "Medium" }).to_string();
        assert!(parse_package(&json).is_err());
    }

    #[test]
    fn parse_package_rejects_out_of_vocabulary_values() {
        let json = json!({
            "recommendation": "STRONG BUY",
            "risk_level": "Low",
            "reasoning": "x",
            "key_drivers": ["y"],
        })
        .to_string();
        assert!(parse_package(&json).is_err());
    }
}
