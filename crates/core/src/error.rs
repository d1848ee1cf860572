use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level failures surfaced to callers of `Analyzer::analyze`.
///
/// Collaborator failures (LLM, fundamentals) never show up here: they are
/// absorbed at the boundary and turned into absent data or the fallback path.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no price history for ticker '{ticker}': {detail}")]
    DataUnavailable { ticker: String, detail: String },

    #[error("insufficient price history: need at least {required} bars, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    InvalidInput,
    DataUnavailable,
    InsufficientHistory,
}

impl AnalysisErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisErrorKind::InvalidInput => "invalid_input",
            AnalysisErrorKind::DataUnavailable => "data_unavailable",
            AnalysisErrorKind::InsufficientHistory => "insufficient_history",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => AnalysisErrorKind::InvalidInput,
            AnalysisError::DataUnavailable { .. } => AnalysisErrorKind::DataUnavailable,
            AnalysisError::InsufficientHistory { .. } => AnalysisErrorKind::InsufficientHistory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_matches_serialized_form() {
        for err in [
            AnalysisError::InvalidInput("x".to_string()),
            AnalysisError::DataUnavailable {
                ticker: "ZZZZ".to_string(),
                detail: "no rows".to_string(),
            },
            AnalysisError::InsufficientHistory {
                required: 50,
                actual: 3,
            },
        ] {
            let kind = err.kind();
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn messages_name_the_problem() {
        let err = AnalysisError::InsufficientHistory {
            required: 50,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "insufficient price history: need at least 50 bars, got 12"
        );
    }
}
