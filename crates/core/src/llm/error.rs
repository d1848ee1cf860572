use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: &'static str, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
