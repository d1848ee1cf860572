//! Recommendation synthesis.
//!
//! `Synthesizer::synthesize` attempts the AI collaborator (if one is
//! configured) under a hard timeout and otherwise applies the offline rule
//! set. Both branches yield the same [`RecommendationPackage`] shape; the
//! branch taken is visible through [`Synthesis`] and `llm_used`.

pub mod render;
pub mod rules;
pub mod thresholds;

pub use render::{fallback_package, insufficient_data_package};
pub use rules::{decide, Decision};
pub use thresholds::RuleThresholds;

use crate::domain::{AnalysisContext, RecommendationPackage};
use crate::llm::{LlmClient, LlmDiagnosticsError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    NoCollaborator,
    InsufficientData,
    Timeout,
    CollaboratorFailed {
        detail: String,
        /// Provider output that could not be used, when the client kept it.
        raw_output: Option<String>,
    },
}

impl FallbackCause {
    fn failed(detail: impl Into<String>) -> Self {
        FallbackCause::CollaboratorFailed {
            detail: detail.into(),
            raw_output: None,
        }
    }
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::NoCollaborator => f.write_str("no AI collaborator configured"),
            FallbackCause::InsufficientData => f.write_str("no indicator or risk data"),
            FallbackCause::Timeout => f.write_str("AI collaborator timed out"),
            FallbackCause::CollaboratorFailed { detail, .. } => {
                write!(f, "AI collaborator failed: {detail}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    Llm {
        package: RecommendationPackage,
        provider: &'static str,
    },
    Fallback {
        package: RecommendationPackage,
        cause: FallbackCause,
    },
}

impl Synthesis {
    pub fn package(&self) -> &RecommendationPackage {
        match self {
            Synthesis::Llm { package, .. } | Synthesis::Fallback { package, .. } => package,
        }
    }

    pub fn into_package(self) -> RecommendationPackage {
        match self {
            Synthesis::Llm { package, .. } | Synthesis::Fallback { package, .. } => package,
        }
    }

    pub fn llm_used(&self) -> bool {
        matches!(self, Synthesis::Llm { .. })
    }

    pub fn fallback_cause(&self) -> Option<&FallbackCause> {
        match self {
            Synthesis::Fallback { cause, .. } => Some(cause),
            Synthesis::Llm { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct Synthesizer {
    llm: Option<Arc<dyn LlmClient>>,
    thresholds: RuleThresholds,
    timeout: Duration,
}

impl Synthesizer {
    pub fn offline(thresholds: RuleThresholds) -> Self {
        Self {
            llm: None,
            thresholds,
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmClient>, thresholds: RuleThresholds, timeout: Duration) -> Self {
        Self {
            llm: Some(llm),
            thresholds,
            timeout,
        }
    }

    pub async fn synthesize(&self, ctx: &AnalysisContext) -> Synthesis {
        if ctx.technicals.is_unavailable() && ctx.risk.is_unavailable() {
            tracing::info!(ticker = %ctx.ticker, "no indicator or risk data; skipping AI collaborator");
            return Synthesis::Fallback {
                package: insufficient_data_package(),
                cause: FallbackCause::InsufficientData,
            };
        }

        let Some(llm) = self.llm.as_ref() else {
            tracing::info!(ticker = %ctx.ticker, "no AI collaborator configured; using offline rules");
            return self.fallback(ctx, FallbackCause::NoCollaborator);
        };

        let provider = llm.provider_name();
        match tokio::time::timeout(self.timeout, llm.generate_recommendation(ctx)).await {
            Ok(Ok(package)) => {
                if package.reasoning.trim().is_empty() || package.key_drivers.is_empty() {
                    tracing::warn!(ticker = %ctx.ticker, provider, "AI collaborator returned an incomplete package");
                    return self.fallback(ctx, FallbackCause::failed("incomplete recommendation package"));
                }
                tracing::info!(ticker = %ctx.ticker, provider, "recommendation generated by AI collaborator");
                Synthesis::Llm {
                    package: RecommendationPackage {
                        llm_used: true,
                        ..package
                    },
                    provider,
                }
            }
            Ok(Err(err)) => {
                let raw_output = match err.downcast_ref::<LlmDiagnosticsError>() {
                    Some(diag) => {
                        tracing::warn!(
                            ticker = %ctx.ticker,
                            provider,
                            stage = diag.stage,
                            error = %diag,
                            raw_output = diag.raw_output.as_deref().unwrap_or(""),
                            "AI collaborator failed; using offline rules"
                        );
                        diag.raw_output.clone()
                    }
                    None => {
                        tracing::warn!(ticker = %ctx.ticker, provider, error = %err, "AI collaborator failed; using offline rules");
                        None
                    }
                };
                self.fallback(
                    ctx,
                    FallbackCause::CollaboratorFailed {
                        detail: format!("{err:#}"),
                        raw_output,
                    },
                )
            }
            Err(_) => {
                tracing::warn!(
                    ticker = %ctx.ticker,
                    provider,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "AI collaborator timed out; using offline rules"
                );
                self.fallback(ctx, FallbackCause::Timeout)
            }
        }
    }

    fn fallback(&self, ctx: &AnalysisContext, cause: FallbackCause) -> Synthesis {
        Synthesis::Fallback {
            package: fallback_package(&ctx.technicals, &ctx.risk, &self.thresholds),
            cause,
        }
    }
}
