pub mod anthropic;
pub mod error;
pub mod json;

use crate::domain::{AnalysisContext, RecommendationPackage};

pub use anthropic::AnthropicClient;
pub use error::LlmDiagnosticsError;

/// An AI collaborator that turns computed metrics into a recommendation.
///
/// Implementations return a validated package or an error; they never
/// decide on fallback themselves.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn generate_recommendation(
        &self,
        ctx: &AnalysisContext,
    ) -> anyhow::Result<RecommendationPackage>;
}
