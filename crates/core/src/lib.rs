pub mod analytics;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod storage;
pub mod synth;
pub mod time;

pub use error::{AnalysisError, AnalysisErrorKind};
pub use pipeline::{AnalysisOptions, Analyzer};

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub fundamentals_provider_base_url: Option<String>,
        pub fundamentals_provider_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                fundamentals_provider_base_url: non_empty_var("FUNDAMENTALS_PROVIDER_BASE_URL"),
                fundamentals_provider_api_key: non_empty_var("FUNDAMENTALS_PROVIDER_API_KEY"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_fundamentals_provider_base_url(&self) -> anyhow::Result<&str> {
            self.fundamentals_provider_base_url
                .as_deref()
                .context("FUNDAMENTALS_PROVIDER_BASE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Reads `key` and parses it, falling back to `default` when unset or malformed.
    pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }
}
