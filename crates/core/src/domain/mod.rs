pub mod contract;
pub mod metrics;
pub mod recommendation;
pub mod report;
pub mod series;

pub use metrics::{FundamentalMetrics, RiskMetrics, TechnicalIndicators, Trend};
pub use recommendation::{Recommendation, RecommendationPackage, RiskLevel};
pub use report::{AnalysisContext, AnalysisResult, DataRange};
pub use series::{PriceBar, PriceSeries};
