// Library interface for bpimpact modules
// This allows integration tests and benches to access the core functionality

pub mod analysis;
pub mod categories;
pub mod config;
pub mod correlation;
pub mod error;
pub mod export;
pub mod import;
pub mod interpretation;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod range;
pub mod stats;

// Re-export commonly used types for convenience
pub use models::*;
pub use analysis::{CorrelationResult, ExerciseBpAnalyzer};
pub use categories::{
    categorize, categorize_all, category_distribution, category_trends, BpCategory, BpStatistics,
    CategorizedReading, CategoryDistribution, CategoryTrendBucket, TrendFrequency,
};
pub use config::{AnalysisConfig, AppConfig};
pub use correlation::{CorrelationEngine, ExerciseTypeImpact, ImpactAverages, MetricCorrelation};
pub use interpretation::{CorrelationSummary, Interpreter};
pub use matcher::ImpactMatcher;
pub use range::{data_span, DateRange};
pub use stats::{CorrelationFailure, PearsonResult};
pub use error::{BpImpactError, ImportError, Result};
pub use logging::{LogConfig, LogLevel, LogFormat};
