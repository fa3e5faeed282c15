// Library interface for sportlens
// The CLI in main.rs and the integration tests both go through here.

pub mod buckets;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod records;
pub mod requests;
pub mod service;
pub mod skill_map;
pub mod store;
pub mod views;

// Re-export commonly used types for convenience
pub use models::*;
pub use buckets::TimeBucketer;
pub use config::AnalyticsConfig;
pub use database::SqliteStore;
pub use error::{AnalyticsError, Result, StoreError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use matcher::{ExerciseMatcher, MatchPolicy};
pub use metrics::MetricCalculator;
pub use progress::{ProgressAggregator, TrendRequest, TrendResult};
pub use records::RecordExtractor;
pub use requests::{RequestToken, RequestTracker, ResultSlot};
pub use service::AnalyticsService;
pub use skill_map::{CompareRequest, SkillMapNormalizer, SkillMapResult};
pub use store::{ExerciseClassifier, InMemoryStore, SessionQuery, TrainingStore};
pub use views::{CalculationType, View, ViewRegistry};
