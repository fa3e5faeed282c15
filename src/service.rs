//! Async facade over the analytics pipelines
//!
//! Each query runs on tokio's blocking pool. Generations are tracked per
//! logical query, the query kind plus user and sport: a new trend for a user
//! supersedes that user's trend still in flight, but not another user's
//! trend or a running comparison.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::buckets::TimeBucketer;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, ErrorSeverity, Result};
use crate::models::{PersonalRecord, SportMode};
use crate::progress::{ProgressAggregator, TrendRequest, TrendResult};
use crate::records::RecordExtractor;
use crate::requests::{RequestToken, RequestTracker};
use crate::skill_map::{CompareRequest, SkillMapNormalizer, SkillMapResult};
use crate::store::{ExerciseClassifier, TrainingStore};
use crate::views::{View, ViewRegistry};

/// Entry point for calling layers
pub struct AnalyticsService {
    store: Arc<dyn TrainingStore>,
    classifier: Arc<dyn ExerciseClassifier>,
    config: AnalyticsConfig,
    today: Option<NaiveDate>,
    requests: Mutex<HashMap<QueryKey, RequestTracker>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum QueryKind {
    Trend,
    Compare,
    Records,
}

/// Requests sharing a key supersede each other
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    kind: QueryKind,
    user_id: String,
    sport: SportMode,
}

impl AnalyticsService {
    pub fn new(
        store: Arc<dyn TrainingStore>,
        classifier: Arc<dyn ExerciseClassifier>,
        config: AnalyticsConfig,
    ) -> Self {
        AnalyticsService {
            store,
            classifier,
            config,
            today: None,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Service over a store that also classifies exercise names
    pub fn with_store<S>(store: S, config: AnalyticsConfig) -> Self
    where
        S: TrainingStore + ExerciseClassifier + 'static,
    {
        let store = Arc::new(store);
        let classifier: Arc<dyn ExerciseClassifier> = store.clone();
        Self::new(store, classifier, config)
    }

    /// Evaluate every window as if today were `today`
    pub fn pinned_to(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(TimeBucketer::today)
    }

    fn begin(&self, kind: QueryKind, user_id: &str, sport: SportMode) -> RequestToken {
        let key = QueryKey {
            kind,
            user_id: user_id.to_string(),
            sport,
        };
        let mut trackers = self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        trackers.entry(key).or_default().begin()
    }

    /// Views offered for a sport, in display order
    pub fn views_for(&self, sport: SportMode) -> Vec<View> {
        ViewRegistry::views_for(sport)
    }

    /// Trend graph; superseded by the next `trend` for the same user and sport
    pub async fn trend(&self, request: TrendRequest) -> Result<Option<TrendResult>> {
        let token = self.begin(QueryKind::Trend, &request.user_id, request.sport);
        let aggregator = ProgressAggregator::from_config(&self.config);
        let store = Arc::clone(&self.store);
        let today = self.today();

        let worker_token = token.clone();
        let outcome = run_blocking("trend", move || {
            aggregator.trend_on(store.as_ref(), &request, today, &worker_token)
        })
        .await;
        finish("trend", &token, outcome)
    }

    /// Skill map; superseded by the next `compare` for the same user and sport
    pub async fn compare(&self, request: CompareRequest) -> Result<Option<SkillMapResult>> {
        let token = self.begin(QueryKind::Compare, &request.user_id, request.sport);
        let normalizer = SkillMapNormalizer::from_config(&self.config);
        let store = Arc::clone(&self.store);
        let today = self.today();

        let worker_token = token.clone();
        let outcome = run_blocking("compare", move || {
            normalizer.compare_on(store.as_ref(), &request, today, &worker_token)
        })
        .await;
        finish("compare", &token, outcome)
    }

    /// Personal records; superseded by the next `best_ever` for the same user and sport
    pub async fn best_ever(
        &self,
        user_id: &str,
        exercise_name: &str,
        sport: SportMode,
    ) -> Result<Option<PersonalRecord>> {
        let token = self.begin(QueryKind::Records, user_id, sport);
        let extractor = RecordExtractor::from_config(&self.config);
        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);
        let user_id = user_id.to_string();
        let exercise_name = exercise_name.to_string();

        let worker_token = token.clone();
        let outcome = run_blocking("records", move || {
            extractor.best_ever(
                store.as_ref(),
                classifier.as_ref(),
                &user_id,
                &exercise_name,
                sport,
                &worker_token,
            )
        })
        .await;
        finish("records", &token, outcome)
    }

    /// Supersede every in-flight request
    pub fn cancel_all(&self) {
        let trackers = self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for tracker in trackers.values() {
            tracker.cancel_all();
        }
    }
}

async fn run_blocking<T, F>(operation: &'static str, job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AnalyticsError::Worker(format!("{} task failed: {}", operation, e)))?
}

/// A completion only counts while its request is still the latest one
fn finish<T>(operation: &'static str, token: &RequestToken, outcome: Result<T>) -> Result<T> {
    let outcome = match outcome {
        Ok(_) if !token.is_current() => Err(AnalyticsError::Superseded {
            generation: token.generation(),
        }),
        other => other,
    };

    if let Err(err) = &outcome {
        match err.severity() {
            ErrorSeverity::Info => debug!(operation, error = %err, "request dropped"),
            ErrorSeverity::Warning => warn!(operation, error = %err, "request failed"),
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                error!(operation, error = %err, retryable = err.is_retryable(), "request failed")
            }
        }
    }

    outcome
}
