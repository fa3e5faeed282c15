use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buckets::TimeBucketer;
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::matcher::{ExerciseMatcher, MatchPolicy};
use crate::metrics::MetricCalculator;
use crate::models::{ProgressPoint, SportMode, TimeBucket};
use crate::requests::RequestToken;
use crate::store::{fetch_window, SessionQuery, TrainingStore, WindowData};
use crate::views::{CalculationType, ViewRegistry};

/// Parameters of one trend graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRequest {
    pub user_id: String,
    pub sport: SportMode,
    pub view_name: String,
    /// Restrict to exercises matching this name; `None` or blank means all
    pub exercise_query: Option<String>,
    pub window_days: u32,
}

impl TrendRequest {
    pub fn new(user_id: impl Into<String>, sport: SportMode, view_name: impl Into<String>, window_days: u32) -> Self {
        TrendRequest {
            user_id: user_id.into(),
            sport,
            view_name: view_name.into(),
            exercise_query: None,
            window_days,
        }
    }

    pub fn with_exercise(mut self, exercise_query: impl Into<String>) -> Self {
        self.exercise_query = Some(exercise_query.into());
        self
    }

    fn exercise_filter(&self) -> Option<&str> {
        self.exercise_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// One point per bucket plus the axis bounds over the present values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub sport: SportMode,
    pub view_name: String,
    pub calculation: CalculationType,
    pub points: Vec<ProgressPoint>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl TrendResult {
    pub fn has_data(&self) -> bool {
        self.points.iter().any(|p| p.value.is_some())
    }
}

/// Computes per-bucket trend values for a view
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    matcher: ExerciseMatcher,
    bucketer: TimeBucketer,
    policy: MatchPolicy,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        ProgressAggregator {
            matcher: config.matcher(),
            bucketer: config.bucketer(),
            policy: config.matching.trend_policy,
        }
    }

    /// Trend for a window ending today; `Ok(None)` for an unknown view
    pub fn trend(&self, store: &dyn TrainingStore, request: &TrendRequest) -> Result<Option<TrendResult>> {
        self.trend_on(store, request, TimeBucketer::today(), &RequestToken::detached())
    }

    /// Trend for a window ending on `today`, abandoned once `token` is stale
    pub fn trend_on(
        &self,
        store: &dyn TrainingStore,
        request: &TrendRequest,
        today: NaiveDate,
        token: &RequestToken,
    ) -> Result<Option<TrendResult>> {
        let Some(view) = ViewRegistry::view_config(request.sport, &request.view_name) else {
            info!(
                sport = %request.sport,
                view = %request.view_name,
                "unknown view requested"
            );
            return Ok(None);
        };

        let buckets = self.bucketer.buckets_ending(today, request.window_days);
        let query = SessionQuery::window(
            request.user_id.clone(),
            request.sport,
            buckets[0].start,
            today,
        );
        let exercise = request.exercise_filter();

        let data = fetch_window(
            store,
            &query,
            view.exercise_type,
            |occurrence| {
                exercise.map_or(true, |q| {
                    self.matcher.matches_with(&occurrence.name, q, self.policy)
                })
            },
            token,
        )?;
        token.ensure_current()?;

        let (points, min_value, max_value) = trend_points(view.calculation, &buckets, &data);

        debug!(
            sport = %request.sport,
            view = view.name,
            exercise = ?exercise,
            buckets = buckets.len(),
            occurrences = data.occurrences.len(),
            "trend computed"
        );

        Ok(Some(TrendResult {
            sport: request.sport,
            view_name: view.name.to_string(),
            calculation: view.calculation,
            points,
            min_value,
            max_value,
        }))
    }
}

/// Per-bucket values and their min/max; all points are missing for empty data
pub fn trend_points(
    calculation: CalculationType,
    buckets: &[TimeBucket],
    data: &WindowData,
) -> (Vec<ProgressPoint>, Option<f64>, Option<f64>) {
    let points: Vec<ProgressPoint> = buckets
        .iter()
        .map(|bucket| {
            let value = if data.is_empty() {
                None
            } else {
                MetricCalculator::calculate_bucket(calculation, bucket, &data.occurrences, &data.sets)
            };
            ProgressPoint {
                bucket_index: bucket.index,
                value,
                start: bucket.start,
                end: bucket.end,
            }
        })
        .collect();

    let present = points.iter().filter_map(|p| p.value);
    let (min_value, max_value) = present.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), v| {
        (
            Some(lo.map_or(v, |lo: f64| lo.min(v))),
            Some(hi.map_or(v, |hi: f64| hi.max(v))),
        )
    });

    (points, min_value, max_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalyticsError, StoreError};
    use crate::models::{ExerciseOccurrence, ExerciseType, Session, SetRecord};
    use crate::requests::RequestTracker;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn reps(n: f64) -> SetRecord {
        SetRecord {
            reps: Some(n),
            ..Default::default()
        }
    }

    fn drill_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for (days_ago, name, count) in [
            (0, "Ladder Drill", 10.0),
            (1, "Ladder Drill", 5.0),
            (3, "Cone Weave", 8.0),
            (40, "Ladder Drill", 99.0),
        ] {
            let session = store.add_session("u1", SportMode::Basketball, today() - Duration::days(days_ago));
            let occ = store.add_occurrence(&session, name, ExerciseType::Drill);
            store.add_set(&occ, reps(count));
        }
        store
    }

    #[test]
    fn test_trend_buckets_values_by_date() {
        let store = drill_store();
        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", 7);
        let result = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();

        assert_eq!(result.points.len(), 8);
        assert_eq!(result.calculation, CalculationType::Drill);
        // index 0 is the oldest day, the last index is today
        assert_eq!(result.points[7].value, Some(10.0));
        assert_eq!(result.points[6].value, Some(5.0));
        assert_eq!(result.points[4].value, Some(8.0));
        assert_eq!(result.points[0].value, None);
        assert_eq!(result.min_value, Some(5.0));
        assert_eq!(result.max_value, Some(10.0));
    }

    #[test]
    fn test_trend_filters_by_exercise_query() {
        let store = drill_store();
        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", 7).with_exercise("ladder");
        let result = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();

        assert_eq!(result.points[4].value, None);
        assert_eq!(result.points[7].value, Some(10.0));
        assert_eq!(result.min_value, Some(5.0));
    }

    #[test]
    fn test_strict_trend_policy_rejects_partial_names() {
        let mut config = AnalyticsConfig::default();
        config.matching.trend_policy = MatchPolicy::Strict;
        let store = drill_store();
        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", 7).with_exercise("ladder");

        let result = ProgressAggregator::from_config(&config)
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();
        assert!(!result.has_data());
    }

    #[test]
    fn test_unknown_view_is_none() {
        let store = drill_store();
        let aggregator = ProgressAggregator::new();
        let token = RequestToken::detached();

        let request = TrendRequest::new("u1", SportMode::Basketball, "Rally", 7);
        assert!(aggregator.trend_on(&store, &request, today(), &token).unwrap().is_none());

        let request = TrendRequest::new("u1", SportMode::Running, "Drills", 7);
        assert!(aggregator.trend_on(&store, &request, today(), &token).unwrap().is_none());
    }

    #[test]
    fn test_unbounded_window_covers_all_history() {
        let store = drill_store();
        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", u32::MAX);
        let result = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();

        assert_eq!(result.points.len(), 9);
        assert_eq!(result.points[0].start, NaiveDate::MIN);
        assert_eq!(result.points[8].end, today());
        assert!(result.points[8].value.is_some());
        assert!(result.points[..8].iter().all(|p| p.value.is_none()));
    }

    #[test]
    fn test_no_data_gives_all_missing_points() {
        let store = InMemoryStore::new();
        let request = TrendRequest::new("u1", SportMode::Lifting, "Tonnage", 30);
        let result = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();

        assert_eq!(result.points.len(), 5);
        assert!(result.points.iter().all(|p| p.value.is_none()));
        assert_eq!(result.min_value, None);
        assert_eq!(result.max_value, None);
    }

    #[test]
    fn test_blank_exercise_query_means_all() {
        let store = drill_store();
        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", 7).with_exercise("   ");
        let result = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &RequestToken::detached())
            .unwrap()
            .unwrap();
        assert_eq!(result.points[4].value, Some(8.0));
    }

    struct FailingStore;

    impl TrainingStore for FailingStore {
        fn list_sessions(&self, _query: &SessionQuery) -> std::result::Result<Vec<Session>, StoreError> {
            Err(StoreError::Unavailable {
                reason: "offline".to_string(),
            })
        }

        fn list_occurrences(
            &self,
            _session_ids: &[String],
            _exercise_type: ExerciseType,
        ) -> std::result::Result<Vec<ExerciseOccurrence>, StoreError> {
            Ok(Vec::new())
        }

        fn list_sets(&self, _occurrence_ids: &[String]) -> std::result::Result<Vec<SetRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_store_errors_propagate() {
        let request = TrendRequest::new("u1", SportMode::Lifting, "Tonnage", 30);
        let err = ProgressAggregator::new()
            .trend_on(&FailingStore, &request, today(), &RequestToken::detached())
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Store(StoreError::Unavailable { .. })));
    }

    #[test]
    fn test_superseded_request_is_abandoned() {
        let store = drill_store();
        let tracker = RequestTracker::new();
        let stale = tracker.begin();
        tracker.begin();

        let request = TrendRequest::new("u1", SportMode::Basketball, "Drills", 7);
        let err = ProgressAggregator::new()
            .trend_on(&store, &request, today(), &stale)
            .unwrap_err();
        assert!(err.is_superseded());
    }
}
