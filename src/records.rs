//! Personal records
//!
//! All-time bests for one exercise. The exercise type comes from the
//! classifier; the type (and for some types the sport) decides which
//! metrics are tracked.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::matcher::{ExerciseMatcher, MatchPolicy};
use crate::metrics::{
    completion_percentage, group_sets, positive, set_load, set_speed, shooting_percentage, usable,
};
use crate::models::{
    ExerciseOccurrence, ExerciseType, PersonalRecord, RecordMetric, RecordValue, SetRecord, SportMode,
};
use crate::requests::RequestToken;
use crate::store::{fetch_window, ExerciseClassifier, SessionQuery, TrainingStore};

use crate::models::RecordMetric as M;

const EXERCISE_METRICS: &[RecordMetric] = &[M::RepsXWeight, M::Reps, M::Weight];
const BASKETBALL_SHOOTING_METRICS: &[RecordMetric] = &[M::Percentage, M::Attempted, M::Made];
const SHOOTING_METRICS: &[RecordMetric] = &[M::Distance, M::Reps];
const FOOTBALL_DRILL_METRICS: &[RecordMetric] = &[M::Reps, M::Completion, M::RepsPerMinute];
const DRILL_METRICS: &[RecordMetric] = &[M::Reps, M::Time, M::RepsPerMinute];
const SPRINT_METRICS: &[RecordMetric] = &[M::Distance, M::Speed, M::Reps];
const HITTING_METRICS: &[RecordMetric] = &[M::Reps, M::AvgDistance];
const FIELDING_METRICS: &[RecordMetric] = &[M::RepsXDistance, M::Reps, M::Distance];
const RALLY_METRICS: &[RecordMetric] = &[M::Points, M::Time];

/// Metrics tracked for an exercise type within a sport
pub fn metrics_for(sport: SportMode, exercise_type: ExerciseType) -> &'static [RecordMetric] {
    match (exercise_type, sport) {
        (ExerciseType::Exercise, _) => EXERCISE_METRICS,
        (ExerciseType::Shooting, SportMode::Basketball) => BASKETBALL_SHOOTING_METRICS,
        (ExerciseType::Shooting, _) => SHOOTING_METRICS,
        (ExerciseType::Drill, SportMode::Football) => FOOTBALL_DRILL_METRICS,
        (ExerciseType::Drill, _) => DRILL_METRICS,
        (ExerciseType::Sprints, _) => SPRINT_METRICS,
        (ExerciseType::Hitting, _) => HITTING_METRICS,
        (ExerciseType::Fielding, _) => FIELDING_METRICS,
        (ExerciseType::Rally, _) => RALLY_METRICS,
    }
}

/// Value of a per-set metric for one set
fn set_metric(metric: RecordMetric, set: &SetRecord) -> Option<f64> {
    match metric {
        M::RepsXWeight => set_load(set),
        M::Reps => usable(set.reps),
        M::Weight => positive(set.weight),
        M::Percentage => shooting_percentage(set),
        M::Attempted => usable(set.attempted),
        M::Made => usable(set.made),
        M::Distance => usable(set.distance),
        M::Completion => completion_percentage(set),
        M::RepsPerMinute => {
            let minutes = positive(set.time_minutes)?;
            usable(Some(usable(set.reps)? / minutes))
        }
        M::Time => positive(set.time_minutes),
        M::Speed => set_speed(set),
        M::RepsXDistance => usable(Some(usable(set.reps)? * usable(set.distance)?)),
        M::Points => positive(set.points),
        M::AvgDistance => None,
    }
}

/// Mean distance over one occurrence's sets
fn occurrence_avg_distance(sets: &[&SetRecord]) -> Option<f64> {
    let distances: Vec<f64> = sets.iter().filter_map(|set| usable(set.distance)).collect();
    if distances.is_empty() {
        return None;
    }
    usable(Some(distances.iter().sum::<f64>() / distances.len() as f64))
}

/// Keep the larger value; equal values keep the later date
fn offer(bests: &mut BTreeMap<RecordMetric, RecordValue>, metric: RecordMetric, value: f64, achieved_on: NaiveDate) {
    let candidate = RecordValue { value, achieved_on };
    match bests.get(&metric) {
        Some(current)
            if current.value > value || (current.value == value && current.achieved_on >= achieved_on) => {}
        _ => {
            bests.insert(metric, candidate);
        }
    }
}

/// Best value and its date for each applicable metric that was observed
pub fn extract_bests(
    sport: SportMode,
    exercise_type: ExerciseType,
    occurrences: &[ExerciseOccurrence],
    sets: &[SetRecord],
) -> BTreeMap<RecordMetric, RecordValue> {
    let metrics = metrics_for(sport, exercise_type);
    let refs: Vec<&ExerciseOccurrence> = occurrences
        .iter()
        .filter(|occurrence| occurrence.exercise_type == exercise_type)
        .collect();

    let mut bests = BTreeMap::new();
    for group in group_sets(&refs, sets) {
        let achieved_on = group.occurrence.performed_on;
        for &metric in metrics {
            if metric == M::AvgDistance {
                if let Some(value) = occurrence_avg_distance(&group.sets) {
                    offer(&mut bests, metric, value, achieved_on);
                }
                continue;
            }
            for set in &group.sets {
                if let Some(value) = set_metric(metric, set) {
                    offer(&mut bests, metric, value, achieved_on);
                }
            }
        }
    }
    bests
}

/// Finds all-time bests for an exercise
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    matcher: ExerciseMatcher,
    policy: MatchPolicy,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordExtractor {
    pub fn new() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        RecordExtractor {
            matcher: config.matcher(),
            policy: config.matching.comparison_policy,
        }
    }

    /// All-time bests for `exercise_name`
    ///
    /// `Ok(None)` when the classifier does not know the exercise or nothing
    /// measurable was ever logged for it.
    pub fn best_ever(
        &self,
        store: &dyn TrainingStore,
        classifier: &dyn ExerciseClassifier,
        user_id: &str,
        exercise_name: &str,
        sport: SportMode,
        token: &RequestToken,
    ) -> Result<Option<PersonalRecord>> {
        let exercise_name = exercise_name.trim();
        if exercise_name.is_empty() {
            return Ok(None);
        }

        token.ensure_current()?;
        let Some(exercise_type) = classifier.primary_exercise_type(sport, exercise_name) else {
            info!(sport = %sport, exercise = exercise_name, "exercise type not classified");
            return Ok(None);
        };

        let query = SessionQuery::all_history(user_id, sport);
        let data = fetch_window(
            store,
            &query,
            exercise_type,
            |occurrence| self.matcher.matches_with(&occurrence.name, exercise_name, self.policy),
            token,
        )?;
        token.ensure_current()?;

        if data.is_empty() {
            debug!(sport = %sport, exercise = exercise_name, "no history for exercise");
            return Ok(None);
        }

        let bests = extract_bests(sport, exercise_type, &data.occurrences, &data.sets);
        debug!(
            sport = %sport,
            exercise = exercise_name,
            exercise_type = %exercise_type,
            occurrences = data.occurrences.len(),
            metrics = bests.len(),
            "records extracted"
        );

        if bests.is_empty() {
            return Ok(None);
        }

        Ok(Some(PersonalRecord {
            exercise_name: exercise_name.to_string(),
            sport,
            exercise_type,
            bests,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn occurrence(id: &str, exercise_type: ExerciseType, performed_on: NaiveDate) -> ExerciseOccurrence {
        ExerciseOccurrence {
            id: id.to_string(),
            session_id: format!("session-{}", id),
            name: "Exercise".to_string(),
            exercise_type,
            performed_on,
        }
    }

    fn set(occurrence_id: &str, index: u32) -> SetRecord {
        SetRecord::new(format!("{}-{}", occurrence_id, index), occurrence_id, index)
    }

    #[test]
    fn test_metric_map_depends_on_sport() {
        assert_eq!(
            metrics_for(SportMode::Basketball, ExerciseType::Shooting),
            &[M::Percentage, M::Attempted, M::Made]
        );
        assert_eq!(metrics_for(SportMode::Soccer, ExerciseType::Shooting), &[M::Distance, M::Reps]);
        assert!(metrics_for(SportMode::Football, ExerciseType::Drill).contains(&M::Completion));
        assert!(metrics_for(SportMode::Tennis, ExerciseType::Drill).contains(&M::Time));
        assert_eq!(metrics_for(SportMode::Lifting, ExerciseType::Exercise), EXERCISE_METRICS);
    }

    #[test]
    fn test_tie_goes_to_later_date() {
        let occurrences = vec![
            occurrence("a", ExerciseType::Exercise, date(1)),
            occurrence("b", ExerciseType::Exercise, date(9)),
            occurrence("c", ExerciseType::Exercise, date(5)),
        ];
        let sets: Vec<SetRecord> = ["a", "b", "c"]
            .iter()
            .map(|id| SetRecord {
                reps: Some(5.0),
                weight: Some(100.0),
                ..set(id, 0)
            })
            .collect();

        let bests = extract_bests(SportMode::Lifting, ExerciseType::Exercise, &occurrences, &sets);
        let best = bests[&M::RepsXWeight];
        assert_eq!(best.value, 500.0);
        assert_eq!(best.achieved_on, date(9));
    }

    #[test]
    fn test_inapplicable_metrics_stay_unset() {
        let occurrences = vec![occurrence("a", ExerciseType::Exercise, date(1))];
        let sets = vec![SetRecord {
            reps: Some(8.0),
            weight: Some(60.0),
            distance: Some(40.0),
            ..set("a", 0)
        }];

        let bests = extract_bests(SportMode::Lifting, ExerciseType::Exercise, &occurrences, &sets);
        assert_eq!(bests.len(), 3);
        assert!(!bests.contains_key(&M::Distance));
        assert_eq!(bests[&M::Weight].value, 60.0);
        assert_eq!(bests[&M::RepsXWeight].value, 480.0);
    }

    #[test]
    fn test_unobserved_metric_is_absent_not_zero() {
        let occurrences = vec![occurrence("a", ExerciseType::Exercise, date(1))];
        let sets = vec![SetRecord {
            reps: Some(12.0),
            ..set("a", 0)
        }];

        let bests = extract_bests(SportMode::Lifting, ExerciseType::Exercise, &occurrences, &sets);
        assert!(!bests.contains_key(&M::Weight));
        assert_eq!(bests[&M::RepsXWeight].value, 12.0);
    }

    #[test]
    fn test_drill_reps_per_minute_and_time() {
        let occurrences = vec![occurrence("a", ExerciseType::Drill, date(2))];
        let sets = vec![
            SetRecord {
                reps: Some(30.0),
                time_minutes: Some(2.0),
                ..set("a", 0)
            },
            SetRecord {
                reps: Some(20.0),
                time_minutes: Some(0.0),
                ..set("a", 1)
            },
        ];

        let bests = extract_bests(SportMode::Basketball, ExerciseType::Drill, &occurrences, &sets);
        assert_eq!(bests[&M::RepsPerMinute].value, 15.0);
        assert_eq!(bests[&M::Time].value, 2.0);
        assert_eq!(bests[&M::Reps].value, 30.0);
    }

    #[test]
    fn test_hitting_avg_distance_is_per_occurrence() {
        let occurrences = vec![
            occurrence("a", ExerciseType::Hitting, date(1)),
            occurrence("b", ExerciseType::Hitting, date(2)),
        ];
        let sets = vec![
            SetRecord {
                distance: Some(300.0),
                ..set("a", 0)
            },
            SetRecord {
                distance: Some(100.0),
                ..set("a", 1)
            },
            SetRecord {
                distance: Some(250.0),
                ..set("b", 0)
            },
        ];

        let bests = extract_bests(SportMode::Baseball, ExerciseType::Hitting, &occurrences, &sets);
        assert_eq!(bests[&M::AvgDistance].value, 250.0);
        assert_eq!(bests[&M::AvgDistance].achieved_on, date(2));
    }

    #[test]
    fn test_shooting_percentage_is_clamped() {
        let occurrences = vec![occurrence("a", ExerciseType::Shooting, date(1))];
        let sets = vec![SetRecord {
            attempted: Some(4.0),
            made: Some(6.0),
            ..set("a", 0)
        }];

        let bests = extract_bests(SportMode::Basketball, ExerciseType::Shooting, &occurrences, &sets);
        assert_eq!(bests[&M::Percentage].value, 100.0);
        assert_eq!(bests[&M::Made].value, 6.0);
    }

    fn court_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for (day, made) in [(3, 7.0), (8, 9.0), (12, 9.0)] {
            let session = store.add_session("u1", SportMode::Basketball, date(day));
            let occ = store.add_occurrence(&session, "Free Throw", ExerciseType::Shooting);
            store.add_set(
                &occ,
                SetRecord {
                    attempted: Some(10.0),
                    made: Some(made),
                    ..Default::default()
                },
            );
        }
        let session = store.add_session("u1", SportMode::Basketball, date(20));
        let occ = store.add_occurrence(&session, "Three Pointer", ExerciseType::Shooting);
        store.add_set(
            &occ,
            SetRecord {
                attempted: Some(10.0),
                made: Some(10.0),
                ..Default::default()
            },
        );
        store
    }

    #[test]
    fn test_best_ever_through_store() {
        let store = court_store();
        let record = RecordExtractor::new()
            .best_ever(
                &store,
                &store,
                "u1",
                "free throw",
                SportMode::Basketball,
                &RequestToken::detached(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(record.exercise_type, ExerciseType::Shooting);
        let pct = record.best(M::Percentage).unwrap();
        assert_eq!(pct.value, 90.0);
        assert_eq!(pct.achieved_on, date(12));
        assert!(record.best(M::Distance).is_none());
    }

    #[test]
    fn test_best_ever_unknown_exercise_is_none() {
        let store = court_store();
        let record = RecordExtractor::new()
            .best_ever(
                &store,
                &store,
                "u1",
                "Hook Shot",
                SportMode::Basketball,
                &RequestToken::detached(),
            )
            .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_best_ever_other_user_is_none() {
        let store = court_store();
        let record = RecordExtractor::new()
            .best_ever(
                &store,
                &store,
                "u2",
                "Free Throw",
                SportMode::Basketball,
                &RequestToken::detached(),
            )
            .unwrap();
        assert!(record.is_none());
    }
}
