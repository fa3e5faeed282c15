//! Data store boundary
//!
//! The engine never owns training data. It reads it through `TrainingStore`
//! in three sequential stages (sessions, occurrences of those sessions, sets
//! of those occurrences), stopping as soon as a stage comes back empty.

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::matcher::ExerciseMatcher;
use crate::models::{ExerciseOccurrence, ExerciseType, RawSetRecord, Session, SetRecord, SportMode};
use crate::requests::RequestToken;

/// Session filter; absent bounds mean unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub user_id: String,
    pub sport: SportMode,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SessionQuery {
    pub fn window(user_id: impl Into<String>, sport: SportMode, from: NaiveDate, to: NaiveDate) -> Self {
        SessionQuery {
            user_id: user_id.into(),
            sport,
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn all_history(user_id: impl Into<String>, sport: SportMode) -> Self {
        SessionQuery {
            user_id: user_id.into(),
            sport,
            from: None,
            to: None,
        }
    }

    pub fn includes(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Read contract the backing store must satisfy
///
/// Implementations apply their own timeouts; errors are handed to the caller
/// unchanged.
pub trait TrainingStore: Send + Sync {
    fn list_sessions(&self, query: &SessionQuery) -> std::result::Result<Vec<Session>, StoreError>;

    /// Occurrences of the given sessions with the given type, each carrying
    /// its session's date
    fn list_occurrences(
        &self,
        session_ids: &[String],
        exercise_type: ExerciseType,
    ) -> std::result::Result<Vec<ExerciseOccurrence>, StoreError>;

    fn list_sets(&self, occurrence_ids: &[String]) -> std::result::Result<Vec<SetRecord>, StoreError>;
}

/// Decides which exercise type a typed exercise name most likely refers to
pub trait ExerciseClassifier: Send + Sync {
    fn primary_exercise_type(&self, sport: SportMode, exercise_query: &str) -> Option<ExerciseType>;
}

/// Occurrences and sets fetched for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowData {
    pub occurrences: Vec<ExerciseOccurrence>,
    pub sets: Vec<SetRecord>,
}

impl WindowData {
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Run the sessions -> occurrences -> sets pipeline
///
/// `keep` filters occurrences before their sets are requested. The token is
/// checked before every stage so a superseded request stops querying.
pub fn fetch_window<F>(
    store: &dyn TrainingStore,
    query: &SessionQuery,
    exercise_type: ExerciseType,
    keep: F,
    token: &RequestToken,
) -> Result<WindowData>
where
    F: Fn(&ExerciseOccurrence) -> bool,
{
    token.ensure_current()?;
    let sessions = store.list_sessions(query)?;
    if sessions.is_empty() {
        debug!(sport = %query.sport, "no sessions in range");
        return Ok(WindowData::default());
    }

    token.ensure_current()?;
    let session_ids: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
    let occurrences: Vec<ExerciseOccurrence> = store
        .list_occurrences(&session_ids, exercise_type)?
        .into_iter()
        .filter(|occurrence| occurrence.exercise_type == exercise_type)
        .filter(|occurrence| keep(occurrence))
        .collect();
    if occurrences.is_empty() {
        debug!(
            sessions = sessions.len(),
            exercise_type = %exercise_type,
            "no matching occurrences"
        );
        return Ok(WindowData::default());
    }

    token.ensure_current()?;
    let occurrence_ids: Vec<String> = occurrences.iter().map(|o| o.id.clone()).collect();
    let wanted: HashSet<&str> = occurrence_ids.iter().map(String::as_str).collect();
    let sets: Vec<SetRecord> = store
        .list_sets(&occurrence_ids)?
        .into_iter()
        .filter(|set| wanted.contains(set.occurrence_id.as_str()))
        .collect();

    debug!(
        sessions = sessions.len(),
        occurrences = occurrences.len(),
        sets = sets.len(),
        "window fetched"
    );

    Ok(WindowData { occurrences, sets })
}

/// Pick the exercise type whose historical occurrences match the query most
/// often. Input rows are `(logged name, type, occurrence count)`; ties go to
/// the type declared first in `ExerciseType`.
pub fn classify_by_history<'a, I>(
    rows: I,
    exercise_query: &str,
    matcher: &ExerciseMatcher,
) -> Option<ExerciseType>
where
    I: IntoIterator<Item = (&'a str, ExerciseType, usize)>,
{
    let mut tally: BTreeMap<ExerciseType, usize> = BTreeMap::new();
    for (name, exercise_type, count) in rows {
        if count > 0 && matcher.matches(name, exercise_query) {
            *tally.entry(exercise_type).or_insert(0) += count;
        }
    }

    tally
        .into_iter()
        .fold(None, |best: Option<(ExerciseType, usize)>, (exercise_type, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((exercise_type, count)),
        })
        .map(|(exercise_type, _)| exercise_type)
}

/// Session row as kept by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    pub user_id: String,
    pub sport: SportMode,
    pub performed_on: NaiveDate,
}

/// Occurrence row as kept by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOccurrence {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub exercise_type: ExerciseType,
}

/// JSON fixture layout accepted by `InMemoryStore`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub sessions: Vec<StoredSession>,
    #[serde(default)]
    pub occurrences: Vec<StoredOccurrence>,
    #[serde(default)]
    pub sets: Vec<RawSetRecord>,
}

/// Vector-backed store for tests, fixtures and embedding
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    sessions: Vec<StoredSession>,
    occurrences: Vec<StoredOccurrence>,
    sets: Vec<SetRecord>,
    matcher: ExerciseMatcher,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fixture, normalizing legacy set fields
    pub fn from_fixture(fixture: StoreFixture) -> Self {
        InMemoryStore {
            sessions: fixture.sessions,
            occurrences: fixture.occurrences,
            sets: fixture.sets.into_iter().map(SetRecord::from).collect(),
            matcher: ExerciseMatcher::new(),
        }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_fixture(serde_json::from_str(json)?))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read fixture: {}", path.as_ref().display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.as_ref().display()))
    }

    /// Matcher used when acting as a classifier
    pub fn with_matcher(mut self, matcher: ExerciseMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn add_session(&mut self, user_id: &str, sport: SportMode, performed_on: NaiveDate) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.push(StoredSession {
            id: id.clone(),
            user_id: user_id.to_string(),
            sport,
            performed_on,
        });
        id
    }

    pub fn add_occurrence(&mut self, session_id: &str, name: &str, exercise_type: ExerciseType) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.occurrences.push(StoredOccurrence {
            id: id.clone(),
            session_id: session_id.to_string(),
            name: name.to_string(),
            exercise_type,
        });
        id
    }

    /// Attach a set to an occurrence; id and index are assigned here
    pub fn add_set(&mut self, occurrence_id: &str, set: SetRecord) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let index = self
            .sets
            .iter()
            .filter(|s| s.occurrence_id == occurrence_id)
            .count() as u32;
        self.sets.push(SetRecord {
            id: id.clone(),
            occurrence_id: occurrence_id.to_string(),
            index,
            ..set
        });
        id
    }

    fn session_dates(&self) -> HashMap<&str, (&StoredSession, NaiveDate)> {
        self.sessions
            .iter()
            .map(|s| (s.id.as_str(), (s, s.performed_on)))
            .collect()
    }
}

impl TrainingStore for InMemoryStore {
    fn list_sessions(&self, query: &SessionQuery) -> std::result::Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.user_id == query.user_id && s.sport == query.sport)
            .filter(|s| query.includes(s.performed_on))
            .map(|s| Session {
                id: s.id.clone(),
                performed_on: s.performed_on,
            })
            .collect();
        sessions.sort_by(|a, b| a.performed_on.cmp(&b.performed_on));
        Ok(sessions)
    }

    fn list_occurrences(
        &self,
        session_ids: &[String],
        exercise_type: ExerciseType,
    ) -> std::result::Result<Vec<ExerciseOccurrence>, StoreError> {
        let wanted: HashSet<&str> = session_ids.iter().map(String::as_str).collect();
        let sessions = self.session_dates();

        Ok(self
            .occurrences
            .iter()
            .filter(|o| o.exercise_type == exercise_type && wanted.contains(o.session_id.as_str()))
            .filter_map(|o| {
                let (_, performed_on) = sessions.get(o.session_id.as_str())?;
                Some(ExerciseOccurrence {
                    id: o.id.clone(),
                    session_id: o.session_id.clone(),
                    name: o.name.clone(),
                    exercise_type: o.exercise_type,
                    performed_on: *performed_on,
                })
            })
            .collect())
    }

    fn list_sets(&self, occurrence_ids: &[String]) -> std::result::Result<Vec<SetRecord>, StoreError> {
        let wanted: HashSet<&str> = occurrence_ids.iter().map(String::as_str).collect();
        Ok(self
            .sets
            .iter()
            .filter(|s| wanted.contains(s.occurrence_id.as_str()))
            .cloned()
            .collect())
    }
}

impl ExerciseClassifier for InMemoryStore {
    fn primary_exercise_type(&self, sport: SportMode, exercise_query: &str) -> Option<ExerciseType> {
        let sessions = self.session_dates();
        let rows = self.occurrences.iter().filter_map(|o| {
            let (session, _) = sessions.get(o.session_id.as_str())?;
            (session.sport == sport).then_some((o.name.as_str(), o.exercise_type, 1))
        });
        classify_by_history(rows, exercise_query, &self.matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::requests::RequestTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    /// Counts calls per stage so short-circuiting can be observed
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryStore,
        occurrence_calls: AtomicUsize,
        set_calls: AtomicUsize,
    }

    impl TrainingStore for CountingStore {
        fn list_sessions(&self, query: &SessionQuery) -> std::result::Result<Vec<Session>, StoreError> {
            self.inner.list_sessions(query)
        }

        fn list_occurrences(
            &self,
            session_ids: &[String],
            exercise_type: ExerciseType,
        ) -> std::result::Result<Vec<ExerciseOccurrence>, StoreError> {
            self.occurrence_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_occurrences(session_ids, exercise_type)
        }

        fn list_sets(&self, occurrence_ids: &[String]) -> std::result::Result<Vec<SetRecord>, StoreError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_sets(occurrence_ids)
        }
    }

    fn sample_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let s1 = store.add_session("u1", SportMode::Lifting, date(1));
        let s2 = store.add_session("u1", SportMode::Lifting, date(10));
        store.add_session("u2", SportMode::Lifting, date(10));

        let bench = store.add_occurrence(&s1, "Bench Press", ExerciseType::Exercise);
        store.add_set(
            &bench,
            SetRecord {
                reps: Some(5.0),
                weight: Some(100.0),
                ..Default::default()
            },
        );
        let squat = store.add_occurrence(&s2, "Back Squat", ExerciseType::Exercise);
        store.add_set(
            &squat,
            SetRecord {
                reps: Some(3.0),
                weight: Some(140.0),
                ..Default::default()
            },
        );
        store
    }

    #[test]
    fn test_fetch_window_returns_matching_data() {
        let store = sample_store();
        let query = SessionQuery::window("u1", SportMode::Lifting, date(1), date(30));
        let matcher = ExerciseMatcher::new();

        let data = fetch_window(
            &store,
            &query,
            ExerciseType::Exercise,
            |o| matcher.matches(&o.name, "bench press"),
            &RequestToken::detached(),
        )
        .unwrap();

        assert_eq!(data.occurrences.len(), 1);
        assert_eq!(data.occurrences[0].performed_on, date(1));
        assert_eq!(data.sets.len(), 1);
        assert_eq!(data.sets[0].reps, Some(5.0));
    }

    #[test]
    fn test_fetch_window_short_circuits_on_empty_stage() {
        let store = CountingStore {
            inner: sample_store(),
            ..Default::default()
        };

        let no_sessions = SessionQuery::window("nobody", SportMode::Lifting, date(1), date(30));
        let data = fetch_window(&store, &no_sessions, ExerciseType::Exercise, |_| true, &RequestToken::detached())
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(store.occurrence_calls.load(Ordering::SeqCst), 0);

        let query = SessionQuery::window("u1", SportMode::Lifting, date(1), date(30));
        let data = fetch_window(&store, &query, ExerciseType::Rally, |_| true, &RequestToken::detached())
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(store.occurrence_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetch_window_stops_when_superseded() {
        let store = sample_store();
        let tracker = RequestTracker::new();
        let token = tracker.begin();
        tracker.begin();

        let query = SessionQuery::all_history("u1", SportMode::Lifting);
        let result = fetch_window(&store, &query, ExerciseType::Exercise, |_| true, &token);
        assert!(matches!(result, Err(AnalyticsError::Superseded { .. })));
    }

    #[test]
    fn test_session_query_bounds_are_inclusive() {
        let query = SessionQuery::window("u1", SportMode::Lifting, date(5), date(10));
        assert!(query.includes(date(5)));
        assert!(query.includes(date(10)));
        assert!(!query.includes(date(11)));
        assert!(SessionQuery::all_history("u1", SportMode::Lifting).includes(date(30)));
    }

    #[test]
    fn test_classify_by_history_prefers_most_frequent_type() {
        let matcher = ExerciseMatcher::new();
        let rows = vec![
            ("Free Throw", ExerciseType::Shooting, 4),
            ("free throws", ExerciseType::Drill, 1),
            ("Layup", ExerciseType::Drill, 9),
        ];
        assert_eq!(
            classify_by_history(rows.clone(), "Free Throw", &matcher),
            Some(ExerciseType::Shooting)
        );
        assert_eq!(classify_by_history(rows, "Hook Shot", &matcher), None);
    }

    #[test]
    fn test_classify_by_history_tie_goes_to_declaration_order() {
        let matcher = ExerciseMatcher::new();
        let rows = vec![
            ("Sprint Ladder", ExerciseType::Drill, 2),
            ("Sprint Ladder", ExerciseType::Sprints, 2),
        ];
        assert_eq!(
            classify_by_history(rows, "sprint ladder", &matcher),
            Some(ExerciseType::Drill)
        );
    }

    #[test]
    fn test_in_memory_classifier_is_sport_scoped() {
        let store = sample_store();
        assert_eq!(
            store.primary_exercise_type(SportMode::Lifting, "Bench Press"),
            Some(ExerciseType::Exercise)
        );
        assert_eq!(store.primary_exercise_type(SportMode::Basketball, "Bench Press"), None);
    }

    #[test]
    fn test_fixture_normalizes_legacy_completed_flag() {
        let json = r#"{
            "sessions": [{"id": "s1", "user_id": "u1", "sport": "football", "performed_on": "2024-04-02"}],
            "occurrences": [{"id": "o1", "session_id": "s1", "name": "Route Tree", "exercise_type": "drill"}],
            "sets": [
                {"id": "x1", "occurrence_id": "o1", "index": 0, "reps": 10, "completed": true},
                {"id": "x2", "occurrence_id": "o1", "index": 1, "reps": 10, "completed": 6}
            ]
        }"#;
        let store = InMemoryStore::from_json_str(json).unwrap();
        let sets = store.list_sets(&["o1".to_string()]).unwrap();
        assert_eq!(sets[0].completed, Some(10.0));
        assert_eq!(sets[1].completed, Some(6.0));
    }
}
