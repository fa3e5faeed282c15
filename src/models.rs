use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sport modes supported by the analytics engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SportMode {
    Lifting,
    Basketball,
    Football,
    Baseball,
    Soccer,
    Hockey,
    Tennis,
    /// Tracked for logging only; carries no analytics views
    Running,
}

impl SportMode {
    pub const ALL: [SportMode; 8] = [
        SportMode::Lifting,
        SportMode::Basketball,
        SportMode::Football,
        SportMode::Baseball,
        SportMode::Soccer,
        SportMode::Hockey,
        SportMode::Tennis,
        SportMode::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SportMode::Lifting => "lifting",
            SportMode::Basketball => "basketball",
            SportMode::Football => "football",
            SportMode::Baseball => "baseball",
            SportMode::Soccer => "soccer",
            SportMode::Hockey => "hockey",
            SportMode::Tennis => "tennis",
            SportMode::Running => "running",
        }
    }
}

impl fmt::Display for SportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lifting" | "weightlifting" => Ok(SportMode::Lifting),
            "basketball" => Ok(SportMode::Basketball),
            "football" => Ok(SportMode::Football),
            "baseball" => Ok(SportMode::Baseball),
            "soccer" => Ok(SportMode::Soccer),
            "hockey" => Ok(SportMode::Hockey),
            "tennis" => Ok(SportMode::Tennis),
            "running" => Ok(SportMode::Running),
            _ => Err(format!("Unknown sport: {}", s)),
        }
    }
}

/// Exercise type tag carried by every logged occurrence
///
/// Declaration order doubles as the tie-break order when classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Exercise,
    Shooting,
    Drill,
    Sprints,
    Hitting,
    Fielding,
    Rally,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 7] = [
        ExerciseType::Exercise,
        ExerciseType::Shooting,
        ExerciseType::Drill,
        ExerciseType::Sprints,
        ExerciseType::Hitting,
        ExerciseType::Fielding,
        ExerciseType::Rally,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Exercise => "exercise",
            ExerciseType::Shooting => "shooting",
            ExerciseType::Drill => "drill",
            ExerciseType::Sprints => "sprints",
            ExerciseType::Hitting => "hitting",
            ExerciseType::Fielding => "fielding",
            ExerciseType::Rally => "rally",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exercise" => Ok(ExerciseType::Exercise),
            "shooting" => Ok(ExerciseType::Shooting),
            "drill" => Ok(ExerciseType::Drill),
            "sprints" | "sprint" => Ok(ExerciseType::Sprints),
            "hitting" => Ok(ExerciseType::Hitting),
            "fielding" => Ok(ExerciseType::Fielding),
            "rally" => Ok(ExerciseType::Rally),
            _ => Err(format!("Unknown exercise type: {}", s)),
        }
    }
}

/// A training session as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub performed_on: NaiveDate,
}

/// One time an exercise was logged within one training session (a "square")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseOccurrence {
    pub id: String,
    pub session_id: String,
    /// Exercise name exactly as the user typed it
    pub name: String,
    pub exercise_type: ExerciseType,
    /// Date of the parent session
    pub performed_on: NaiveDate,
}

/// One logged set of an occurrence
///
/// Every numeric field is optional; `None` means "not logged" and is never
/// read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    pub id: String,
    pub occurrence_id: String,
    pub index: u32,
    pub reps: Option<f64>,
    /// Load in the user's unit; `Some(0.0)` marks a bodyweight set
    pub weight: Option<f64>,
    pub attempted: Option<f64>,
    pub made: Option<f64>,
    pub distance: Option<f64>,
    pub time_minutes: Option<f64>,
    pub avg_time_seconds: Option<f64>,
    /// Completed repetitions, already normalized from the legacy flag
    pub completed: Option<f64>,
    pub points: Option<f64>,
}

impl SetRecord {
    pub fn new(id: impl Into<String>, occurrence_id: impl Into<String>, index: u32) -> Self {
        SetRecord {
            id: id.into(),
            occurrence_id: occurrence_id.into(),
            index,
            ..Default::default()
        }
    }
}

/// Raw `completed` value as historically stored: a flag, later a count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletedValue {
    Flag(bool),
    Count(f64),
}

impl CompletedValue {
    /// Normalize to a completed-repetition count.
    ///
    /// A `true` flag means every rep was completed, so it resolves to `reps`
    /// (and to nothing when reps were not logged); `false` resolves to zero.
    pub fn normalize(self, reps: Option<f64>) -> Option<f64> {
        match self {
            CompletedValue::Count(count) => Some(count),
            CompletedValue::Flag(true) => reps,
            CompletedValue::Flag(false) => Some(0.0),
        }
    }
}

/// Set record in its at-rest shape, before boundary normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSetRecord {
    pub id: String,
    pub occurrence_id: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub reps: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub attempted: Option<f64>,
    #[serde(default)]
    pub made: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub time_minutes: Option<f64>,
    #[serde(default)]
    pub avg_time_seconds: Option<f64>,
    #[serde(default)]
    pub completed: Option<CompletedValue>,
    #[serde(default)]
    pub points: Option<f64>,
}

impl From<RawSetRecord> for SetRecord {
    fn from(raw: RawSetRecord) -> Self {
        let completed = raw.completed.and_then(|value| value.normalize(raw.reps));
        SetRecord {
            id: raw.id,
            occurrence_id: raw.occurrence_id,
            index: raw.index,
            reps: raw.reps,
            weight: raw.weight,
            attempted: raw.attempted,
            made: raw.made,
            distance: raw.distance,
            time_minutes: raw.time_minutes,
            avg_time_seconds: raw.avg_time_seconds,
            completed,
            points: raw.points,
        }
    }
}

/// Contiguous calendar sub-range of a trend window, dates inclusive
///
/// Index 0 is the oldest bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeBucket {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// One trend data point per bucket; `value` is `None` when nothing could be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub bucket_index: usize,
    pub value: Option<f64>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One skill-map row, in selection order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMapEntry {
    pub exercise_name: String,
    pub raw_value: f64,
    /// Share of the highest raw value, in `[0, 100]`
    pub percentage: f64,
    pub is_highest: bool,
}

/// Metrics tracked for personal records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMetric {
    RepsXWeight,
    Reps,
    Weight,
    Percentage,
    Attempted,
    Made,
    Distance,
    Completion,
    RepsPerMinute,
    Time,
    Speed,
    AvgDistance,
    RepsXDistance,
    Points,
}

impl RecordMetric {
    pub fn label(&self) -> &'static str {
        match self {
            RecordMetric::RepsXWeight => "Reps x Weight",
            RecordMetric::Reps => "Reps",
            RecordMetric::Weight => "Weight",
            RecordMetric::Percentage => "Percentage",
            RecordMetric::Attempted => "Attempted",
            RecordMetric::Made => "Made",
            RecordMetric::Distance => "Distance",
            RecordMetric::Completion => "Completion %",
            RecordMetric::RepsPerMinute => "Reps / Minute",
            RecordMetric::Time => "Time",
            RecordMetric::Speed => "Speed",
            RecordMetric::AvgDistance => "Avg Distance",
            RecordMetric::RepsXDistance => "Reps x Distance",
            RecordMetric::Points => "Points",
        }
    }
}

/// Best observed value for one metric and the date it was achieved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    pub value: f64,
    pub achieved_on: NaiveDate,
}

/// All-time bests for one exercise
///
/// Only metrics applicable to `exercise_type` that were actually observed
/// appear in `bests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub sport: SportMode,
    pub exercise_type: ExerciseType,
    pub bests: BTreeMap<RecordMetric, RecordValue>,
}

impl PersonalRecord {
    pub fn best(&self, metric: RecordMetric) -> Option<&RecordValue> {
        self.bests.get(&metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sport_round_trip_names() {
        for sport in SportMode::ALL {
            assert_eq!(sport.as_str().parse::<SportMode>().unwrap(), sport);
        }
        assert!("curling".parse::<SportMode>().is_err());
    }

    #[test]
    fn test_completed_flag_normalization() {
        assert_eq!(CompletedValue::Flag(true).normalize(Some(8.0)), Some(8.0));
        assert_eq!(CompletedValue::Flag(false).normalize(Some(8.0)), Some(0.0));
        assert_eq!(CompletedValue::Flag(true).normalize(None), None);
        assert_eq!(CompletedValue::Count(5.0).normalize(Some(8.0)), Some(5.0));
    }

    #[test]
    fn test_raw_set_accepts_both_completed_shapes() {
        let flag: RawSetRecord = serde_json::from_str(
            r#"{"id":"s1","occurrence_id":"o1","reps":10,"completed":true}"#,
        )
        .unwrap();
        assert_eq!(SetRecord::from(flag).completed, Some(10.0));

        let count: RawSetRecord = serde_json::from_str(
            r#"{"id":"s2","occurrence_id":"o1","reps":10,"completed":7}"#,
        )
        .unwrap();
        assert_eq!(SetRecord::from(count).completed, Some(7.0));
    }

    #[test]
    fn test_bucket_contains_is_inclusive() {
        let bucket = TimeBucket {
            index: 0,
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        };
        assert!(bucket.contains(bucket.start));
        assert!(bucket.contains(bucket.end));
        assert!(!bucket.contains(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()));
        assert_eq!(bucket.days(), 7);
    }
}
