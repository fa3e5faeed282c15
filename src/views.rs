//! Static view registry
//!
//! A view is a named, sport-scoped analytics lens: it restricts the
//! occurrences it examines to one exercise type and aggregates them with one
//! calculation formula. Adding a view is a change to `VIEW_TABLE` only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{ExerciseType, SportMode};

/// Aggregation formulas understood by the metric calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    /// Best single set of reps x weight (reps alone for bodyweight)
    Performance,
    /// Mean per-occurrence volume multiplied by set count
    Tonnage,
    /// Mean made/attempted percentage
    ShootingPercentage,
    /// Total attempted shots
    Jumpshot,
    /// Mean attempted shots per occurrence
    JumpshotPerSession,
    Drill,
    Sprints,
    Hits,
    Shots,
    FieldingReps,
    /// Mean completed/reps percentage
    Completion,
    /// Best distance / average time
    Speed,
    Distance,
    ShotDistance,
    FieldingDistance,
    /// Legacy fielding score: mean per-occurrence reps x distance per set
    Fielding,
    /// Mean points per rally set
    Rally,
}

impl CalculationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::Performance => "performance",
            CalculationType::Tonnage => "tonnage",
            CalculationType::ShootingPercentage => "shooting_percentage",
            CalculationType::Jumpshot => "jumpshot",
            CalculationType::JumpshotPerSession => "jumpshot_per_session",
            CalculationType::Drill => "drill",
            CalculationType::Sprints => "sprints",
            CalculationType::Hits => "hits",
            CalculationType::Shots => "shots",
            CalculationType::FieldingReps => "fielding_reps",
            CalculationType::Completion => "completion",
            CalculationType::Speed => "speed",
            CalculationType::Distance => "distance",
            CalculationType::ShotDistance => "shot_distance",
            CalculationType::FieldingDistance => "fielding_distance",
            CalculationType::Fielding => "fielding",
            CalculationType::Rally => "rally",
        }
    }

    /// True for formulas that report a percentage in `[0, 100]`
    pub fn is_percentage(&self) -> bool {
        matches!(
            self,
            CalculationType::ShootingPercentage | CalculationType::Completion
        )
    }
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "performance" => Ok(CalculationType::Performance),
            "tonnage" => Ok(CalculationType::Tonnage),
            "shooting_percentage" => Ok(CalculationType::ShootingPercentage),
            "jumpshot" => Ok(CalculationType::Jumpshot),
            "jumpshot_per_session" => Ok(CalculationType::JumpshotPerSession),
            "drill" => Ok(CalculationType::Drill),
            "sprints" => Ok(CalculationType::Sprints),
            "hits" => Ok(CalculationType::Hits),
            "shots" => Ok(CalculationType::Shots),
            "fielding_reps" => Ok(CalculationType::FieldingReps),
            "completion" => Ok(CalculationType::Completion),
            "speed" => Ok(CalculationType::Speed),
            "distance" => Ok(CalculationType::Distance),
            "shot_distance" => Ok(CalculationType::ShotDistance),
            "fielding_distance" => Ok(CalculationType::FieldingDistance),
            "fielding" => Ok(CalculationType::Fielding),
            "rally" => Ok(CalculationType::Rally),
            _ => Err(format!("Unknown calculation type: {}", s)),
        }
    }
}

/// One registered view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct View {
    pub name: &'static str,
    pub sport: SportMode,
    pub exercise_type: ExerciseType,
    pub calculation: CalculationType,
}

const fn view(
    sport: SportMode,
    name: &'static str,
    exercise_type: ExerciseType,
    calculation: CalculationType,
) -> View {
    View {
        name,
        sport,
        exercise_type,
        calculation,
    }
}

use self::CalculationType as C;
use crate::models::ExerciseType as E;
use crate::models::SportMode as S;

/// Registry table, grouped by sport in display order.
/// Running has no rows.
const VIEW_TABLE: &[View] = &[
    // Lifting
    view(S::Lifting, "Performance", E::Exercise, C::Performance),
    view(S::Lifting, "Tonnage", E::Exercise, C::Tonnage),
    // Basketball
    view(S::Basketball, "Shooting %", E::Shooting, C::ShootingPercentage),
    view(S::Basketball, "Jumpshots", E::Shooting, C::Jumpshot),
    view(S::Basketball, "Shots Per Session", E::Shooting, C::JumpshotPerSession),
    view(S::Basketball, "Drills", E::Drill, C::Drill),
    view(S::Basketball, "Sprints", E::Sprints, C::Sprints),
    view(S::Basketball, "Speed", E::Sprints, C::Speed),
    view(S::Basketball, "Performance", E::Exercise, C::Performance),
    view(S::Basketball, "Tonnage", E::Exercise, C::Tonnage),
    // Football
    view(S::Football, "Drills", E::Drill, C::Drill),
    view(S::Football, "Completion %", E::Drill, C::Completion),
    view(S::Football, "Sprints", E::Sprints, C::Sprints),
    view(S::Football, "Sprint Distance", E::Sprints, C::Distance),
    view(S::Football, "Speed", E::Sprints, C::Speed),
    view(S::Football, "Performance", E::Exercise, C::Performance),
    view(S::Football, "Tonnage", E::Exercise, C::Tonnage),
    // Baseball
    view(S::Baseball, "Hits", E::Hitting, C::Hits),
    view(S::Baseball, "Hit Distance", E::Hitting, C::Distance),
    view(S::Baseball, "Fielding Reps", E::Fielding, C::FieldingReps),
    view(S::Baseball, "Fielding Distance", E::Fielding, C::FieldingDistance),
    view(S::Baseball, "Fielding", E::Fielding, C::Fielding),
    view(S::Baseball, "Sprints", E::Sprints, C::Sprints),
    view(S::Baseball, "Speed", E::Sprints, C::Speed),
    view(S::Baseball, "Performance", E::Exercise, C::Performance),
    view(S::Baseball, "Tonnage", E::Exercise, C::Tonnage),
    // Soccer
    view(S::Soccer, "Shots", E::Shooting, C::Shots),
    view(S::Soccer, "Shot Distance", E::Shooting, C::ShotDistance),
    view(S::Soccer, "Drills", E::Drill, C::Drill),
    view(S::Soccer, "Sprints", E::Sprints, C::Sprints),
    view(S::Soccer, "Speed", E::Sprints, C::Speed),
    view(S::Soccer, "Performance", E::Exercise, C::Performance),
    view(S::Soccer, "Tonnage", E::Exercise, C::Tonnage),
    // Hockey
    view(S::Hockey, "Shots", E::Shooting, C::Shots),
    view(S::Hockey, "Shot Distance", E::Shooting, C::ShotDistance),
    view(S::Hockey, "Drills", E::Drill, C::Drill),
    view(S::Hockey, "Sprints", E::Sprints, C::Sprints),
    view(S::Hockey, "Speed", E::Sprints, C::Speed),
    view(S::Hockey, "Performance", E::Exercise, C::Performance),
    view(S::Hockey, "Tonnage", E::Exercise, C::Tonnage),
    // Tennis
    view(S::Tennis, "Rally", E::Rally, C::Rally),
    view(S::Tennis, "Drills", E::Drill, C::Drill),
    view(S::Tennis, "Sprints", E::Sprints, C::Sprints),
    view(S::Tennis, "Speed", E::Sprints, C::Speed),
    view(S::Tennis, "Performance", E::Exercise, C::Performance),
    view(S::Tennis, "Tonnage", E::Exercise, C::Tonnage),
];

/// Lookup facade over the static view table
pub struct ViewRegistry;

impl ViewRegistry {
    /// All views for a sport, in display order
    pub fn views_for(sport: SportMode) -> Vec<View> {
        VIEW_TABLE
            .iter()
            .filter(|v| v.sport == sport)
            .copied()
            .collect()
    }

    /// Resolve a (sport, name) pair; names compare case-insensitively
    pub fn view_config(sport: SportMode, name: &str) -> Option<View> {
        let wanted = name.trim();
        VIEW_TABLE
            .iter()
            .find(|v| v.sport == sport && v.name.eq_ignore_ascii_case(wanted))
            .copied()
    }

    pub fn calculation_type_for(sport: SportMode, name: &str) -> Option<CalculationType> {
        Self::view_config(sport, name).map(|v| v.calculation)
    }

    pub fn restriction_for(sport: SportMode, name: &str) -> Option<ExerciseType> {
        Self::view_config(sport, name).map(|v| v.exercise_type)
    }
}
