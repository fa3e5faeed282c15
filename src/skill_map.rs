//! Skill map comparison
//!
//! Puts up to a handful of exercises side by side on one view: each
//! selection gets its whole-window value and its share of the best one.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buckets::{window_bounds, TimeBucketer};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::matcher::{ExerciseMatcher, MatchPolicy};
use crate::metrics::MetricCalculator;
use crate::models::{ExerciseOccurrence, SkillMapEntry, SportMode};
use crate::requests::RequestToken;
use crate::store::{fetch_window, SessionQuery, TrainingStore, WindowData};
use crate::views::{CalculationType, ViewRegistry};

/// Parameters of one skill map comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub user_id: String,
    pub sport: SportMode,
    pub view_name: String,
    pub selections: Vec<String>,
    pub window_days: u32,
}

impl CompareRequest {
    pub fn new<I, S>(
        user_id: impl Into<String>,
        sport: SportMode,
        view_name: impl Into<String>,
        selections: I,
        window_days: u32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompareRequest {
            user_id: user_id.into(),
            sport,
            view_name: view_name.into(),
            selections: selections.into_iter().map(Into::into).collect(),
            window_days,
        }
    }
}

/// Entries in selection order plus the value every percentage is relative to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMapResult {
    pub sport: SportMode,
    pub view_name: String,
    pub calculation: CalculationType,
    pub entries: Vec<SkillMapEntry>,
    pub highest_value: f64,
}

impl SkillMapResult {
    pub fn highest(&self) -> Option<&SkillMapEntry> {
        self.entries.iter().find(|entry| entry.is_highest)
    }
}

/// Compares selected exercises on a single view
#[derive(Debug, Clone)]
pub struct SkillMapNormalizer {
    matcher: ExerciseMatcher,
    policy: MatchPolicy,
    max_selections: usize,
}

impl Default for SkillMapNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillMapNormalizer {
    pub fn new() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        SkillMapNormalizer {
            matcher: config.matcher(),
            policy: config.matching.comparison_policy,
            max_selections: config.skill_map.max_selections,
        }
    }

    pub fn max_selections(&self) -> usize {
        self.max_selections
    }

    fn validate(&self, request: &CompareRequest) -> Result<()> {
        if request.selections.is_empty() {
            return Err(AnalyticsError::InvalidRequest(
                "at least one exercise must be selected".to_string(),
            ));
        }
        if request.selections.len() > self.max_selections {
            return Err(AnalyticsError::InvalidRequest(format!(
                "{} exercises selected, at most {} can be compared",
                request.selections.len(),
                self.max_selections
            )));
        }
        Ok(())
    }

    /// Comparison over a window ending today
    pub fn compare(&self, store: &dyn TrainingStore, request: &CompareRequest) -> Result<Option<SkillMapResult>> {
        self.compare_on(store, request, TimeBucketer::today(), &RequestToken::detached())
    }

    /// Comparison over a window ending on `today`; `Ok(None)` for an unknown view
    pub fn compare_on(
        &self,
        store: &dyn TrainingStore,
        request: &CompareRequest,
        today: NaiveDate,
        token: &RequestToken,
    ) -> Result<Option<SkillMapResult>> {
        if let Err(err) = self.validate(request) {
            warn!(selections = request.selections.len(), error = %err, "compare rejected");
            return Err(err);
        }

        let Some(view) = ViewRegistry::view_config(request.sport, &request.view_name) else {
            info!(
                sport = %request.sport,
                view = %request.view_name,
                "unknown view requested"
            );
            return Ok(None);
        };

        let (from, to) = window_bounds(today, request.window_days);
        let query = SessionQuery::window(request.user_id.clone(), request.sport, from, to);

        let data = fetch_window(
            store,
            &query,
            view.exercise_type,
            |occurrence| {
                request
                    .selections
                    .iter()
                    .any(|selection| self.selection_matches(occurrence, selection))
            },
            token,
        )?;
        token.ensure_current()?;

        let values: Vec<Option<f64>> = request
            .selections
            .par_iter()
            .map(|selection| self.selection_value(view.calculation, selection, &data))
            .collect();
        token.ensure_current()?;

        let (entries, highest_value) = normalize_entries(request.selections.iter().cloned().zip(values));

        debug!(
            sport = %request.sport,
            view = view.name,
            selections = entries.len(),
            highest = highest_value,
            "skill map computed"
        );

        Ok(Some(SkillMapResult {
            sport: request.sport,
            view_name: view.name.to_string(),
            calculation: view.calculation,
            entries,
            highest_value,
        }))
    }

    fn selection_matches(&self, occurrence: &ExerciseOccurrence, selection: &str) -> bool {
        self.matcher.matches_with(&occurrence.name, selection, self.policy)
    }

    fn selection_value(&self, calculation: CalculationType, selection: &str, data: &WindowData) -> Option<f64> {
        let matched: Vec<ExerciseOccurrence> = data
            .occurrences
            .iter()
            .filter(|occurrence| self.selection_matches(occurrence, selection))
            .cloned()
            .collect();
        if matched.is_empty() {
            return None;
        }
        MetricCalculator::calculate(calculation, &matched, &data.sets)
    }
}

/// Turn per-selection values into skill map entries
///
/// Missing values become zero. The first entry holding the highest positive
/// value is marked highest and gets exactly 100.
pub fn normalize_entries<I>(values: I) -> (Vec<SkillMapEntry>, f64)
where
    I: IntoIterator<Item = (String, Option<f64>)>,
{
    let mut entries: Vec<SkillMapEntry> = values
        .into_iter()
        .map(|(exercise_name, value)| SkillMapEntry {
            exercise_name,
            raw_value: value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0),
            percentage: 0.0,
            is_highest: false,
        })
        .collect();

    let highest_value = entries
        .iter()
        .map(|entry| entry.raw_value)
        .fold(0.0_f64, f64::max);
    if highest_value <= 0.0 {
        return (entries, 0.0);
    }

    let mut marked = false;
    for entry in &mut entries {
        if entry.raw_value <= 0.0 {
            continue;
        }
        if !marked && entry.raw_value == highest_value {
            entry.is_highest = true;
            entry.percentage = 100.0;
            marked = true;
        } else {
            entry.percentage = (entry.raw_value / highest_value * 100.0).clamp(0.0, 100.0);
        }
    }

    (entries, highest_value)
}
