//! Metric calculator
//!
//! Pure functions turning a set of matched occurrences and their logged sets
//! into one scalar. Every formula follows the same numeric policy:
//!
//! - a field that is absent, non-finite or negative is excluded from the
//!   aggregate, never coerced to zero
//! - an aggregate with no contributing values is `None`, not `0.0`
//! - sets whose occurrence is not among the supplied occurrences are ignored
//!
//! The whole-interval form (`calculate`) aggregates everything it is given;
//! the bucketed form (`calculate_bucket`) first restricts occurrences to the
//! bucket's dates.

use std::collections::HashMap;

use crate::models::{ExerciseOccurrence, SetRecord, TimeBucket};
use crate::views::CalculationType;

/// An occurrence together with its sets, ordered by set index
#[derive(Debug, Clone)]
pub struct OccurrenceSets<'a> {
    pub occurrence: &'a ExerciseOccurrence,
    pub sets: Vec<&'a SetRecord>,
}

/// Attach sets to the occurrences they belong to, keeping occurrence order.
/// Sets pointing at unknown occurrences are dropped.
pub fn group_sets<'a>(
    occurrences: &[&'a ExerciseOccurrence],
    sets: &'a [SetRecord],
) -> Vec<OccurrenceSets<'a>> {
    let mut groups: Vec<OccurrenceSets<'a>> = occurrences
        .iter()
        .map(|&occurrence| OccurrenceSets {
            occurrence,
            sets: Vec::new(),
        })
        .collect();

    let positions: HashMap<&str, usize> = occurrences
        .iter()
        .enumerate()
        .map(|(i, occurrence)| (occurrence.id.as_str(), i))
        .collect();

    for set in sets {
        if let Some(&i) = positions.get(set.occurrence_id.as_str()) {
            groups[i].sets.push(set);
        }
    }

    for group in &mut groups {
        group.sets.sort_by_key(|set| set.index);
    }

    groups
}

/// A logged value that may take part in an aggregate
pub(crate) fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Strictly positive usable value, for divisors
pub(crate) fn positive(value: Option<f64>) -> Option<f64> {
    usable(value).filter(|v| *v > 0.0)
}

/// Load of one set: reps x weight, or reps alone for bodyweight
/// (weight absent or zero). `None` when reps are missing or weight is invalid.
pub(crate) fn set_load(set: &SetRecord) -> Option<f64> {
    let reps = usable(set.reps)?;
    match set.weight {
        None => Some(reps),
        Some(weight) => {
            let weight = usable(Some(weight))?;
            if weight == 0.0 {
                Some(reps)
            } else {
                checked(reps * weight)
            }
        }
    }
}

/// made / attempted as a percentage clamped to 100
pub(crate) fn shooting_percentage(set: &SetRecord) -> Option<f64> {
    let attempted = positive(set.attempted)?;
    let made = usable(set.made)?;
    checked(made / attempted * 100.0).map(|pct| pct.min(100.0))
}

/// completed / reps as a percentage clamped to 100
pub(crate) fn completion_percentage(set: &SetRecord) -> Option<f64> {
    let reps = positive(set.reps)?;
    let completed = usable(set.completed)?;
    checked(completed / reps * 100.0).map(|pct| pct.min(100.0))
}

/// distance / average time per rep
pub(crate) fn set_speed(set: &SetRecord) -> Option<f64> {
    let seconds = positive(set.avg_time_seconds)?;
    let distance = usable(set.distance)?;
    checked(distance / seconds)
}

fn checked(value: f64) -> Option<f64> {
    usable(Some(value))
}

fn sum(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut total = None;
    for value in values.into_iter().filter_map(|v| checked(v)) {
        total = Some(total.unwrap_or(0.0) + value);
    }
    total.and_then(checked)
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for value in values.into_iter().filter_map(|v| checked(v)) {
        total += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        checked(total / count as f64)
    }
}

fn max(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    values
        .into_iter()
        .filter_map(|v| checked(v))
        .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
}

/// Dispatches a calculation type to its formula
pub struct MetricCalculator;

impl MetricCalculator {
    /// Whole-interval value over every supplied occurrence
    pub fn calculate(
        calculation: CalculationType,
        occurrences: &[ExerciseOccurrence],
        sets: &[SetRecord],
    ) -> Option<f64> {
        let refs: Vec<&ExerciseOccurrence> = occurrences.iter().collect();
        Self::calculate_grouped(calculation, &group_sets(&refs, sets))
    }

    /// Value for one bucket: only occurrences performed inside it contribute
    pub fn calculate_bucket(
        calculation: CalculationType,
        bucket: &TimeBucket,
        occurrences: &[ExerciseOccurrence],
        sets: &[SetRecord],
    ) -> Option<f64> {
        let in_bucket: Vec<&ExerciseOccurrence> = occurrences
            .iter()
            .filter(|occurrence| bucket.contains(occurrence.performed_on))
            .collect();
        if in_bucket.is_empty() {
            return None;
        }
        Self::calculate_grouped(calculation, &group_sets(&in_bucket, sets))
    }

    /// Formula dispatch over pre-grouped occurrences
    pub fn calculate_grouped(
        calculation: CalculationType,
        groups: &[OccurrenceSets<'_>],
    ) -> Option<f64> {
        match calculation {
            CalculationType::Performance => Self::performance(groups),
            CalculationType::Tonnage => Self::tonnage(groups),
            CalculationType::ShootingPercentage => Self::shooting_percentage(groups),
            CalculationType::Jumpshot => Self::jumpshot(groups),
            CalculationType::JumpshotPerSession => Self::jumpshot_per_session(groups),
            CalculationType::Drill
            | CalculationType::Sprints
            | CalculationType::Hits
            | CalculationType::Shots
            | CalculationType::FieldingReps => Self::total_reps(groups),
            CalculationType::Completion => Self::completion(groups),
            CalculationType::Speed => Self::speed(groups),
            CalculationType::Distance
            | CalculationType::ShotDistance
            | CalculationType::FieldingDistance => Self::mean_distance(groups),
            CalculationType::Fielding => Self::fielding(groups),
            CalculationType::Rally => Self::rally(groups),
        }
    }

    fn all_sets<'a>(groups: &'a [OccurrenceSets<'a>]) -> impl Iterator<Item = &'a SetRecord> + 'a {
        groups.iter().flat_map(|group| group.sets.iter().copied())
    }

    /// Best single set by reps x weight
    fn performance(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        max(Self::all_sets(groups).filter_map(set_load))
    }

    /// Per occurrence: total load x number of valid sets, averaged over occurrences
    fn tonnage(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(groups.iter().filter_map(|group| {
            let loads: Vec<f64> = group.sets.iter().filter_map(|set| set_load(set)).collect();
            if loads.is_empty() {
                return None;
            }
            let volume: f64 = loads.iter().sum();
            Some(volume * loads.len() as f64)
        }))
    }

    fn shooting_percentage(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(Self::all_sets(groups).filter_map(shooting_percentage))
    }

    fn jumpshot(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        sum(Self::all_sets(groups).filter_map(|set| usable(set.attempted)))
    }

    fn jumpshot_per_session(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(
            groups
                .iter()
                .filter_map(|group| sum(group.sets.iter().filter_map(|set| usable(set.attempted)))),
        )
    }

    fn total_reps(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        sum(Self::all_sets(groups).filter_map(|set| usable(set.reps)))
    }

    fn completion(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(Self::all_sets(groups).filter_map(completion_percentage))
    }

    fn speed(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        max(Self::all_sets(groups).filter_map(set_speed))
    }

    fn mean_distance(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(Self::all_sets(groups).filter_map(|set| usable(set.distance)))
    }

    /// Legacy fielding score: per occurrence (sum of reps x distance) / set count
    fn fielding(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(groups.iter().filter_map(|group| {
            let products: Vec<f64> = group
                .sets
                .iter()
                .filter_map(|set| {
                    let reps = usable(set.reps)?;
                    let distance = usable(set.distance)?;
                    checked(reps * distance)
                })
                .collect();
            if products.is_empty() {
                return None;
            }
            Some(products.iter().sum::<f64>() / products.len() as f64)
        }))
    }

    /// Mean points, ignoring unscored (absent or zero) rallies
    fn rally(groups: &[OccurrenceSets<'_>]) -> Option<f64> {
        mean(Self::all_sets(groups).filter_map(|set| positive(set.points)))
    }
}
