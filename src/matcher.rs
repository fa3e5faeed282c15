//! Exercise name matching
//!
//! Users type exercise names freely, so the same movement shows up as
//! "Bench Press", "bench-press" or "Bench Pres". Matching normalizes both
//! sides and tolerates a small edit distance, but never lets names with
//! different embedded numbers match ("11ft Shot" vs "17ft Shot").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default edit-distance tolerance for strict matching
pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 1;

/// How permissive a match should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Normalized equality, numeral guard, bounded edit distance
    Strict,
    /// Strict, plus substring containment and word overlap (search boxes)
    Loose,
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Strict => f.write_str("strict"),
            MatchPolicy::Loose => f.write_str("loose"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(MatchPolicy::Strict),
            "loose" => Ok(MatchPolicy::Loose),
            _ => Err(format!("Invalid match policy: {}", s)),
        }
    }
}

/// Resolves user-typed queries against logged exercise names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseMatcher {
    max_edit_distance: usize,
}

impl Default for ExerciseMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseMatcher {
    pub fn new() -> Self {
        ExerciseMatcher {
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
        }
    }

    pub fn with_max_edit_distance(max_edit_distance: usize) -> Self {
        ExerciseMatcher { max_edit_distance }
    }

    /// Strict match of a logged name against a query
    pub fn matches(&self, logged_name: &str, query: &str) -> bool {
        self.matches_with(logged_name, query, MatchPolicy::Strict)
    }

    pub fn matches_with(&self, logged_name: &str, query: &str, policy: MatchPolicy) -> bool {
        let logged = normalize_name(logged_name);
        let wanted = normalize_name(query);

        if logged.is_empty() || wanted.is_empty() {
            return false;
        }

        match policy {
            MatchPolicy::Strict => self.strict_normalized(&logged, &wanted),
            MatchPolicy::Loose => {
                self.strict_normalized(&logged, &wanted) || loose_normalized(&logged, &wanted)
            }
        }
    }

    fn strict_normalized(&self, logged: &str, wanted: &str) -> bool {
        if logged == wanted {
            return true;
        }
        if digit_runs(logged) != digit_runs(wanted) {
            return false;
        }
        levenshtein(logged, wanted) <= self.max_edit_distance
    }
}

/// Lowercase, trim, map `-`/`_` to spaces and collapse whitespace runs
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Digit runs of a string, in order
///
/// "11ft shot" -> ["11"], "3x10 row" -> ["3", "10"], "bench press" -> [].
/// Two names whose runs differ never match strictly, which also covers the
/// case where only one side carries digits.
fn digit_runs(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}

fn loose_normalized(logged: &str, wanted: &str) -> bool {
    if logged.contains(wanted) || wanted.contains(logged) {
        return true;
    }

    // every query word appears among the logged words
    let logged_words: Vec<&str> = logged.split(' ').collect();
    wanted
        .split(' ')
        .all(|word| logged_words.contains(&word))
}

/// Character-level Levenshtein distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
