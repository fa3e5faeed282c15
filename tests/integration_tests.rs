use chrono::{Duration, NaiveDate};
use sportlens::{
    CalculationType, CompareRequest, ExerciseOccurrence, ExerciseType, InMemoryStore, MetricCalculator,
    ProgressAggregator, RecordExtractor, RecordMetric, RequestToken, SetRecord, SkillMapNormalizer, SportMode,
    TrendRequest,
};

/// End-to-end pipelines over the in-memory store

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - Duration::days(n)
}

fn lifted(reps: f64, weight: Option<f64>) -> SetRecord {
    SetRecord {
        reps: Some(reps),
        weight,
        ..Default::default()
    }
}

/// One occurrence per (days ago, name, sets) in its own session
fn store_with(
    sport: SportMode,
    exercise_type: ExerciseType,
    entries: Vec<(i64, &str, Vec<SetRecord>)>,
) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    for (ago, name, sets) in entries {
        let session = store.add_session("athlete", sport, days_ago(ago));
        let occurrence = store.add_occurrence(&session, name, exercise_type);
        for set in sets {
            store.add_set(&occurrence, set);
        }
    }
    store
}

fn occurrence(id: &str) -> ExerciseOccurrence {
    ExerciseOccurrence {
        id: id.to_string(),
        session_id: "session".to_string(),
        name: "Exercise".to_string(),
        exercise_type: ExerciseType::Exercise,
        performed_on: today(),
    }
}

fn set_of(occurrence_id: &str, index: u32, set: SetRecord) -> SetRecord {
    SetRecord {
        id: format!("{}-{}", occurrence_id, index),
        occurrence_id: occurrence_id.to_string(),
        index,
        ..set
    }
}

#[test]
fn test_performance_uses_reps_without_weight() {
    let occurrences = vec![occurrence("o1")];
    let sets = vec![
        set_of("o1", 0, lifted(5.0, Some(100.0))),
        set_of("o1", 1, lifted(10.0, None)),
    ];
    assert_eq!(
        MetricCalculator::calculate(CalculationType::Performance, &occurrences, &sets),
        Some(500.0)
    );
}

#[test]
fn test_tonnage_single_occurrence() {
    let occurrences = vec![occurrence("o1")];
    let sets: Vec<SetRecord> = (0..3).map(|i| set_of("o1", i, lifted(8.0, Some(50.0)))).collect();
    assert_eq!(
        MetricCalculator::calculate(CalculationType::Tonnage, &occurrences, &sets),
        Some(3600.0)
    );
}

#[test]
fn test_shooting_percentage_skips_zero_attempts() {
    let occurrences = vec![occurrence("o1")];
    let sets = vec![
        set_of(
            "o1",
            0,
            SetRecord {
                attempted: Some(10.0),
                made: Some(6.0),
                ..Default::default()
            },
        ),
        set_of(
            "o1",
            1,
            SetRecord {
                attempted: Some(0.0),
                made: Some(0.0),
                ..Default::default()
            },
        ),
    ];
    assert_eq!(
        MetricCalculator::calculate(CalculationType::ShootingPercentage, &occurrences, &sets),
        Some(60.0)
    );
}

#[test]
fn test_rep_totals_ignore_unmatched_occurrences() {
    let store = store_with(
        SportMode::Baseball,
        ExerciseType::Hitting,
        vec![
            (1, "Tee Work", vec![lifted(20.0, None), lifted(15.0, None)]),
            (2, "Tee Work", vec![lifted(10.0, None)]),
            (2, "Soft Toss", vec![lifted(50.0, None)]),
        ],
    );
    let request = TrendRequest::new("athlete", SportMode::Baseball, "Hits", 7).with_exercise("Tee Work");
    let result = ProgressAggregator::new()
        .trend_on(&store, &request, today(), &RequestToken::detached())
        .unwrap()
        .unwrap();

    let total: f64 = result.points.iter().filter_map(|p| p.value).sum();
    assert_eq!(total, 45.0);
    assert_eq!(result.max_value, Some(35.0));
}

#[test]
fn test_trend_window_spans_whole_range() {
    let store = store_with(
        SportMode::Lifting,
        ExerciseType::Exercise,
        vec![
            (0, "Bench Press", vec![lifted(5.0, Some(100.0))]),
            (365, "Bench Press", vec![lifted(5.0, Some(80.0))]),
            (366, "Bench Press", vec![lifted(5.0, Some(200.0))]),
        ],
    );
    let request = TrendRequest::new("athlete", SportMode::Lifting, "Performance", 365);
    let result = ProgressAggregator::new()
        .trend_on(&store, &request, today(), &RequestToken::detached())
        .unwrap()
        .unwrap();

    assert_eq!(result.points.first().unwrap().start, days_ago(365));
    assert_eq!(result.points.last().unwrap().end, today());
    assert_eq!(result.points.first().unwrap().value, Some(400.0));
    assert_eq!(result.points.last().unwrap().value, Some(500.0));
    assert_eq!(result.max_value, Some(500.0));
    for pair in result.points.windows(2) {
        assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
    }
}

#[test]
fn test_jumpshot_forms() {
    let shots = |attempted: f64| SetRecord {
        attempted: Some(attempted),
        made: Some(attempted / 2.0),
        ..Default::default()
    };
    let store = store_with(
        SportMode::Basketball,
        ExerciseType::Shooting,
        vec![
            (3, "Jumpshot", vec![shots(20.0), shots(10.0)]),
            (4, "Jumpshot", vec![shots(10.0)]),
        ],
    );
    let normalizer = SkillMapNormalizer::new();
    let token = RequestToken::detached();

    let total = normalizer
        .compare_on(
            &store,
            &CompareRequest::new("athlete", SportMode::Basketball, "Jumpshots", ["Jumpshot"], 30),
            today(),
            &token,
        )
        .unwrap()
        .unwrap();
    assert_eq!(total.entries[0].raw_value, 40.0);

    let per_session = normalizer
        .compare_on(
            &store,
            &CompareRequest::new("athlete", SportMode::Basketball, "Shots Per Session", ["Jumpshot"], 30),
            today(),
            &token,
        )
        .unwrap()
        .unwrap();
    assert_eq!(per_session.entries[0].raw_value, 20.0);
}

#[test]
fn test_compare_percentages_follow_selection_order() {
    let store = store_with(
        SportMode::Lifting,
        ExerciseType::Exercise,
        vec![
            (1, "Back Squat", vec![lifted(10.0, Some(1000.0))]),
            (2, "Bench Press", vec![lifted(10.0, Some(700.0))]),
            (3, "Deadlift", vec![lifted(10.0, Some(800.0))]),
        ],
    );
    let request = CompareRequest::new(
        "athlete",
        SportMode::Lifting,
        "Performance",
        ["Back Squat", "Bench Press", "Deadlift"],
        30,
    );
    let result = SkillMapNormalizer::new()
        .compare_on(&store, &request, today(), &RequestToken::detached())
        .unwrap()
        .unwrap();

    assert_eq!(result.highest_value, 10000.0);
    let expected = [100.0, 70.0, 80.0];
    for (entry, pct) in result.entries.iter().zip(expected) {
        assert!((entry.percentage - pct).abs() < 1e-9, "{} -> {}", entry.exercise_name, entry.percentage);
    }
    assert_eq!(result.entries.iter().filter(|e| e.is_highest).count(), 1);
    assert!(result.entries[0].is_highest);
}

#[test]
fn test_compare_keeps_unmatched_selection() {
    let store = store_with(
        SportMode::Soccer,
        ExerciseType::Shooting,
        vec![(1, "Penalty Kick", vec![lifted(12.0, None)])],
    );
    let request = CompareRequest::new("athlete", SportMode::Soccer, "Shots", ["Bicycle Kick", "penalty kick"], 14);
    let result = SkillMapNormalizer::new()
        .compare_on(&store, &request, today(), &RequestToken::detached())
        .unwrap()
        .unwrap();

    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.entries[0].raw_value, 0.0);
    assert!(!result.entries[0].is_highest);
    assert_eq!(result.entries[1].percentage, 100.0);
}

#[test]
fn test_best_ever_tie_reports_later_date() {
    let store = store_with(
        SportMode::Lifting,
        ExerciseType::Exercise,
        vec![
            (400, "Bench Press", vec![lifted(5.0, Some(100.0))]),
            (10, "Bench Press", vec![lifted(5.0, Some(100.0))]),
            (200, "Bench Press", vec![lifted(8.0, Some(60.0))]),
        ],
    );
    let record = RecordExtractor::new()
        .best_ever(
            &store,
            &store,
            "athlete",
            "Bench Press",
            SportMode::Lifting,
            &RequestToken::detached(),
        )
        .unwrap()
        .unwrap();

    let best = record.best(RecordMetric::RepsXWeight).unwrap();
    assert_eq!(best.value, 500.0);
    assert_eq!(best.achieved_on, days_ago(10));
    assert_eq!(record.best(RecordMetric::Reps).unwrap().achieved_on, days_ago(200));
    assert!(record.best(RecordMetric::Speed).is_none());
}

#[test]
fn test_football_completion_from_legacy_fixture() {
    let json = format!(
        r#"{{
            "sessions": [{{"id": "s1", "user_id": "athlete", "sport": "football", "performed_on": "{}"}}],
            "occurrences": [{{"id": "o1", "session_id": "s1", "name": "Slant Route", "exercise_type": "drill"}}],
            "sets": [
                {{"id": "a", "occurrence_id": "o1", "index": 0, "reps": 10, "completed": true}},
                {{"id": "b", "occurrence_id": "o1", "index": 1, "reps": 10, "completed": 5}}
            ]
        }}"#,
        days_ago(2)
    );
    let store = InMemoryStore::from_json_str(&json).unwrap();
    let request = TrendRequest::new("athlete", SportMode::Football, "Completion %", 7);
    let result = ProgressAggregator::new()
        .trend_on(&store, &request, today(), &RequestToken::detached())
        .unwrap()
        .unwrap();

    assert_eq!(result.max_value, Some(75.0));

    let record = RecordExtractor::new()
        .best_ever(
            &store,
            &store,
            "athlete",
            "slant route",
            SportMode::Football,
            &RequestToken::detached(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(record.best(RecordMetric::Completion).unwrap().value, 100.0);
}
