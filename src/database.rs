//! SQLite-backed training store
//!
//! Dates are stored as `YYYY-MM-DD` text, enums by their lowercase names.
//! Sets carry both a numeric `completed` column and the legacy boolean
//! `completed_flag`; the two are merged into one count when rows are read.

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::matcher::ExerciseMatcher;
use crate::models::{
    CompletedValue, ExerciseOccurrence, ExerciseType, RawSetRecord, Session, SetRecord, SportMode,
};
use crate::store::{
    classify_by_history, ExerciseClassifier, SessionQuery, StoreFixture, StoredOccurrence, StoredSession,
    TrainingStore,
};

/// Largest id list bound into a single `IN (...)` clause
const MAX_IN_PARAMS: usize = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        sport TEXT NOT NULL,
        performed_on TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS exercise_occurrences (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        exercise_type TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS set_records (
        id TEXT PRIMARY KEY,
        occurrence_id TEXT NOT NULL REFERENCES exercise_occurrences(id) ON DELETE CASCADE,
        set_index INTEGER NOT NULL DEFAULT 0,
        reps REAL,
        weight REAL,
        attempted REAL,
        made REAL,
        distance REAL,
        time_minutes REAL,
        avg_time_seconds REAL,
        completed REAL,
        completed_flag INTEGER,
        points REAL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_sport_date
        ON sessions(user_id, sport, performed_on);
    CREATE INDEX IF NOT EXISTS idx_occurrences_session
        ON exercise_occurrences(session_id, exercise_type);
    CREATE INDEX IF NOT EXISTS idx_sets_occurrence
        ON set_records(occurrence_id, set_index);
"#;

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub session_count: usize,
    pub occurrence_count: usize,
    pub set_count: usize,
}

/// Training store over a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
    matcher: ExerciseMatcher,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| map_sqlite_error(e, "open database"))?;
        debug!(path = %path.as_ref().display(), "opened training database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
            matcher: ExerciseMatcher::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Matcher used when acting as a classifier
    pub fn with_matcher(mut self, matcher: ExerciseMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Create tables and indexes if they do not exist yet
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.lock()
            .execute_batch(SCHEMA)
            .map_err(|e| map_sqlite_error(e, "init schema"))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_session(&self, session: &StoredSession) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "INSERT INTO sessions (id, user_id, sport, performed_on) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    session.user_id,
                    session.sport.as_str(),
                    session.performed_on.format(DATE_FORMAT).to_string()
                ],
            )
            .map_err(|e| map_sqlite_error(e, "insert session"))?;
        Ok(())
    }

    pub fn insert_occurrence(&self, occurrence: &StoredOccurrence) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "INSERT INTO exercise_occurrences (id, session_id, name, exercise_type) VALUES (?1, ?2, ?3, ?4)",
                params![
                    occurrence.id,
                    occurrence.session_id,
                    occurrence.name,
                    occurrence.exercise_type.as_str()
                ],
            )
            .map_err(|e| map_sqlite_error(e, "insert occurrence"))?;
        Ok(())
    }

    /// Insert a set in its at-rest shape; a legacy flag lands in `completed_flag`
    pub fn insert_set(&self, set: &RawSetRecord) -> Result<(), StoreError> {
        insert_set_on(&self.lock(), set)
    }

    /// Load a whole fixture in one transaction
    pub fn import_fixture(&self, fixture: &StoreFixture) -> Result<StoreStats, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(|e| map_sqlite_error(e, "import fixture"))?;
        for session in &fixture.sessions {
            tx.execute(
                "INSERT INTO sessions (id, user_id, sport, performed_on) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    session.user_id,
                    session.sport.as_str(),
                    session.performed_on.format(DATE_FORMAT).to_string()
                ],
            )
            .map_err(|e| map_sqlite_error(e, "import fixture"))?;
        }
        for occurrence in &fixture.occurrences {
            tx.execute(
                "INSERT INTO exercise_occurrences (id, session_id, name, exercise_type) VALUES (?1, ?2, ?3, ?4)",
                params![
                    occurrence.id,
                    occurrence.session_id,
                    occurrence.name,
                    occurrence.exercise_type.as_str()
                ],
            )
            .map_err(|e| map_sqlite_error(e, "import fixture"))?;
        }
        for set in &fixture.sets {
            insert_set_on(&tx, set)?;
        }
        tx.commit().map_err(|e| map_sqlite_error(e, "import fixture"))?;

        debug!(
            sessions = fixture.sessions.len(),
            occurrences = fixture.occurrences.len(),
            sets = fixture.sets.len(),
            "fixture imported"
        );

        Ok(StoreStats {
            session_count: fixture.sessions.len(),
            occurrence_count: fixture.occurrences.len(),
            set_count: fixture.sets.len(),
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock();
        let count = |table: &str| -> Result<usize, StoreError> {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .map_err(|e| map_sqlite_error(e, "stats"))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            session_count: count("sessions")?,
            occurrence_count: count("exercise_occurrences")?,
            set_count: count("set_records")?,
        })
    }

    /// `(name, type, count)` for every occurrence name logged in a sport
    fn occurrence_name_counts(&self, sport: SportMode) -> Result<Vec<(String, ExerciseType, usize)>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT o.name, o.exercise_type, COUNT(*)
             FROM exercise_occurrences o
             JOIN sessions s ON s.id = o.session_id
             WHERE s.sport = ?1
             GROUP BY o.name, o.exercise_type",
        )
        .map_err(|e| map_sqlite_error(e, "classify exercise"))?;
        let rows = stmt
            .query_map([sport.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(|e| map_sqlite_error(e, "classify exercise"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_sqlite_error(e, "classify exercise"))?;

        rows.into_iter()
            .map(|(name, exercise_type, count)| {
                Ok((name, parse_exercise_type(&exercise_type)?, count.max(0) as usize))
            })
            .collect()
    }
}

fn insert_set_on(conn: &Connection, set: &RawSetRecord) -> Result<(), StoreError> {
    let (completed, completed_flag) = match set.completed {
        Some(CompletedValue::Count(count)) => (Some(count), None),
        Some(CompletedValue::Flag(flag)) => (None, Some(flag)),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO set_records (
            id, occurrence_id, set_index, reps, weight, attempted, made, distance,
            time_minutes, avg_time_seconds, completed, completed_flag, points
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            set.id,
            set.occurrence_id,
            set.index,
            set.reps,
            set.weight,
            set.attempted,
            set.made,
            set.distance,
            set.time_minutes,
            set.avg_time_seconds,
            completed,
            completed_flag,
            set.points
        ],
    )
    .map_err(|e| map_sqlite_error(e, "insert set"))?;
    Ok(())
}

/// Busy and locked databases surface as timeouts, everything else verbatim
fn map_sqlite_error(err: rusqlite::Error, operation: &str) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Timeout {
            operation: operation.to_string(),
        },
        _ => StoreError::Sqlite(err),
    }
}

fn parse_date(table: &str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| StoreError::InvalidRow {
        table: table.to_string(),
        reason: format!("bad date {:?}: {}", value, e),
    })
}

fn parse_exercise_type(value: &str) -> Result<ExerciseType, StoreError> {
    value.parse().map_err(|reason| StoreError::InvalidRow {
        table: "exercise_occurrences".to_string(),
        reason,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl TrainingStore for SqliteStore {
    fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, StoreError> {
        let from = query.from.map(|d| d.format(DATE_FORMAT).to_string());
        let to = query.to.map(|d| d.format(DATE_FORMAT).to_string());

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, performed_on FROM sessions
             WHERE user_id = ?1 AND sport = ?2
               AND (?3 IS NULL OR performed_on >= ?3)
               AND (?4 IS NULL OR performed_on <= ?4)
             ORDER BY performed_on",
        )
        .map_err(|e| map_sqlite_error(e, "list sessions"))?;
        let rows = stmt
            .query_map(params![query.user_id, query.sport.as_str(), from, to], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| map_sqlite_error(e, "list sessions"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_sqlite_error(e, "list sessions"))?;

        rows.into_iter()
            .map(|(id, performed_on)| {
                Ok(Session {
                    id,
                    performed_on: parse_date("sessions", &performed_on)?,
                })
            })
            .collect()
    }

    fn list_occurrences(
        &self,
        session_ids: &[String],
        exercise_type: ExerciseType,
    ) -> Result<Vec<ExerciseOccurrence>, StoreError> {
        let conn = self.lock();
        let mut occurrences = Vec::new();

        for chunk in session_ids.chunks(MAX_IN_PARAMS) {
            let sql = format!(
                "SELECT o.id, o.session_id, o.name, o.exercise_type, s.performed_on
                 FROM exercise_occurrences o
                 JOIN sessions s ON s.id = o.session_id
                 WHERE o.exercise_type = ? AND o.session_id IN ({})
                 ORDER BY s.performed_on, o.id",
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| map_sqlite_error(e, "list occurrences"))?;
            let bound = std::iter::once(exercise_type.as_str().to_string()).chain(chunk.iter().cloned());
            let rows = stmt
                .query_map(params_from_iter(bound), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(|e| map_sqlite_error(e, "list occurrences"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_sqlite_error(e, "list occurrences"))?;

            for (id, session_id, name, kind, performed_on) in rows {
                occurrences.push(ExerciseOccurrence {
                    id,
                    session_id,
                    name,
                    exercise_type: parse_exercise_type(&kind)?,
                    performed_on: parse_date("sessions", &performed_on)?,
                });
            }
        }

        Ok(occurrences)
    }

    fn list_sets(&self, occurrence_ids: &[String]) -> Result<Vec<SetRecord>, StoreError> {
        let conn = self.lock();
        let mut sets = Vec::new();

        for chunk in occurrence_ids.chunks(MAX_IN_PARAMS) {
            let sql = format!(
                "SELECT id, occurrence_id, set_index, reps, weight, attempted, made, distance,
                        time_minutes, avg_time_seconds, completed, completed_flag, points
                 FROM set_records
                 WHERE occurrence_id IN ({})
                 ORDER BY occurrence_id, set_index",
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| map_sqlite_error(e, "list sets"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    let reps: Option<f64> = row.get("reps")?;
                    let completed = match row.get::<_, Option<f64>>("completed")? {
                        Some(count) => Some(count),
                        None => row
                            .get::<_, Option<bool>>("completed_flag")?
                            .and_then(|flag| CompletedValue::Flag(flag).normalize(reps)),
                    };
                    Ok(SetRecord {
                        id: row.get("id")?,
                        occurrence_id: row.get("occurrence_id")?,
                        index: row.get::<_, i64>("set_index")?.max(0) as u32,
                        reps,
                        weight: row.get("weight")?,
                        attempted: row.get("attempted")?,
                        made: row.get("made")?,
                        distance: row.get("distance")?,
                        time_minutes: row.get("time_minutes")?,
                        avg_time_seconds: row.get("avg_time_seconds")?,
                        completed,
                        points: row.get("points")?,
                    })
                })
                .map_err(|e| map_sqlite_error(e, "list sets"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_sqlite_error(e, "list sets"))?;
            sets.extend(rows);
        }

        Ok(sets)
    }
}

impl ExerciseClassifier for SqliteStore {
    fn primary_exercise_type(&self, sport: SportMode, exercise_query: &str) -> Option<ExerciseType> {
        match self.occurrence_name_counts(sport) {
            Ok(rows) => classify_by_history(
                rows.iter().map(|(name, kind, count)| (name.as_str(), *kind, *count)),
                exercise_query,
                &self.matcher,
            ),
            Err(err) => {
                warn!(sport = %sport, error = %err, "exercise classification failed");
                None
            }
        }
    }
}
