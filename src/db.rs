//src/db.rs
use rusqlite::{named_params, params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Muscle group tag carried on template exercises and propagated into log
/// snapshots and recorded sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Forearms,
    Abs,
    Legs,
    Glutes,
    Hamstrings,
    Calves,
    Quads,
}

// Lenient parse for values coming back from the DB; unknown tags become None
// rather than failing the whole row.
fn muscle_from_db(value: Option<String>) -> Option<MuscleGroup> {
    value.and_then(|s| MuscleGroup::from_str(s.trim()).ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Day {
    pub id: i64,
    pub workout_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExercise {
    pub id: i64,
    pub day_id: i64,
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    pub web_link: Option<String>,
    pub muscle_group: Option<MuscleGroup>,
}

/// One recurrence rule. Keyed by foreign keys; the display names are resolved
/// by joining at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringRule {
    pub id: i64,
    pub workout_id: i64,
    pub day_id: i64,
    pub workout_name: String,
    pub day_name: String,
    /// Unix seconds at local midnight of the day the rule was created.
    pub start_date: i64,
    /// Fixed cadence in days; 0 selects weekday mode.
    pub interval_days: i64,
    /// Comma-separated weekday indices "0..6" (0 = Sunday), or None.
    pub days_of_week: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutLogEntry {
    pub id: i64,
    /// Unix seconds at local midnight.
    pub workout_date: i64,
    pub workout_name: String,
    pub day_name: String,
    /// Elapsed seconds, stamped once the session is saved.
    pub completion_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggedExercise {
    pub id: i64,
    pub workout_log_id: i64,
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    pub web_link: Option<String>,
    pub muscle_group: Option<MuscleGroup>,
}

/// One recorded set result (a `weight_log` row).
#[derive(Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub id: i64,
    pub workout_log_id: i64,
    pub logged_exercise_id: i64,
    pub exercise_name: String,
    pub set_number: i64,
    pub weight: f64,
    pub reps: i64,
    pub muscle_group: Option<MuscleGroup>,
}

/// A finished set handed to the completion save.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSet {
    pub logged_exercise_id: i64,
    pub exercise_name: String,
    pub set_number: i64,
    pub weight: f64,
    pub reps: i64,
    pub muscle_group: Option<MuscleGroup>,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Workout not found: ID {0}")]
    WorkoutNotFound(i64),
    #[error("Workout name must be unique: '{0}' already exists.")]
    WorkoutNameNotUnique(String),
    #[error("Day not found: ID {0}")]
    DayNotFound(i64),
    #[error("Exercise not found: ID {0}")]
    ExerciseNotFound(i64),
    #[error("Workout log entry not found: ID {0}")]
    LogNotFound(i64),
    #[error("Recurring rule not found: ID {0}")]
    RuleNotFound(i64),
    #[error("Days {0} and {1} belong to different workouts")]
    SwapAcrossWorkouts(i64, i64),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
}

const DB_FILE_NAME: &str = "gym-planner.sqlite";

/// Gets the path to the SQLite database file within the app's data directory.
pub fn get_db_path() -> Result<PathBuf, DbError> {
    let data_dir = dirs::data_dir().ok_or(DbError::DataDir)?;
    let app_dir = data_dir.join("gym-planner");
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, DbError> {
    let conn = Connection::open(path).map_err(DbError::Connection)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

/// Initializes the database tables if they don't exist.
pub fn init_db(conn: &Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS workouts (
            workout_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_name TEXT NOT NULL UNIQUE COLLATE NOCASE
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS days (
            day_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_id INTEGER NOT NULL REFERENCES workouts(workout_id),
            day_name TEXT NOT NULL
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exercises (
            exercise_id INTEGER PRIMARY KEY AUTOINCREMENT,
            day_id INTEGER NOT NULL REFERENCES days(day_id),
            exercise_name TEXT NOT NULL,
            sets INTEGER NOT NULL,
            reps INTEGER NOT NULL,
            web_link TEXT,
            muscle_group TEXT
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recurring_workouts (
            recurring_workout_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_id INTEGER NOT NULL REFERENCES workouts(workout_id),
            day_id INTEGER NOT NULL REFERENCES days(day_id),
            start_date INTEGER NOT NULL,
            interval_days INTEGER NOT NULL DEFAULT 0,
            days_of_week TEXT
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workout_log (
            workout_log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_date INTEGER NOT NULL, -- unix seconds at local midnight
            workout_name TEXT NOT NULL,
            day_name TEXT NOT NULL,
            completion_time INTEGER
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS logged_exercises (
            logged_exercise_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_log_id INTEGER NOT NULL REFERENCES workout_log(workout_log_id),
            exercise_name TEXT NOT NULL,
            sets INTEGER NOT NULL,
            reps INTEGER NOT NULL,
            web_link TEXT,
            muscle_group TEXT
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS weight_log (
            weight_log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_log_id INTEGER NOT NULL REFERENCES workout_log(workout_log_id),
            logged_exercise_id INTEGER NOT NULL REFERENCES logged_exercises(logged_exercise_id),
            exercise_name TEXT NOT NULL,
            set_number INTEGER NOT NULL,
            weight_logged REAL NOT NULL,
            reps_logged INTEGER NOT NULL,
            muscle_group TEXT,
            UNIQUE(workout_log_id, logged_exercise_id, set_number)
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_days_workout ON days(workout_id)",
        [],
    )
    .map_err(DbError::Connection)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exercises_day ON exercises(day_id)",
        [],
    )
    .map_err(DbError::Connection)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_log_date ON workout_log(workout_date)",
        [],
    )
    .map_err(DbError::Connection)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_logged_exercises_log ON logged_exercises(workout_log_id)",
        [],
    )
    .map_err(DbError::Connection)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_weight_log_exercise ON weight_log(exercise_name, set_number)",
        [],
    )
    .map_err(DbError::Connection)?;

    // Databases created before exercise links/tags existed lack these columns
    add_column_if_not_exists(conn, "exercises", "web_link", "TEXT")?;
    add_column_if_not_exists(conn, "exercises", "muscle_group", "TEXT")?;
    add_column_if_not_exists(conn, "logged_exercises", "web_link", "TEXT")?;
    add_column_if_not_exists(conn, "logged_exercises", "muscle_group", "TEXT")?;

    Ok(())
}

/// Adds a column via ALTER TABLE if it is missing, for upgrading databases
/// created by earlier versions.
fn add_column_if_not_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for column_result in columns {
        if column_result? == column {
            return Ok(());
        }
    }
    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])?;
    Ok(())
}

// ---- Workout template functions ----

/// Creates a new workout template. Handles the UNIQUE name constraint.
pub fn create_workout(conn: &Connection, name: &str) -> Result<i64, DbError> {
    match conn.execute(
        "INSERT INTO workouts (workout_name) VALUES (?1)",
        params![name],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) => {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return Err(DbError::WorkoutNameNotUnique(name.to_string()));
                }
            }
            Err(DbError::InsertFailed(e))
        }
    }
}

pub fn get_workout_by_id(conn: &Connection, id: i64) -> Result<Option<Workout>, DbError> {
    let mut stmt = conn
        .prepare("SELECT workout_id, workout_name FROM workouts WHERE workout_id = ?1")
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], |row| {
        Ok(Workout {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
    .optional()
    .map_err(DbError::QueryFailed)
}

pub fn get_workout_by_name(conn: &Connection, name: &str) -> Result<Option<Workout>, DbError> {
    let mut stmt = conn
        .prepare("SELECT workout_id, workout_name FROM workouts WHERE workout_name = ?1 COLLATE NOCASE")
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![name], |row| {
        Ok(Workout {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
    .optional()
    .map_err(DbError::QueryFailed)
}

pub fn list_workouts(conn: &Connection) -> Result<Vec<Workout>, DbError> {
    let mut stmt = conn
        .prepare("SELECT workout_id, workout_name FROM workouts ORDER BY workout_name ASC")
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map([], |row| {
            Ok(Workout {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

/// Renames a workout template. Future-dated log headers follow the template;
/// past logs keep the name they were recorded under.
pub fn rename_workout(
    conn: &mut Connection,
    id: i64,
    new_name: &str,
    today: i64,
) -> Result<(), DbError> {
    let workout = get_workout_by_id(conn, id)?.ok_or(DbError::WorkoutNotFound(id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    match tx.execute(
        "UPDATE workouts SET workout_name = ?1 WHERE workout_id = ?2",
        params![new_name, id],
    ) {
        Ok(_) => {}
        Err(e) => {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return Err(DbError::WorkoutNameNotUnique(new_name.to_string()));
                }
            }
            return Err(DbError::UpdateFailed(e));
        }
    }
    tx.execute(
        "UPDATE workout_log SET workout_name = :new
         WHERE workout_name = :old AND workout_date >= :today",
        named_params! { ":new": new_name, ":old": workout.name, ":today": today },
    )
    .map_err(DbError::UpdateFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

/// Deletes a workout template with its days, exercises, recurring rules and
/// future-dated logs, all in one transaction.
pub fn delete_workout(conn: &mut Connection, id: i64, today: i64) -> Result<(), DbError> {
    let workout = get_workout_by_id(conn, id)?.ok_or(DbError::WorkoutNotFound(id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    delete_future_logs_in_tx(&tx, &workout.name, None, today)?;
    tx.execute(
        "DELETE FROM recurring_workouts WHERE workout_id = ?1",
        params![id],
    )
    .map_err(DbError::DeleteFailed)?;
    tx.execute(
        "DELETE FROM exercises WHERE day_id IN (SELECT day_id FROM days WHERE workout_id = ?1)",
        params![id],
    )
    .map_err(DbError::DeleteFailed)?;
    tx.execute("DELETE FROM days WHERE workout_id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    tx.execute("DELETE FROM workouts WHERE workout_id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

// ---- Day functions ----

pub fn get_day(conn: &Connection, id: i64) -> Result<Option<Day>, DbError> {
    let mut stmt = conn
        .prepare("SELECT day_id, workout_id, day_name FROM days WHERE day_id = ?1")
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], map_row_to_day)
        .optional()
        .map_err(DbError::QueryFailed)
}

pub fn get_day_by_name(
    conn: &Connection,
    workout_id: i64,
    day_name: &str,
) -> Result<Option<Day>, DbError> {
    let mut stmt = conn
        .prepare("SELECT day_id, workout_id, day_name FROM days WHERE workout_id = ?1 AND day_name = ?2")
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![workout_id, day_name], map_row_to_day)
        .optional()
        .map_err(DbError::QueryFailed)
}

/// Lists a workout's days. `day_id` order is the display order; reordering is
/// done by swapping ids.
pub fn list_days(conn: &Connection, workout_id: i64) -> Result<Vec<Day>, DbError> {
    let mut stmt = conn
        .prepare("SELECT day_id, workout_id, day_name FROM days WHERE workout_id = ?1 ORDER BY day_id ASC")
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params![workout_id], map_row_to_day)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

fn map_row_to_day(row: &Row) -> Result<Day, rusqlite::Error> {
    Ok(Day {
        id: row.get(0)?,
        workout_id: row.get(1)?,
        name: row.get(2)?,
    })
}

pub fn add_day(conn: &mut Connection, workout_id: i64, name: &str, today: i64) -> Result<i64, DbError> {
    if get_workout_by_id(conn, workout_id)?.is_none() {
        return Err(DbError::WorkoutNotFound(workout_id));
    }
    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(
        "INSERT INTO days (workout_id, day_name) VALUES (?1, ?2)",
        params![workout_id, name],
    )
    .map_err(DbError::InsertFailed)?;
    let id = tx.last_insert_rowid();
    sync_future_logs_in_tx(&tx, workout_id, today)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(id)
}

/// Renames a day and carries the new name onto its future-dated logs.
pub fn rename_day(conn: &mut Connection, day_id: i64, new_name: &str, today: i64) -> Result<(), DbError> {
    let day = get_day(conn, day_id)?.ok_or(DbError::DayNotFound(day_id))?;
    let workout = get_workout_by_id(conn, day.workout_id)?
        .ok_or(DbError::WorkoutNotFound(day.workout_id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(
        "UPDATE days SET day_name = ?1 WHERE day_id = ?2",
        params![new_name, day_id],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE workout_log SET day_name = :new
         WHERE workout_name = :workout AND day_name = :old AND workout_date >= :today",
        named_params! {
            ":new": new_name,
            ":workout": workout.name,
            ":old": day.name,
            ":today": today,
        },
    )
    .map_err(DbError::UpdateFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

/// Deletes a day, its exercises, any recurring rules bound to it, and every
/// future-dated log of that (workout, day) pair. Atomic: a failure partway
/// through rolls the whole delete back.
pub fn delete_day(conn: &mut Connection, day_id: i64, today: i64) -> Result<(), DbError> {
    let day = get_day(conn, day_id)?.ok_or(DbError::DayNotFound(day_id))?;
    let workout = get_workout_by_id(conn, day.workout_id)?
        .ok_or(DbError::WorkoutNotFound(day.workout_id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    delete_future_logs_in_tx(&tx, &workout.name, Some(&day.name), today)?;
    tx.execute(
        "DELETE FROM recurring_workouts WHERE day_id = ?1",
        params![day_id],
    )
    .map_err(DbError::DeleteFailed)?;
    tx.execute("DELETE FROM exercises WHERE day_id = ?1", params![day_id])
        .map_err(DbError::DeleteFailed)?;
    tx.execute("DELETE FROM days WHERE day_id = ?1", params![day_id])
        .map_err(DbError::DeleteFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

/// Swaps the `day_id` values of two days of the same workout, atomically.
/// Goes through a sentinel id since day_id is the primary key.
pub fn swap_days(conn: &mut Connection, day_a: i64, day_b: i64) -> Result<(), DbError> {
    let a = get_day(conn, day_a)?.ok_or(DbError::DayNotFound(day_a))?;
    let b = get_day(conn, day_b)?.ok_or(DbError::DayNotFound(day_b))?;
    if a.workout_id != b.workout_id {
        return Err(DbError::SwapAcrossWorkouts(day_a, day_b));
    }

    let tx = conn.transaction().map_err(DbError::Connection)?;
    // The three-way swap leaves dangling references mid-flight; check foreign
    // keys at commit instead.
    tx.execute("PRAGMA defer_foreign_keys = ON", [])
        .map_err(DbError::UpdateFailed)?;
    tx.execute("UPDATE days SET day_id = -1 WHERE day_id = ?1", params![day_a])
        .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE exercises SET day_id = -1 WHERE day_id = ?1",
        params![day_a],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE recurring_workouts SET day_id = -1 WHERE day_id = ?1",
        params![day_a],
    )
    .map_err(DbError::UpdateFailed)?;

    tx.execute(
        "UPDATE days SET day_id = ?1 WHERE day_id = ?2",
        params![day_a, day_b],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE exercises SET day_id = ?1 WHERE day_id = ?2",
        params![day_a, day_b],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE recurring_workouts SET day_id = ?1 WHERE day_id = ?2",
        params![day_a, day_b],
    )
    .map_err(DbError::UpdateFailed)?;

    tx.execute("UPDATE days SET day_id = ?1 WHERE day_id = -1", params![day_b])
        .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE exercises SET day_id = ?1 WHERE day_id = -1",
        params![day_b],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.execute(
        "UPDATE recurring_workouts SET day_id = ?1 WHERE day_id = -1",
        params![day_b],
    )
    .map_err(DbError::UpdateFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

// ---- Template exercise functions ----

fn map_row_to_template_exercise(row: &Row) -> Result<TemplateExercise, rusqlite::Error> {
    Ok(TemplateExercise {
        id: row.get(0)?,
        day_id: row.get(1)?,
        name: row.get(2)?,
        sets: row.get(3)?,
        reps: row.get(4)?,
        web_link: row.get(5)?,
        muscle_group: muscle_from_db(row.get(6)?),
    })
}

pub fn list_exercises_for_day(
    conn: &Connection,
    day_id: i64,
) -> Result<Vec<TemplateExercise>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT exercise_id, day_id, exercise_name, sets, reps, web_link, muscle_group
             FROM exercises WHERE day_id = ?1 ORDER BY exercise_id ASC",
        )
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params![day_id], map_row_to_template_exercise)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

pub fn get_exercise(conn: &Connection, id: i64) -> Result<Option<TemplateExercise>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT exercise_id, day_id, exercise_name, sets, reps, web_link, muscle_group
             FROM exercises WHERE exercise_id = ?1",
        )
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], map_row_to_template_exercise)
        .optional()
        .map_err(DbError::QueryFailed)
}

/// Adds an exercise to a day and re-syncs future-dated log snapshots of the
/// owning workout within the same transaction.
pub fn add_exercise(
    conn: &mut Connection,
    day_id: i64,
    name: &str,
    sets: i64,
    reps: i64,
    web_link: Option<&str>,
    muscle_group: Option<MuscleGroup>,
    today: i64,
) -> Result<i64, DbError> {
    let day = get_day(conn, day_id)?.ok_or(DbError::DayNotFound(day_id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(
        "INSERT INTO exercises (day_id, exercise_name, sets, reps, web_link, muscle_group)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![day_id, name, sets, reps, web_link, muscle_group.map(|m| m.to_string())],
    )
    .map_err(DbError::InsertFailed)?;
    let id = tx.last_insert_rowid();
    sync_future_logs_in_tx(&tx, day.workout_id, today)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(id)
}

/// Partial update of a template exercise with a dynamically built SET list,
/// followed by future-log re-sync in the same transaction.
pub fn update_exercise(
    conn: &mut Connection,
    id: i64,
    new_name: Option<&str>,
    new_sets: Option<i64>,
    new_reps: Option<i64>,
    new_web_link: Option<Option<&str>>,
    new_muscle_group: Option<Option<MuscleGroup>>,
    today: i64,
) -> Result<(), DbError> {
    let exercise = get_exercise(conn, id)?.ok_or(DbError::ExerciseNotFound(id))?;
    let day = get_day(conn, exercise.day_id)?.ok_or(DbError::DayNotFound(exercise.day_id))?;

    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
    let mut updates = Vec::new();

    if let Some(name) = new_name {
        updates.push("exercise_name = :name");
        params_map.insert(":name".into(), Box::new(name.to_string()));
    }
    if let Some(s) = new_sets {
        updates.push("sets = :sets");
        params_map.insert(":sets".into(), Box::new(s));
    }
    if let Some(r) = new_reps {
        updates.push("reps = :reps");
        params_map.insert(":reps".into(), Box::new(r));
    }
    if let Some(link) = new_web_link {
        updates.push("web_link = :link");
        params_map.insert(":link".into(), Box::new(link.map(str::to_string)));
    }
    if let Some(mg) = new_muscle_group {
        updates.push("muscle_group = :muscle");
        params_map.insert(":muscle".into(), Box::new(mg.map(|m| m.to_string())));
    }
    if updates.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE exercises SET {} WHERE exercise_id = :id",
        updates.join(", ")
    );
    params_map.insert(":id".into(), Box::new(id));
    let params_for_exec: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();

    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(&sql, params_for_exec.as_slice())
        .map_err(DbError::UpdateFailed)?;
    sync_future_logs_in_tx(&tx, day.workout_id, today)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

/// Deletes a template exercise and removes it from future-dated log
/// snapshots, atomically.
pub fn delete_exercise(conn: &mut Connection, id: i64, today: i64) -> Result<(), DbError> {
    let exercise = get_exercise(conn, id)?.ok_or(DbError::ExerciseNotFound(id))?;
    let day = get_day(conn, exercise.day_id)?.ok_or(DbError::DayNotFound(exercise.day_id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute("DELETE FROM exercises WHERE exercise_id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    sync_future_logs_in_tx(&tx, day.workout_id, today)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

// ---- Template-edit propagation ----

/// Re-snapshots `logged_exercises` for every future-dated log of a workout
/// so scheduled sessions always reflect the current template. Past logs are
/// never rewritten. Must run inside the caller's transaction.
fn sync_future_logs_in_tx(tx: &Connection, workout_id: i64, today: i64) -> Result<(), DbError> {
    let workout_name: String = tx
        .query_row(
            "SELECT workout_name FROM workouts WHERE workout_id = ?1",
            params![workout_id],
            |row| row.get(0),
        )
        .map_err(DbError::QueryFailed)?;

    let logs: Vec<(i64, String)> = {
        let mut stmt = tx
            .prepare(
                "SELECT workout_log_id, day_name FROM workout_log
                 WHERE workout_name = ?1 AND workout_date >= ?2",
            )
            .map_err(DbError::QueryFailed)?;
        let iter = stmt
            .query_map(params![workout_name, today], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(DbError::QueryFailed)?;
        iter.collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?
    };

    for (log_id, day_name) in logs {
        let day = {
            let mut stmt = tx
                .prepare("SELECT day_id FROM days WHERE workout_id = ?1 AND day_name = ?2")
                .map_err(DbError::QueryFailed)?;
            stmt.query_row(params![workout_id, day_name], |row| row.get::<_, i64>(0))
                .optional()
                .map_err(DbError::QueryFailed)?
        };
        // A log for a day that no longer exists (e.g. renamed) is left as is.
        let Some(day_id) = day else { continue };

        // Set records against the old snapshot rows go with them.
        tx.execute(
            "DELETE FROM weight_log WHERE workout_log_id = ?1",
            params![log_id],
        )
        .map_err(DbError::DeleteFailed)?;
        tx.execute(
            "DELETE FROM logged_exercises WHERE workout_log_id = ?1",
            params![log_id],
        )
        .map_err(DbError::DeleteFailed)?;
        tx.execute(
            "INSERT INTO logged_exercises
                 (workout_log_id, exercise_name, sets, reps, web_link, muscle_group)
             SELECT ?1, exercise_name, sets, reps, web_link, muscle_group
             FROM exercises WHERE day_id = ?2 ORDER BY exercise_id ASC",
            params![log_id, day_id],
        )
        .map_err(DbError::InsertFailed)?;
    }
    Ok(())
}

fn delete_future_logs_in_tx(
    tx: &Connection,
    workout_name: &str,
    day_name: Option<&str>,
    today: i64,
) -> Result<(), DbError> {
    let log_ids: Vec<i64> = {
        let mut sql = "SELECT workout_log_id FROM workout_log
                       WHERE workout_name = :workout AND workout_date >= :today"
            .to_string();
        let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
        params_map.insert(":workout".into(), Box::new(workout_name.to_string()));
        params_map.insert(":today".into(), Box::new(today));
        if let Some(day) = day_name {
            sql.push_str(" AND day_name = :day");
            params_map.insert(":day".into(), Box::new(day.to_string()));
        }
        let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
            .collect();
        let mut stmt = tx.prepare(&sql).map_err(DbError::QueryFailed)?;
        let iter = stmt
            .query_map(params_for_query.as_slice(), |row| row.get(0))
            .map_err(DbError::QueryFailed)?;
        iter.collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?
    };

    for log_id in log_ids {
        tx.execute(
            "DELETE FROM weight_log WHERE workout_log_id = ?1",
            params![log_id],
        )
        .map_err(DbError::DeleteFailed)?;
        tx.execute(
            "DELETE FROM logged_exercises WHERE workout_log_id = ?1",
            params![log_id],
        )
        .map_err(DbError::DeleteFailed)?;
        tx.execute(
            "DELETE FROM workout_log WHERE workout_log_id = ?1",
            params![log_id],
        )
        .map_err(DbError::DeleteFailed)?;
    }
    Ok(())
}

// ---- Workout log functions ----

fn map_row_to_log_entry(row: &Row) -> Result<WorkoutLogEntry, rusqlite::Error> {
    Ok(WorkoutLogEntry {
        id: row.get(0)?,
        workout_date: row.get(1)?,
        workout_name: row.get(2)?,
        day_name: row.get(3)?,
        completion_time: row.get(4)?,
    })
}

pub fn get_log(conn: &Connection, id: i64) -> Result<Option<WorkoutLogEntry>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT workout_log_id, workout_date, workout_name, day_name, completion_time
             FROM workout_log WHERE workout_log_id = ?1",
        )
        .map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], map_row_to_log_entry)
        .optional()
        .map_err(DbError::QueryFailed)
}

#[derive(Default, Debug, Clone, Copy)]
pub struct LogFilters {
    /// Only logs with `workout_date >=` this value.
    pub on_or_after: Option<i64>,
    /// Only logs with `workout_date <` this value.
    pub before: Option<i64>,
    pub limit: Option<u32>,
}

pub fn list_logs(conn: &Connection, filters: &LogFilters) -> Result<Vec<WorkoutLogEntry>, DbError> {
    let mut sql = "SELECT workout_log_id, workout_date, workout_name, day_name, completion_time
                   FROM workout_log WHERE 1=1"
        .to_string();
    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();

    if let Some(start) = filters.on_or_after {
        sql.push_str(" AND workout_date >= :start");
        params_map.insert(":start".into(), Box::new(start));
    }
    if let Some(end) = filters.before {
        sql.push_str(" AND workout_date < :end");
        params_map.insert(":end".into(), Box::new(end));
    }
    sql.push_str(" ORDER BY workout_date DESC, workout_log_id DESC");
    if let Some(limit) = filters.limit {
        sql.push_str(" LIMIT :limit");
        params_map.insert(":limit".into(), Box::new(limit));
    }

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params_for_query.as_slice(), map_row_to_log_entry)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

/// True when a log already exists for this exact (date, workout, day) triple.
/// This existence check is the recurrence engine's sole idempotency guard.
pub fn log_exists(
    conn: &Connection,
    workout_date: i64,
    workout_name: &str,
    day_name: &str,
) -> Result<bool, DbError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM workout_log
             WHERE workout_date = ?1 AND workout_name = ?2 AND day_name = ?3",
            params![workout_date, workout_name, day_name],
            |row| row.get(0),
        )
        .map_err(DbError::QueryFailed)?;
    Ok(count > 0)
}

/// Inserts a log header for a date and snapshots the day's current exercises
/// into `logged_exercises`, in one transaction. Returns the new log id.
pub fn insert_log_with_snapshot(
    conn: &mut Connection,
    day_id: i64,
    workout_date: i64,
) -> Result<i64, DbError> {
    let day = get_day(conn, day_id)?.ok_or(DbError::DayNotFound(day_id))?;
    let workout = get_workout_by_id(conn, day.workout_id)?
        .ok_or(DbError::WorkoutNotFound(day.workout_id))?;

    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(
        "INSERT INTO workout_log (workout_date, workout_name, day_name) VALUES (?1, ?2, ?3)",
        params![workout_date, workout.name, day.name],
    )
    .map_err(DbError::InsertFailed)?;
    let log_id = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO logged_exercises
             (workout_log_id, exercise_name, sets, reps, web_link, muscle_group)
         SELECT ?1, exercise_name, sets, reps, web_link, muscle_group
         FROM exercises WHERE day_id = ?2 ORDER BY exercise_id ASC",
        params![log_id, day_id],
    )
    .map_err(DbError::InsertFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(log_id)
}

/// Deletes a log with its exercise snapshot and recorded sets.
pub fn delete_log(conn: &mut Connection, id: i64) -> Result<(), DbError> {
    if get_log(conn, id)?.is_none() {
        return Err(DbError::LogNotFound(id));
    }
    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute("DELETE FROM weight_log WHERE workout_log_id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    tx.execute(
        "DELETE FROM logged_exercises WHERE workout_log_id = ?1",
        params![id],
    )
    .map_err(DbError::DeleteFailed)?;
    tx.execute("DELETE FROM workout_log WHERE workout_log_id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

fn map_row_to_logged_exercise(row: &Row) -> Result<LoggedExercise, rusqlite::Error> {
    Ok(LoggedExercise {
        id: row.get(0)?,
        workout_log_id: row.get(1)?,
        name: row.get(2)?,
        sets: row.get(3)?,
        reps: row.get(4)?,
        web_link: row.get(5)?,
        muscle_group: muscle_from_db(row.get(6)?),
    })
}

/// The exercise snapshot of a log, in `logged_exercise_id` order (the order
/// the session walks through them).
pub fn list_logged_exercises(
    conn: &Connection,
    workout_log_id: i64,
) -> Result<Vec<LoggedExercise>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT logged_exercise_id, workout_log_id, exercise_name, sets, reps, web_link, muscle_group
             FROM logged_exercises WHERE workout_log_id = ?1 ORDER BY logged_exercise_id ASC",
        )
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params![workout_log_id], map_row_to_logged_exercise)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

// ---- Weight log functions ----

fn map_row_to_set_record(row: &Row) -> Result<SetRecord, rusqlite::Error> {
    Ok(SetRecord {
        id: row.get(0)?,
        workout_log_id: row.get(1)?,
        logged_exercise_id: row.get(2)?,
        exercise_name: row.get(3)?,
        set_number: row.get(4)?,
        weight: row.get(5)?,
        reps: row.get(6)?,
        muscle_group: muscle_from_db(row.get(7)?),
    })
}

pub fn list_set_records(
    conn: &Connection,
    workout_log_id: i64,
) -> Result<Vec<SetRecord>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT weight_log_id, workout_log_id, logged_exercise_id, exercise_name,
                    set_number, weight_logged, reps_logged, muscle_group
             FROM weight_log WHERE workout_log_id = ?1
             ORDER BY logged_exercise_id ASC, set_number ASC",
        )
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params![workout_log_id], map_row_to_set_record)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

/// All recorded sets across all logs with the session date, newest first.
/// Drives the CSV export.
pub fn list_all_set_records(conn: &Connection) -> Result<Vec<(i64, SetRecord)>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT wl.weight_log_id, wl.workout_log_id, wl.logged_exercise_id, wl.exercise_name,
                    wl.set_number, wl.weight_logged, wl.reps_logged, wl.muscle_group, l.workout_date
             FROM weight_log wl
             JOIN workout_log l ON wl.workout_log_id = l.workout_log_id
             ORDER BY l.workout_date DESC, wl.logged_exercise_id ASC, wl.set_number ASC",
        )
        .map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map([], |row| {
            let record = map_row_to_set_record(row)?;
            let date: i64 = row.get(8)?;
            Ok((date, record))
        })
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

/// Records or overwrites one set result. The UNIQUE constraint on
/// (log, exercise, set_number) turns re-records into updates.
pub fn upsert_set_record(
    conn: &Connection,
    workout_log_id: i64,
    logged_exercise_id: i64,
    exercise_name: &str,
    set_number: i64,
    weight: f64,
    reps: i64,
    muscle_group: Option<MuscleGroup>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO weight_log
             (workout_log_id, logged_exercise_id, exercise_name, set_number,
              weight_logged, reps_logged, muscle_group)
         VALUES (:log, :exercise, :name, :set, :weight, :reps, :muscle)
         ON CONFLICT(workout_log_id, logged_exercise_id, set_number)
         DO UPDATE SET weight_logged = :weight, reps_logged = :reps",
        named_params! {
            ":log": workout_log_id,
            ":exercise": logged_exercise_id,
            ":name": exercise_name,
            ":set": set_number,
            ":weight": weight,
            ":reps": reps,
            ":muscle": muscle_group.map(|m| m.to_string()),
        },
    )
    .map_err(DbError::InsertFailed)?;
    Ok(conn.last_insert_rowid())
}

/// For each (exercise_name, set_number) among `exercise_names`, the weight
/// recorded in the most recent log that has one. Feeds session auto-fill.
pub fn last_weights(
    conn: &Connection,
    exercise_names: &[String],
) -> Result<HashMap<(String, i64), f64>, DbError> {
    if exercise_names.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = exercise_names
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT wl.exercise_name, wl.set_number, wl.weight_logged
         FROM weight_log wl
         INNER JOIN (
           SELECT exercise_name, set_number, MAX(workout_log_id) AS max_log_id
           FROM weight_log
           WHERE exercise_name IN ({placeholders})
           GROUP BY exercise_name, set_number
         ) latest
         ON wl.exercise_name = latest.exercise_name
         AND wl.set_number = latest.set_number
         AND wl.workout_log_id = latest.max_log_id"
    );
    let params_for_query: Vec<&dyn ToSql> =
        exercise_names.iter().map(|n| n as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map(params_for_query.as_slice(), |row| {
            let name: String = row.get(0)?;
            let set_number: i64 = row.get(1)?;
            let weight: f64 = row.get(2)?;
            Ok(((name, set_number), weight))
        })
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<HashMap<_, _>, _>>()
        .map_err(DbError::QueryFailed)
}

/// Persists a completed session: stamps `completion_time` and inserts every
/// logged set, in a single transaction. Any failure rolls back the stamp and
/// all inserts so a retry starts from a clean slate.
pub fn save_completed_session(
    conn: &mut Connection,
    workout_log_id: i64,
    duration_secs: i64,
    sets: &[CompletedSet],
) -> Result<(), DbError> {
    if get_log(conn, workout_log_id)?.is_none() {
        return Err(DbError::LogNotFound(workout_log_id));
    }
    let tx = conn.transaction().map_err(DbError::Connection)?;
    tx.execute(
        "UPDATE workout_log SET completion_time = ?1 WHERE workout_log_id = ?2",
        params![duration_secs, workout_log_id],
    )
    .map_err(DbError::UpdateFailed)?;
    for set in sets {
        tx.execute(
            "INSERT INTO weight_log
                 (workout_log_id, logged_exercise_id, exercise_name, set_number,
                  weight_logged, reps_logged, muscle_group)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workout_log_id,
                set.logged_exercise_id,
                set.exercise_name,
                set.set_number,
                set.weight,
                set.reps,
                set.muscle_group.map(|m| m.to_string()),
            ],
        )
        .map_err(DbError::InsertFailed)?;
    }
    tx.commit().map_err(DbError::Connection)?;
    Ok(())
}

// ---- Recurring rule functions ----

fn map_row_to_rule(row: &Row) -> Result<RecurringRule, rusqlite::Error> {
    Ok(RecurringRule {
        id: row.get(0)?,
        workout_id: row.get(1)?,
        day_id: row.get(2)?,
        workout_name: row.get(3)?,
        day_name: row.get(4)?,
        start_date: row.get(5)?,
        interval_days: row.get(6)?,
        days_of_week: row.get(7)?,
    })
}

const RULE_SELECT: &str = "SELECT r.recurring_workout_id, r.workout_id, r.day_id,
            w.workout_name, d.day_name, r.start_date, r.interval_days, r.days_of_week
     FROM recurring_workouts r
     JOIN workouts w ON r.workout_id = w.workout_id
     JOIN days d ON r.day_id = d.day_id";

pub fn list_rules(conn: &Connection) -> Result<Vec<RecurringRule>, DbError> {
    let sql = format!("{RULE_SELECT} ORDER BY w.workout_name ASC, d.day_name ASC");
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    let iter = stmt
        .query_map([], map_row_to_rule)
        .map_err(DbError::QueryFailed)?;
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

pub fn get_rule(conn: &Connection, id: i64) -> Result<Option<RecurringRule>, DbError> {
    let sql = format!("{RULE_SELECT} WHERE r.recurring_workout_id = ?1");
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], map_row_to_rule)
        .optional()
        .map_err(DbError::QueryFailed)
}

pub fn create_rule(
    conn: &Connection,
    day_id: i64,
    start_date: i64,
    interval_days: i64,
    days_of_week: Option<&str>,
) -> Result<i64, DbError> {
    let day = get_day(conn, day_id)?.ok_or(DbError::DayNotFound(day_id))?;
    conn.execute(
        "INSERT INTO recurring_workouts (workout_id, day_id, start_date, interval_days, days_of_week)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![day.workout_id, day_id, start_date, interval_days, days_of_week],
    )
    .map_err(DbError::InsertFailed)?;
    Ok(conn.last_insert_rowid())
}

pub fn update_rule(
    conn: &Connection,
    id: i64,
    new_interval_days: Option<i64>,
    new_days_of_week: Option<Option<&str>>,
) -> Result<(), DbError> {
    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
    let mut updates = Vec::new();

    if let Some(interval) = new_interval_days {
        updates.push("interval_days = :interval");
        params_map.insert(":interval".into(), Box::new(interval));
    }
    if let Some(days) = new_days_of_week {
        updates.push("days_of_week = :days");
        params_map.insert(":days".into(), Box::new(days.map(str::to_string)));
    }
    if updates.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE recurring_workouts SET {} WHERE recurring_workout_id = :id",
        updates.join(", ")
    );
    params_map.insert(":id".into(), Box::new(id));
    let params_for_exec: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();

    let rows_affected = conn
        .execute(&sql, params_for_exec.as_slice())
        .map_err(DbError::UpdateFailed)?;
    if rows_affected == 0 {
        Err(DbError::RuleNotFound(id))
    } else {
        Ok(())
    }
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<(), DbError> {
    let rows_affected = conn
        .execute(
            "DELETE FROM recurring_workouts WHERE recurring_workout_id = ?1",
            params![id],
        )
        .map_err(DbError::DeleteFailed)?;
    if rows_affected == 0 {
        Err(DbError::RuleNotFound(id))
    } else {
        Ok(())
    }
}
