use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

// --- Declare modules ---
mod config;
pub mod db;
pub mod recurrence;
pub mod session;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util, parse_color,
    save_config as save_config_util, Config, ConfigError, StandardColor, ThemeConfig, Units,
};

pub use db::{
    get_db_path as get_db_path_util, CompletedSet, Day, DbError, LogFilters, LoggedExercise,
    MuscleGroup, RecurringRule, SetRecord, TemplateExercise, Workout, WorkoutLogEntry,
};

pub use recurrence::{
    date_from_timestamp, local_midnight, next_occurrence, today_local, Cadence, ReconcileReport,
};

pub use session::{
    Outcome, Session, SessionError, SessionEvent, SessionSet, SetStatus, Stage, TimerSnapshot,
};

/// Partial update for a template exercise. `None` leaves a field untouched;
/// the nested options clear the optional fields.
#[derive(Default)]
pub struct EditExerciseParams {
    pub id: i64,
    pub new_name: Option<String>,
    pub new_sets: Option<i64>,
    pub new_reps: Option<i64>,
    pub new_web_link: Option<Option<String>>,
    pub new_muscle_group: Option<Option<MuscleGroup>>,
}

/// Everything known about one log entry.
pub struct LogDetails {
    pub entry: WorkoutLogEntry,
    pub exercises: Vec<LoggedExercise>,
    pub sets: Vec<SetRecord>,
}

pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .context(format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        db::init_db(&conn).context("Failed to initialize database schema")?;

        Ok(Self {
            config,
            conn,
            db_path,
            config_path,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save_config(&self.config_path, &self.config)
    }

    pub fn set_units(&mut self, units: Units) -> Result<(), ConfigError> {
        self.config.units = units;
        self.save_config()
    }

    /// Sets the rest after a set, in seconds.
    /// # Errors
    /// Returns `ConfigError::InvalidRestDuration` for zero.
    pub fn set_rest_between_sets(&mut self, secs: u64) -> Result<(), ConfigError> {
        if secs == 0 {
            return Err(ConfigError::InvalidRestDuration);
        }
        self.config.rest_between_sets_secs = secs;
        self.save_config()
    }

    /// Sets the rest between exercises, in seconds.
    /// # Errors
    /// Returns `ConfigError::InvalidRestDuration` for zero.
    pub fn set_rest_between_exercises(&mut self, secs: u64) -> Result<(), ConfigError> {
        if secs == 0 {
            return Err(ConfigError::InvalidRestDuration);
        }
        self.config.rest_between_exercises_secs = secs;
        self.save_config()
    }

    pub fn set_auto_fill_weight(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.auto_fill_weight = enabled;
        self.save_config()
    }

    pub fn set_auto_fill_reps(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.auto_fill_reps = enabled;
        self.save_config()
    }

    /// Today's date as the stored midnight timestamp.
    fn today_ts(&self) -> i64 {
        recurrence::local_midnight(recurrence::today_local())
    }

    // --- Workout templates ---

    /// Creates a workout template with a unique name.
    /// # Errors
    /// Returns an error if the name is empty or already taken.
    pub fn create_workout(&self, name: &str) -> Result<i64> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("Workout name cannot be empty.");
        }
        db::create_workout(&self.conn, trimmed)
            .with_context(|| format!("Failed to create workout '{trimmed}'"))
    }

    /// Looks a workout up by numeric id or by name.
    /// # Errors
    /// Returns an error if no workout matches.
    pub fn resolve_workout(&self, identifier: &str) -> Result<Workout> {
        let found = if let Ok(id) = identifier.trim().parse::<i64>() {
            db::get_workout_by_id(&self.conn, id)?
        } else {
            db::get_workout_by_name(&self.conn, identifier.trim())?
        };
        found.ok_or_else(|| anyhow::anyhow!("Workout '{identifier}' not found."))
    }

    pub fn list_workouts(&self) -> Result<Vec<Workout>> {
        db::list_workouts(&self.conn).context("Failed to list workouts")
    }

    pub fn rename_workout(&mut self, identifier: &str, new_name: &str) -> Result<()> {
        let workout = self.resolve_workout(identifier)?;
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            bail!("Workout name cannot be empty.");
        }
        let today = self.today_ts();
        db::rename_workout(&mut self.conn, workout.id, trimmed, today)
            .with_context(|| format!("Failed to rename workout '{identifier}'"))
    }

    /// Deletes a template along with its days, exercises, recurring rules and
    /// future scheduled sessions. Past history is untouched.
    pub fn delete_workout(&mut self, identifier: &str) -> Result<()> {
        let workout = self.resolve_workout(identifier)?;
        let today = self.today_ts();
        db::delete_workout(&mut self.conn, workout.id, today)
            .with_context(|| format!("Failed to delete workout '{identifier}'"))
    }

    // --- Days ---

    pub fn add_day(&mut self, workout_identifier: &str, day_name: &str) -> Result<i64> {
        let workout = self.resolve_workout(workout_identifier)?;
        let trimmed = day_name.trim();
        if trimmed.is_empty() {
            bail!("Day name cannot be empty.");
        }
        if db::get_day_by_name(&self.conn, workout.id, trimmed)?.is_some() {
            bail!("Workout '{}' already has a day named '{trimmed}'.", workout.name);
        }
        let today = self.today_ts();
        db::add_day(&mut self.conn, workout.id, trimmed, today)
            .with_context(|| format!("Failed to add day '{trimmed}'"))
    }

    pub fn list_days(&self, workout_identifier: &str) -> Result<Vec<Day>> {
        let workout = self.resolve_workout(workout_identifier)?;
        db::list_days(&self.conn, workout.id)
            .with_context(|| format!("Failed to list days of '{}'", workout.name))
    }

    pub fn rename_day(&mut self, day_id: i64, new_name: &str) -> Result<()> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            bail!("Day name cannot be empty.");
        }
        let today = self.today_ts();
        db::rename_day(&mut self.conn, day_id, trimmed, today)
            .with_context(|| format!("Failed to rename day {day_id}"))
    }

    /// Deletes a day and every future scheduled session of it.
    pub fn delete_day(&mut self, day_id: i64) -> Result<()> {
        let today = self.today_ts();
        db::delete_day(&mut self.conn, day_id, today)
            .with_context(|| format!("Failed to delete day {day_id}"))
    }

    /// Swaps the positions of two days of the same workout.
    pub fn swap_days(&mut self, day_a: i64, day_b: i64) -> Result<()> {
        db::swap_days(&mut self.conn, day_a, day_b)
            .with_context(|| format!("Failed to swap days {day_a} and {day_b}"))
    }

    // --- Template exercises ---

    pub fn add_exercise(
        &mut self,
        day_id: i64,
        name: &str,
        sets: i64,
        reps: i64,
        web_link: Option<&str>,
        muscle_group: Option<MuscleGroup>,
    ) -> Result<i64> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("Exercise name cannot be empty.");
        }
        if sets <= 0 || reps <= 0 {
            bail!("Sets and reps must be positive.");
        }
        let today = self.today_ts();
        db::add_exercise(
            &mut self.conn,
            day_id,
            trimmed,
            sets,
            reps,
            web_link,
            muscle_group,
            today,
        )
        .with_context(|| format!("Failed to add exercise '{trimmed}'"))
    }

    pub fn list_exercises(&self, day_id: i64) -> Result<Vec<TemplateExercise>> {
        db::list_exercises_for_day(&self.conn, day_id)
            .with_context(|| format!("Failed to list exercises of day {day_id}"))
    }

    pub fn edit_exercise(&mut self, params: EditExerciseParams) -> Result<()> {
        if let Some(s) = params.new_sets {
            if s <= 0 {
                bail!("Sets must be positive.");
            }
        }
        if let Some(r) = params.new_reps {
            if r <= 0 {
                bail!("Reps must be positive.");
            }
        }
        let today = self.today_ts();
        db::update_exercise(
            &mut self.conn,
            params.id,
            params.new_name.as_deref(),
            params.new_sets,
            params.new_reps,
            params.new_web_link.as_ref().map(|o| o.as_deref()),
            params.new_muscle_group,
            today,
        )
        .with_context(|| format!("Failed to edit exercise {}", params.id))
    }

    pub fn delete_exercise(&mut self, exercise_id: i64) -> Result<()> {
        let today = self.today_ts();
        db::delete_exercise(&mut self.conn, exercise_id, today)
            .with_context(|| format!("Failed to delete exercise {exercise_id}"))
    }

    // --- Recurring rules ---

    /// Creates a recurrence rule for a day. Exactly one cadence must be
    /// given: a positive day interval, or a non-empty weekday set.
    pub fn add_recurring_rule(
        &self,
        day_id: i64,
        interval_days: Option<i64>,
        days_of_week: Option<&str>,
    ) -> Result<i64> {
        let weekday_set = days_of_week.map(recurrence::parse_weekday_set);
        match (interval_days, &weekday_set) {
            (Some(i), _) if i <= 0 => bail!("Interval must be at least one day."),
            (None, None) => bail!("Give either an interval or a weekday list."),
            (None, Some(set)) if set.is_empty() => {
                bail!("Weekday list must contain at least one of 0 (Sunday) through 6 (Saturday).")
            }
            _ => {}
        }
        let start_date = self.today_ts();
        db::create_rule(
            &self.conn,
            day_id,
            start_date,
            interval_days.unwrap_or(0),
            days_of_week,
        )
        .with_context(|| format!("Failed to create recurring rule for day {day_id}"))
    }

    pub fn list_recurring_rules(&self) -> Result<Vec<RecurringRule>> {
        db::list_rules(&self.conn).context("Failed to list recurring rules")
    }

    pub fn edit_recurring_rule(
        &self,
        rule_id: i64,
        new_interval_days: Option<i64>,
        new_days_of_week: Option<Option<&str>>,
    ) -> Result<()> {
        if let Some(i) = new_interval_days {
            if i < 0 {
                bail!("Interval cannot be negative.");
            }
        }
        db::update_rule(&self.conn, rule_id, new_interval_days, new_days_of_week)
            .with_context(|| format!("Failed to edit recurring rule {rule_id}"))
    }

    pub fn delete_recurring_rule(&self, rule_id: i64) -> Result<()> {
        db::delete_rule(&self.conn, rule_id)
            .with_context(|| format!("Failed to delete recurring rule {rule_id}"))
    }

    /// The upcoming date each rule will fire on, without materializing
    /// anything.
    pub fn preview_schedule(&self) -> Result<Vec<(RecurringRule, NaiveDate)>> {
        let today = recurrence::today_local();
        let rules = db::list_rules(&self.conn).context("Failed to list recurring rules")?;
        Ok(rules
            .into_iter()
            .map(|rule| {
                let next = recurrence::next_occurrence(&Cadence::from_rule(&rule), today);
                (rule, next)
            })
            .collect())
    }

    /// Materializes the next occurrence of every recurring rule as a
    /// scheduled log. Safe to run any number of times per day.
    pub fn reconcile_schedule(&mut self) -> Result<ReconcileReport> {
        let today = recurrence::today_local();
        recurrence::reconcile(&mut self.conn, today).context("Failed to reconcile schedule")
    }

    // --- Workout logs ---

    /// Schedules a one-off session of a day on a date, snapshotting the
    /// day's current exercises.
    /// # Errors
    /// Returns an error if that (date, workout, day) is already scheduled.
    pub fn schedule_workout(&mut self, day_id: i64, date: NaiveDate) -> Result<i64> {
        let day = db::get_day(&self.conn, day_id)?
            .ok_or_else(|| anyhow::anyhow!("Day {day_id} not found."))?;
        let workout = db::get_workout_by_id(&self.conn, day.workout_id)?
            .ok_or_else(|| anyhow::anyhow!("Workout {} not found.", day.workout_id))?;
        let ts = recurrence::local_midnight(date);
        if db::log_exists(&self.conn, ts, &workout.name, &day.name)? {
            bail!(
                "'{} / {}' is already scheduled on {date}.",
                workout.name,
                day.name
            );
        }
        db::insert_log_with_snapshot(&mut self.conn, day_id, ts)
            .with_context(|| format!("Failed to schedule day {day_id} on {date}"))
    }

    pub fn list_logs(&self, filters: &LogFilters) -> Result<Vec<WorkoutLogEntry>> {
        db::list_logs(&self.conn, filters).context("Failed to list workout logs")
    }

    /// Logs dated today or later, oldest first.
    pub fn upcoming_logs(&self) -> Result<Vec<WorkoutLogEntry>> {
        let filters = LogFilters {
            on_or_after: Some(self.today_ts()),
            ..Default::default()
        };
        let mut logs = self.list_logs(&filters)?;
        logs.reverse();
        Ok(logs)
    }

    /// Logs dated before today, newest first.
    pub fn past_logs(&self, limit: Option<u32>) -> Result<Vec<WorkoutLogEntry>> {
        let filters = LogFilters {
            before: Some(self.today_ts()),
            limit,
            ..Default::default()
        };
        self.list_logs(&filters)
    }

    pub fn log_details(&self, log_id: i64) -> Result<LogDetails> {
        let entry = db::get_log(&self.conn, log_id)?
            .ok_or_else(|| anyhow::anyhow!("Workout log {log_id} not found."))?;
        let exercises = db::list_logged_exercises(&self.conn, log_id)?;
        let sets = db::list_set_records(&self.conn, log_id)?;
        Ok(LogDetails {
            entry,
            exercises,
            sets,
        })
    }

    pub fn delete_log(&mut self, log_id: i64) -> Result<()> {
        db::delete_log(&mut self.conn, log_id)
            .with_context(|| format!("Failed to delete workout log {log_id}"))
    }

    /// Records one set against a logged exercise, overwriting an earlier
    /// record of the same set.
    pub fn record_set(
        &self,
        log_id: i64,
        logged_exercise_id: i64,
        set_number: i64,
        weight: f64,
        reps: i64,
    ) -> Result<i64> {
        if weight <= 0.0 || reps <= 0 {
            bail!("Weight and reps must be positive.");
        }
        let exercises = db::list_logged_exercises(&self.conn, log_id)?;
        let exercise = exercises
            .iter()
            .find(|e| e.id == logged_exercise_id)
            .ok_or_else(|| {
                anyhow::anyhow!("Exercise {logged_exercise_id} is not part of log {log_id}.")
            })?;
        if set_number < 1 || set_number > exercise.sets {
            bail!(
                "Set number must be between 1 and {} for '{}'.",
                exercise.sets,
                exercise.name
            );
        }
        db::upsert_set_record(
            &self.conn,
            log_id,
            logged_exercise_id,
            &exercise.name,
            set_number,
            weight,
            reps,
            exercise.muscle_group,
        )
        .with_context(|| format!("Failed to record set for log {log_id}"))
    }

    // --- Sessions ---

    /// Builds the in-session state for a scheduled log, pre-filling weights
    /// from history and reps from the template per the config.
    pub fn start_session(&self, log_id: i64) -> Result<Session> {
        if db::get_log(&self.conn, log_id)?.is_none() {
            bail!("Workout log {log_id} not found.");
        }
        let exercises = db::list_logged_exercises(&self.conn, log_id)?;
        let last_weights = if self.config.auto_fill_weight {
            let names: Vec<String> = exercises.iter().map(|e| e.name.clone()).collect();
            db::last_weights(&self.conn, &names)?
        } else {
            HashMap::new()
        };
        Session::new(log_id, &exercises, &last_weights, &self.config)
            .with_context(|| format!("Failed to start session for log {log_id}"))
    }

    /// Persists a finished session and removes any on-disk snapshot of it.
    pub fn save_session_results(
        &mut self,
        log_id: i64,
        duration_secs: i64,
        sets: &[CompletedSet],
    ) -> Result<()> {
        db::save_completed_session(&mut self.conn, log_id, duration_secs, sets)
            .with_context(|| format!("Failed to save session results for log {log_id}"))?;
        session::delete_snapshot(log_id)
            .with_context(|| format!("Failed to remove session snapshot for log {log_id}"))?;
        Ok(())
    }

    // --- Export ---

    /// Writes every recorded set as CSV, newest session first.
    pub fn export_sets_csv<W: Write>(&self, writer: W) -> Result<()> {
        let records = db::list_all_set_records(&self.conn)?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "date",
            "exercise",
            "set",
            "weight",
            "reps",
            "muscle_group",
        ])?;
        for (date_ts, record) in records {
            let date = recurrence::date_from_timestamp(date_ts);
            csv_writer.write_record([
                date.format("%Y-%m-%d").to_string(),
                record.exercise_name,
                record.set_number.to_string(),
                record.weight.to_string(),
                record.reps.to_string(),
                record
                    .muscle_group
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
