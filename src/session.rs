//src/session.rs
use crate::config::Config;
use crate::db::{CompletedSet, LoggedExercise, MuscleGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub const REST_EXTEND_SECS: u64 = 15;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The workout log has no exercises to run")]
    NoSets,
    #[error("Set needs a positive weight and rep count before it can be completed")]
    IncompleteSet,
    #[error("Event is not valid in the {0:?} stage")]
    WrongStage(Stage),
    #[error("Could not determine application data directory")]
    DataDir,
    #[error("I/O error accessing session snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read session snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Overview,
    Exercise,
    Rest,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetStatus {
    Pending,
    Logged,
    Skipped,
}

/// One planned set, flattened out of the log's exercise snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSet {
    pub logged_exercise_id: i64,
    pub exercise_name: String,
    pub muscle_group: Option<MuscleGroup>,
    pub set_number: i64,
    pub goal_reps: i64,
    pub weight: Option<f64>,
    pub reps: Option<i64>,
    pub status: SetStatus,
}

/// What the caller should do after handling an event.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Continue,
    /// A rest countdown just started, for this many seconds.
    RestStarted(u64),
    /// The rest countdown hit zero.
    RestFinished,
    /// Every remaining set is skipped; ask whether to finish now.
    FinishPrompt,
    /// The session is over; persist these results.
    Finished {
        duration_secs: i64,
        sets: Vec<CompletedSet>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Begin,
    UpdateWeight(f64),
    UpdateReps(i64),
    CompleteSet,
    SkipSet,
    /// Leave the rest of the current exercise behind and move on.
    SkipToNextExercise,
    /// Reopen every skipped set and jump back to the first one.
    RevisitSkipped,
    Tick,
    ExtendRest,
    SkipRest,
    FinishWorkout,
}

/// The in-session state machine. All transitions happen in [`handle`];
/// time only advances through `Tick` events, so the whole session can be
/// driven deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub workout_log_id: i64,
    pub stage: Stage,
    pub sets: Vec<SessionSet>,
    /// Index of the set currently in front of the user.
    pub cursor: usize,
    pub rest_remaining: u64,
    pub elapsed_secs: u64,
    rest_between_sets_secs: u64,
    rest_between_exercises_secs: u64,
}

impl Session {
    /// Flattens a log's exercise snapshot into per-set state, in snapshot
    /// order. `last_weights` is keyed by (exercise name, set number) and only
    /// consulted when weight auto-fill is on.
    pub fn new(
        workout_log_id: i64,
        exercises: &[LoggedExercise],
        last_weights: &HashMap<(String, i64), f64>,
        config: &Config,
    ) -> Result<Self, SessionError> {
        let mut sets = Vec::new();
        for exercise in exercises {
            for set_number in 1..=exercise.sets {
                let weight = if config.auto_fill_weight {
                    last_weights
                        .get(&(exercise.name.clone(), set_number))
                        .copied()
                } else {
                    None
                };
                let reps = config.auto_fill_reps.then_some(exercise.reps);
                sets.push(SessionSet {
                    logged_exercise_id: exercise.id,
                    exercise_name: exercise.name.clone(),
                    muscle_group: exercise.muscle_group,
                    set_number,
                    goal_reps: exercise.reps,
                    weight,
                    reps,
                    status: SetStatus::Pending,
                });
            }
        }
        if sets.is_empty() {
            return Err(SessionError::NoSets);
        }
        Ok(Session {
            workout_log_id,
            stage: Stage::Overview,
            sets,
            cursor: 0,
            rest_remaining: 0,
            elapsed_secs: 0,
            rest_between_sets_secs: config.rest_between_sets_secs,
            rest_between_exercises_secs: config.rest_between_exercises_secs,
        })
    }

    pub fn current_set(&self) -> &SessionSet {
        &self.sets[self.cursor]
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Outcome, SessionError> {
        match event {
            SessionEvent::Begin => self.begin(),
            SessionEvent::UpdateWeight(w) => self.update_weight(w),
            SessionEvent::UpdateReps(r) => self.update_reps(r),
            SessionEvent::CompleteSet => self.complete_set(),
            SessionEvent::SkipSet => self.skip_set(),
            SessionEvent::SkipToNextExercise => self.skip_to_next_exercise(),
            SessionEvent::RevisitSkipped => self.revisit_skipped(),
            SessionEvent::Tick => Ok(self.tick()),
            SessionEvent::ExtendRest => self.extend_rest(),
            SessionEvent::SkipRest => self.skip_rest(),
            SessionEvent::FinishWorkout => self.finish(),
        }
    }

    fn begin(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Overview {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.stage = Stage::Exercise;
        Ok(Outcome::Continue)
    }

    fn update_weight(&mut self, weight: f64) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.sets[self.cursor].weight = Some(weight);
        Ok(Outcome::Continue)
    }

    fn update_reps(&mut self, reps: i64) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.sets[self.cursor].reps = Some(reps);
        Ok(Outcome::Continue)
    }

    /// A set counts as logged only with a positive weight and rep count.
    fn complete_set(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise {
            return Err(SessionError::WrongStage(self.stage));
        }
        let set = &mut self.sets[self.cursor];
        if !set_is_fillable(set.weight, set.reps) {
            return Err(SessionError::IncompleteSet);
        }
        set.status = SetStatus::Logged;
        Ok(self.advance(true))
    }

    fn skip_set(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.sets[self.cursor].status = SetStatus::Skipped;
        Ok(self.advance(false))
    }

    /// Jumps past the remaining sets of the current exercise. The current
    /// set is logged if fully filled in, otherwise skipped like the rest.
    fn skip_to_next_exercise(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise {
            return Err(SessionError::WrongStage(self.stage));
        }
        let exercise_id = self.sets[self.cursor].logged_exercise_id;
        let current = &mut self.sets[self.cursor];
        current.status = if set_is_fillable(current.weight, current.reps) {
            SetStatus::Logged
        } else {
            SetStatus::Skipped
        };
        for set in &mut self.sets {
            if set.logged_exercise_id == exercise_id && set.status == SetStatus::Pending {
                set.status = SetStatus::Skipped;
            }
        }
        Ok(self.advance(false))
    }

    /// Reopens skipped sets and moves the cursor back to the first of them.
    fn revisit_skipped(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Exercise && self.stage != Stage::Rest {
            return Err(SessionError::WrongStage(self.stage));
        }
        let mut first = None;
        for (index, set) in self.sets.iter_mut().enumerate() {
            if set.status == SetStatus::Skipped {
                set.status = SetStatus::Pending;
                first.get_or_insert(index);
            }
        }
        if let Some(index) = first {
            self.cursor = index;
            self.rest_remaining = 0;
            self.stage = Stage::Exercise;
        }
        Ok(Outcome::Continue)
    }

    /// Moves the cursor to the next pending set. After a completed set a rest
    /// countdown starts first; switching exercises earns the longer rest.
    fn advance(&mut self, with_rest: bool) -> Outcome {
        let next = self
            .sets
            .iter()
            .enumerate()
            .skip(self.cursor + 1)
            .find(|(_, s)| s.status == SetStatus::Pending)
            .map(|(i, _)| i);

        match next {
            Some(index) => {
                let changing_exercise = self.sets[index].logged_exercise_id
                    != self.sets[self.cursor].logged_exercise_id;
                self.cursor = index;
                if with_rest {
                    self.rest_remaining = if changing_exercise {
                        self.rest_between_exercises_secs
                    } else {
                        self.rest_between_sets_secs
                    };
                    self.stage = Stage::Rest;
                    Outcome::RestStarted(self.rest_remaining)
                } else {
                    Outcome::Continue
                }
            }
            None => {
                if self.sets.iter().any(|s| s.status == SetStatus::Skipped) {
                    Outcome::FinishPrompt
                } else {
                    self.complete()
                }
            }
        }
    }

    /// One second of wall time. Drives the rest countdown.
    fn tick(&mut self) -> Outcome {
        if self.stage == Stage::Overview || self.stage == Stage::Completed {
            return Outcome::Continue;
        }
        self.elapsed_secs += 1;
        if self.stage == Stage::Rest {
            self.rest_remaining = self.rest_remaining.saturating_sub(1);
            if self.rest_remaining == 0 {
                self.stage = Stage::Exercise;
                return Outcome::RestFinished;
            }
        }
        Outcome::Continue
    }

    fn extend_rest(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Rest {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.rest_remaining += REST_EXTEND_SECS;
        Ok(Outcome::Continue)
    }

    fn skip_rest(&mut self) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Rest {
            return Err(SessionError::WrongStage(self.stage));
        }
        self.rest_remaining = 0;
        self.stage = Stage::Exercise;
        Ok(Outcome::RestFinished)
    }

    /// Ends the session. A filled-in pending set under the cursor is logged
    /// on the way out so its numbers are not lost.
    fn finish(&mut self) -> Result<Outcome, SessionError> {
        if self.stage == Stage::Overview || self.stage == Stage::Completed {
            return Err(SessionError::WrongStage(self.stage));
        }
        let current = &mut self.sets[self.cursor];
        if current.status == SetStatus::Pending && set_is_fillable(current.weight, current.reps) {
            current.status = SetStatus::Logged;
        }
        Ok(self.complete())
    }

    fn complete(&mut self) -> Outcome {
        self.stage = Stage::Completed;
        let sets = self
            .sets
            .iter()
            .filter(|s| s.status == SetStatus::Logged)
            .map(|s| CompletedSet {
                logged_exercise_id: s.logged_exercise_id,
                exercise_name: s.exercise_name.clone(),
                set_number: s.set_number,
                // Logged sets always have both values present.
                weight: s.weight.unwrap_or_default(),
                reps: s.reps.unwrap_or_default(),
                muscle_group: s.muscle_group,
            })
            .collect();
        Outcome::Finished {
            duration_secs: self.elapsed_secs as i64,
            sets,
        }
    }
}

fn set_is_fillable(weight: Option<f64>, reps: Option<i64>) -> bool {
    matches!(weight, Some(w) if w > 0.0) && matches!(reps, Some(r) if r > 0)
}

/// A session frozen to disk so a closed terminal does not lose the workout.
/// `saved_at` is wall-clock unix seconds; on resume the elapsed gap is
/// replayed into the timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub saved_at: i64,
    pub session: Session,
}

impl TimerSnapshot {
    pub fn capture(session: &Session, now: i64) -> Self {
        TimerSnapshot {
            saved_at: now,
            session: session.clone(),
        }
    }

    /// Applies the wall-clock time that passed while the snapshot sat on
    /// disk. Returns the caught-up session and whether a rest countdown
    /// finished during the gap.
    pub fn fast_forward(self, now: i64) -> (Session, bool) {
        let elapsed = (now - self.saved_at).max(0) as u64;
        let mut session = self.session;
        if session.stage == Stage::Overview || session.stage == Stage::Completed {
            return (session, false);
        }
        session.elapsed_secs += elapsed;
        let mut rest_finished = false;
        if session.stage == Stage::Rest {
            if elapsed >= session.rest_remaining {
                session.rest_remaining = 0;
                session.stage = Stage::Exercise;
                rest_finished = true;
            } else {
                session.rest_remaining -= elapsed;
            }
        }
        (session, rest_finished)
    }
}

fn snapshot_path(workout_log_id: i64) -> Result<PathBuf, SessionError> {
    let data_dir = dirs::data_dir().ok_or(SessionError::DataDir)?;
    let app_dir = data_dir.join("gym-planner");
    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(format!("session-{workout_log_id}.json")))
}

pub fn save_snapshot(snapshot: &TimerSnapshot) -> Result<(), SessionError> {
    let path = snapshot_path(snapshot.session.workout_log_id)?;
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_snapshot(workout_log_id: i64) -> Result<Option<TimerSnapshot>, SessionError> {
    let path = snapshot_path(workout_log_id)?;
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

pub fn delete_snapshot(workout_log_id: i64) -> Result<(), SessionError> {
    let path = snapshot_path(workout_log_id)?;
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(id: i64, name: &str, sets: i64, reps: i64) -> LoggedExercise {
        LoggedExercise {
            id,
            workout_log_id: 1,
            name: name.to_string(),
            sets,
            reps,
            web_link: None,
            muscle_group: None,
        }
    }

    fn test_config() -> Config {
        Config::default()
    }

    fn new_session(exercises: &[LoggedExercise]) -> Session {
        Session::new(1, exercises, &HashMap::new(), &test_config()).unwrap()
    }

    #[test]
    fn sets_are_flattened_in_exercise_order() {
        let session = new_session(&[exercise(10, "Bench", 2, 8), exercise(11, "Row", 1, 10)]);
        let labels: Vec<(i64, i64)> = session
            .sets
            .iter()
            .map(|s| (s.logged_exercise_id, s.set_number))
            .collect();
        assert_eq!(labels, vec![(10, 1), (10, 2), (11, 1)]);
    }

    #[test]
    fn empty_log_is_rejected() {
        let result = Session::new(1, &[], &HashMap::new(), &test_config());
        assert!(matches!(result, Err(SessionError::NoSets)));
    }

    #[test]
    fn auto_fill_uses_last_weight_per_set_number() {
        let mut last = HashMap::new();
        last.insert(("Bench".to_string(), 1), 60.0);
        last.insert(("Bench".to_string(), 2), 62.5);
        let session =
            Session::new(1, &[exercise(10, "Bench", 2, 8)], &last, &test_config()).unwrap();
        assert_eq!(session.sets[0].weight, Some(60.0));
        assert_eq!(session.sets[1].weight, Some(62.5));
        assert_eq!(session.sets[0].reps, Some(8));
    }

    #[test]
    fn auto_fill_can_be_disabled() {
        let mut last = HashMap::new();
        last.insert(("Bench".to_string(), 1), 60.0);
        let config = Config {
            auto_fill_weight: false,
            auto_fill_reps: false,
            ..Config::default()
        };
        let session = Session::new(1, &[exercise(10, "Bench", 1, 8)], &last, &config).unwrap();
        assert_eq!(session.sets[0].weight, None);
        assert_eq!(session.sets[0].reps, None);
    }

    #[test]
    fn completing_a_set_requires_positive_values() {
        let mut session = new_session(&[exercise(10, "Bench", 1, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(0.0)).unwrap();
        assert!(matches!(
            session.handle(SessionEvent::CompleteSet),
            Err(SessionError::IncompleteSet)
        ));
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::UpdateReps(8)).unwrap();
        assert!(session.handle(SessionEvent::CompleteSet).is_ok());
    }

    #[test]
    fn rest_duration_depends_on_exercise_boundary() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8), exercise(11, "Row", 1, 10)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        // Same exercise up next: short rest.
        let outcome = session.handle(SessionEvent::CompleteSet).unwrap();
        assert_eq!(outcome, Outcome::RestStarted(30));
        assert_eq!(session.stage, Stage::Rest);

        session.handle(SessionEvent::SkipRest).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        // Next set belongs to Row: long rest.
        let outcome = session.handle(SessionEvent::CompleteSet).unwrap();
        assert_eq!(outcome, Outcome::RestStarted(60));
    }

    #[test]
    fn ticks_count_down_rest_and_accumulate_duration() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::CompleteSet).unwrap();
        assert_eq!(session.rest_remaining, 30);

        for _ in 0..29 {
            assert_eq!(session.handle(SessionEvent::Tick).unwrap(), Outcome::Continue);
        }
        assert_eq!(session.handle(SessionEvent::Tick).unwrap(), Outcome::RestFinished);
        assert_eq!(session.stage, Stage::Exercise);
        assert_eq!(session.elapsed_secs, 30);
    }

    #[test]
    fn extend_rest_adds_fifteen_seconds() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::CompleteSet).unwrap();
        session.handle(SessionEvent::ExtendRest).unwrap();
        assert_eq!(session.rest_remaining, 45);
    }

    #[test]
    fn skipping_all_but_one_then_completing_prompts_to_finish() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::SkipSet).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        let outcome = session.handle(SessionEvent::CompleteSet).unwrap();
        assert_eq!(outcome, Outcome::FinishPrompt);
    }

    #[test]
    fn skipping_to_next_exercise_drops_remaining_sets_without_rest() {
        let mut session = new_session(&[exercise(10, "Bench", 3, 8), exercise(11, "Row", 1, 10)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        // First set is filled in, so it gets logged rather than skipped.
        let outcome = session.handle(SessionEvent::SkipToNextExercise).unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(session.stage, Stage::Exercise);
        assert_eq!(session.sets[0].status, SetStatus::Logged);
        assert_eq!(session.sets[1].status, SetStatus::Skipped);
        assert_eq!(session.sets[2].status, SetStatus::Skipped);
        assert_eq!(session.sets[session.cursor].logged_exercise_id, 11);
    }

    #[test]
    fn revisiting_skipped_sets_reopens_them_in_order() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::SkipSet).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        let outcome = session.handle(SessionEvent::CompleteSet).unwrap();
        assert_eq!(outcome, Outcome::FinishPrompt);

        session.handle(SessionEvent::RevisitSkipped).unwrap();
        assert_eq!(session.stage, Stage::Exercise);
        assert_eq!(session.cursor, 0);
        assert_eq!(session.sets[0].status, SetStatus::Pending);
        assert_eq!(session.sets[1].status, SetStatus::Logged);
    }

    #[test]
    fn finishing_logs_a_filled_current_set() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        let outcome = session.handle(SessionEvent::FinishWorkout).unwrap();
        match outcome {
            Outcome::Finished { sets, .. } => {
                // Reps were auto-filled, weight entered by hand, so the set counts.
                assert_eq!(sets.len(), 1);
                assert_eq!(sets[0].weight, 60.0);
                assert_eq!(sets[0].reps, 8);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
        assert_eq!(session.stage, Stage::Completed);
    }

    #[test]
    fn finished_session_only_exports_logged_sets() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::CompleteSet).unwrap();
        session.handle(SessionEvent::SkipRest).unwrap();
        session.handle(SessionEvent::SkipSet).unwrap();
        let outcome = session.handle(SessionEvent::FinishWorkout).unwrap();
        match outcome {
            Outcome::Finished { sets, .. } => {
                assert_eq!(sets.len(), 1);
                assert_eq!(sets[0].set_number, 1);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn snapshot_fast_forward_expires_the_rest() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::CompleteSet).unwrap();
        for _ in 0..10 {
            session.handle(SessionEvent::Tick).unwrap();
        }
        assert_eq!(session.rest_remaining, 20);
        let cursor = session.cursor;

        let snapshot = TimerSnapshot::capture(&session, 1_000);
        let (resumed, rest_finished) = snapshot.fast_forward(1_025);
        assert!(rest_finished);
        assert_eq!(resumed.stage, Stage::Exercise);
        assert_eq!(resumed.rest_remaining, 0);
        assert_eq!(resumed.cursor, cursor);
        assert_eq!(resumed.elapsed_secs, 35);
    }

    #[test]
    fn snapshot_fast_forward_keeps_partial_rest() {
        let mut session = new_session(&[exercise(10, "Bench", 2, 8)]);
        session.handle(SessionEvent::Begin).unwrap();
        session.handle(SessionEvent::UpdateWeight(60.0)).unwrap();
        session.handle(SessionEvent::CompleteSet).unwrap();

        let snapshot = TimerSnapshot::capture(&session, 1_000);
        let (resumed, rest_finished) = snapshot.fast_forward(1_010);
        assert!(!rest_finished);
        assert_eq!(resumed.stage, Stage::Rest);
        assert_eq!(resumed.rest_remaining, 20);
    }
}
