use anyhow::Result;
use chrono::Duration;
use gym_planner_lib::{
    db, local_midnight, today_local, AppService, Config, DbError, EditExerciseParams, LogFilters,
    MuscleGroup, Outcome, SessionEvent, SetStatus, Units,
};

// Helper function to create a test service with in-memory database
fn create_test_service() -> Result<AppService> {
    let conn = rusqlite::Connection::open_in_memory()?;
    gym_planner_lib::db::init_db(&conn)?;

    Ok(AppService {
        config: Config::default(),
        conn,
        db_path: ":memory:".into(),
        config_path: "test_config.toml".into(),
    })
}

// Builds a workout with one day and two exercises, returning (day_id, ids).
fn seed_push_day(service: &mut AppService) -> Result<i64> {
    service.create_workout("PPL")?;
    let day_id = service.add_day("PPL", "Push")?;
    service.add_exercise(day_id, "Bench Press", 3, 8, None, Some(MuscleGroup::Chest))?;
    service.add_exercise(day_id, "Overhead Press", 3, 10, None, Some(MuscleGroup::Shoulders))?;
    Ok(day_id)
}

#[test]
fn test_create_and_list_workouts() -> Result<()> {
    let service = create_test_service()?;

    service.create_workout("PPL")?;
    service.create_workout("Full Body")?;

    let workouts = service.list_workouts()?;
    assert_eq!(workouts.len(), 2);
    // Sorted by name
    assert_eq!(workouts[0].name, "Full Body");
    assert_eq!(workouts[1].name, "PPL");

    let resolved = service.resolve_workout("PPL")?;
    assert_eq!(resolved.name, "PPL");
    let by_id = service.resolve_workout(&resolved.id.to_string())?;
    assert_eq!(by_id.id, resolved.id);

    Ok(())
}

#[test]
fn test_workout_names_must_be_unique() -> Result<()> {
    let service = create_test_service()?;
    service.create_workout("PPL")?;

    let err = service.create_workout("ppl").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::WorkoutNameNotUnique(_))
    ));
    Ok(())
}

#[test]
fn test_days_keep_their_order_and_can_be_swapped() -> Result<()> {
    let mut service = create_test_service()?;
    service.create_workout("PPL")?;
    let push = service.add_day("PPL", "Push")?;
    let pull = service.add_day("PPL", "Pull")?;
    let legs = service.add_day("PPL", "Legs")?;

    let names: Vec<String> = service.list_days("PPL")?.into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["Push", "Pull", "Legs"]);

    service.swap_days(push, legs)?;
    let names: Vec<String> = service.list_days("PPL")?.into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["Legs", "Pull", "Push"]);

    // Exercises follow their day through the swap.
    service.add_exercise(pull, "Row", 3, 10, None, Some(MuscleGroup::Back))?;
    let exercises = service.list_exercises(pull)?;
    assert_eq!(exercises.len(), 1);
    assert_eq!(exercises[0].name, "Row");

    Ok(())
}

#[test]
fn test_duplicate_day_name_is_rejected() -> Result<()> {
    let mut service = create_test_service()?;
    service.create_workout("PPL")?;
    service.add_day("PPL", "Push")?;
    assert!(service.add_day("PPL", "Push").is_err());
    Ok(())
}

#[test]
fn test_swapping_days_of_different_workouts_fails() -> Result<()> {
    let mut service = create_test_service()?;
    service.create_workout("A")?;
    service.create_workout("B")?;
    let a = service.add_day("A", "Day 1")?;
    let b = service.add_day("B", "Day 1")?;

    let err = service.swap_days(a, b).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::SwapAcrossWorkouts(_, _))
    ));
    Ok(())
}

#[test]
fn test_scheduling_snapshots_the_day() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;

    let tomorrow = today_local() + Duration::days(1);
    let log_id = service.schedule_workout(day_id, tomorrow)?;

    let details = service.log_details(log_id)?;
    assert_eq!(details.entry.workout_name, "PPL");
    assert_eq!(details.entry.day_name, "Push");
    assert_eq!(details.exercises.len(), 2);
    assert_eq!(details.exercises[0].name, "Bench Press");
    assert_eq!(details.exercises[0].muscle_group, Some(MuscleGroup::Chest));

    // The same (date, workout, day) cannot be scheduled twice.
    assert!(service.schedule_workout(day_id, tomorrow).is_err());
    Ok(())
}

#[test]
fn test_template_edits_propagate_to_future_logs_only() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;

    let yesterday = today_local() - Duration::days(1);
    let tomorrow = today_local() + Duration::days(1);
    let past_log = service.schedule_workout(day_id, yesterday)?;
    let future_log = service.schedule_workout(day_id, tomorrow)?;

    let bench = service.list_exercises(day_id)?[0].clone();
    service.edit_exercise(EditExerciseParams {
        id: bench.id,
        new_sets: Some(5),
        new_reps: Some(5),
        ..Default::default()
    })?;
    service.add_exercise(day_id, "Dips", 3, 12, None, Some(MuscleGroup::Triceps))?;

    let future = service.log_details(future_log)?;
    assert_eq!(future.exercises.len(), 3);
    assert_eq!(future.exercises[0].sets, 5);
    assert_eq!(future.exercises[0].reps, 5);
    assert_eq!(future.exercises[2].name, "Dips");

    // Yesterday's snapshot is history and stays as scheduled.
    let past = service.log_details(past_log)?;
    assert_eq!(past.exercises.len(), 2);
    assert_eq!(past.exercises[0].sets, 3);

    Ok(())
}

#[test]
fn test_deleting_an_exercise_propagates_to_future_logs() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let tomorrow = today_local() + Duration::days(1);
    let log_id = service.schedule_workout(day_id, tomorrow)?;

    let ohp = service.list_exercises(day_id)?[1].clone();
    service.delete_exercise(ohp.id)?;

    let details = service.log_details(log_id)?;
    assert_eq!(details.exercises.len(), 1);
    assert_eq!(details.exercises[0].name, "Bench Press");
    Ok(())
}

#[test]
fn test_deleting_a_day_cascades_future_logs_and_keeps_past() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;

    let yesterday = today_local() - Duration::days(1);
    let tomorrow = today_local() + Duration::days(1);
    let past_log = service.schedule_workout(day_id, yesterday)?;
    let future_log = service.schedule_workout(day_id, tomorrow)?;

    service.delete_day(day_id)?;

    assert!(service.log_details(future_log).is_err());
    let past = service.log_details(past_log)?;
    assert_eq!(past.exercises.len(), 2);
    Ok(())
}

#[test]
fn test_failed_day_deletion_rolls_back_the_cascade() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let tomorrow = today_local() + Duration::days(1);
    let future_log = service.schedule_workout(day_id, tomorrow)?;

    // The day row goes last inside the transaction, so aborting its delete
    // happens after the log cascade has already run.
    service.conn.execute_batch(
        "CREATE TRIGGER block_day_delete BEFORE DELETE ON days \
         BEGIN SELECT RAISE(ABORT, 'day is locked'); END;",
    )?;
    assert!(service.delete_day(day_id).is_err());

    // Everything rolled back: the day and its scheduled log both survive.
    assert_eq!(service.list_days("PPL")?.len(), 1);
    assert_eq!(service.log_details(future_log)?.exercises.len(), 2);

    service.conn.execute_batch("DROP TRIGGER block_day_delete;")?;
    service.delete_day(day_id)?;
    assert!(service.log_details(future_log).is_err());
    Ok(())
}

#[test]
fn test_renaming_a_day_follows_onto_future_logs() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let tomorrow = today_local() + Duration::days(1);
    let log_id = service.schedule_workout(day_id, tomorrow)?;

    service.rename_day(day_id, "Push A")?;
    let details = service.log_details(log_id)?;
    assert_eq!(details.entry.day_name, "Push A");
    Ok(())
}

#[test]
fn test_interval_rule_reconciles_once_per_occurrence() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    service.add_recurring_rule(day_id, Some(2), None)?;

    let report = service.reconcile_schedule()?;
    assert_eq!(report.created.len(), 1);
    assert!(report.failed.is_empty());
    // The rule started today, so the first occurrence is today.
    let (_, log_id, date) = report.created[0];
    assert_eq!(date, today_local());
    assert_eq!(service.log_details(log_id)?.exercises.len(), 2);

    // Running again changes nothing.
    let report = service.reconcile_schedule()?;
    assert!(report.created.is_empty());
    assert_eq!(report.skipped, 1);
    let logs = service.list_logs(&LogFilters::default())?;
    assert_eq!(logs.len(), 1);
    Ok(())
}

#[test]
fn test_weekday_rule_schedules_the_next_matching_day() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    // Every weekday: the next occurrence is always tomorrow.
    service.add_recurring_rule(day_id, None, Some("0,1,2,3,4,5,6"))?;

    let report = service.reconcile_schedule()?;
    assert_eq!(report.created.len(), 1);
    let (_, _, date) = report.created[0];
    assert_eq!(date, today_local() + Duration::days(1));
    Ok(())
}

#[test]
fn test_rule_without_cadence_falls_back_to_today() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    // No interval, no weekdays. Inserted behind the service's validation,
    // matching what an older database might hold.
    db::create_rule(&service.conn, day_id, local_midnight(today_local()), 0, None)?;

    let report = service.reconcile_schedule()?;
    assert_eq!(report.created.len(), 1);
    assert!(report.failed.is_empty());
    let (_, _, date) = report.created[0];
    assert_eq!(date, today_local());
    Ok(())
}

#[test]
fn test_one_failing_rule_does_not_block_the_others() -> Result<()> {
    let mut service = create_test_service()?;
    let push_day = seed_push_day(&mut service)?;
    let pull_day = service.add_day("PPL", "Pull")?;
    service.add_exercise(pull_day, "Barbell Row", 3, 8, None, Some(MuscleGroup::Back))?;
    service.add_recurring_rule(push_day, Some(1), None)?;
    service.add_recurring_rule(pull_day, Some(1), None)?;

    // Break materialization for the Pull rule only.
    service.conn.execute_batch(
        "CREATE TRIGGER block_pull BEFORE INSERT ON workout_log \
         WHEN NEW.day_name = 'Pull' \
         BEGIN SELECT RAISE(ABORT, 'no pulling today'); END;",
    )?;

    let report = service.reconcile_schedule()?;
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.failed.len(), 1);
    let logs = service.list_logs(&LogFilters::default())?;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].day_name, "Push");

    // Once the fault clears, the failed rule catches up.
    service.conn.execute_batch("DROP TRIGGER block_pull;")?;
    let report = service.reconcile_schedule()?;
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.skipped, 1);
    Ok(())
}

#[test]
fn test_rule_validation() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;

    assert!(service.add_recurring_rule(day_id, Some(0), None).is_err());
    assert!(service.add_recurring_rule(day_id, None, None).is_err());
    assert!(service.add_recurring_rule(day_id, None, Some("9")).is_err());
    assert!(service.add_recurring_rule(day_id, None, Some("1,3,5")).is_ok());

    let rules = service.list_recurring_rules()?;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].days_of_week.as_deref(), Some("1,3,5"));
    assert_eq!(rules[0].day_name, "Push");
    Ok(())
}

#[test]
fn test_record_set_overwrites_on_rerecord() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let log_id = service.schedule_workout(day_id, today_local())?;
    let bench = service.log_details(log_id)?.exercises[0].clone();

    service.record_set(log_id, bench.id, 1, 60.0, 8)?;
    service.record_set(log_id, bench.id, 1, 62.5, 7)?;

    let details = service.log_details(log_id)?;
    assert_eq!(details.sets.len(), 1);
    assert_eq!(details.sets[0].weight, 62.5);
    assert_eq!(details.sets[0].reps, 7);
    assert_eq!(details.sets[0].muscle_group, Some(MuscleGroup::Chest));

    // Out-of-range set numbers and non-member exercises are rejected.
    assert!(service.record_set(log_id, bench.id, 4, 60.0, 8).is_err());
    assert!(service.record_set(log_id, 9999, 1, 60.0, 8).is_err());
    Ok(())
}

#[test]
fn test_session_auto_fills_weight_from_history() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;

    let last_week = today_local() - Duration::days(7);
    let old_log = service.schedule_workout(day_id, last_week)?;
    let bench = service.log_details(old_log)?.exercises[0].clone();
    service.record_set(old_log, bench.id, 1, 60.0, 8)?;
    service.record_set(old_log, bench.id, 2, 57.5, 8)?;

    let log_id = service.schedule_workout(day_id, today_local())?;
    let session = service.start_session(log_id)?;

    assert_eq!(session.sets[0].weight, Some(60.0));
    assert_eq!(session.sets[1].weight, Some(57.5));
    assert_eq!(session.sets[2].weight, None); // set 3 has no history
    assert_eq!(session.sets[0].reps, Some(8)); // goal reps pre-filled
    Ok(())
}

#[test]
fn test_completed_session_is_saved_atomically() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let log_id = service.schedule_workout(day_id, today_local())?;

    let mut session = service.start_session(log_id)?;
    session.handle(SessionEvent::Begin)?;
    // Complete the first bench set, skip everything else.
    session.handle(SessionEvent::UpdateWeight(60.0))?;
    session.handle(SessionEvent::CompleteSet)?;
    session.handle(SessionEvent::SkipRest)?;
    for _ in 0..4 {
        session.handle(SessionEvent::SkipSet)?;
    }
    let outcome = session.handle(SessionEvent::SkipSet)?;
    assert_eq!(outcome, Outcome::FinishPrompt);

    let Outcome::Finished {
        duration_secs,
        sets,
    } = session.handle(SessionEvent::FinishWorkout)?
    else {
        panic!("session did not finish");
    };
    assert_eq!(sets.len(), 1);
    service.save_session_results(log_id, duration_secs, &sets)?;

    let details = service.log_details(log_id)?;
    assert!(details.entry.completion_time.is_some());
    assert_eq!(details.sets.len(), 1);
    assert_eq!(details.sets[0].exercise_name, "Bench Press");
    assert_eq!(details.sets[0].weight, 60.0);

    // Skipped sets leave no trace.
    assert!(session
        .sets
        .iter()
        .skip(1)
        .all(|s| s.status == SetStatus::Skipped));
    Ok(())
}

#[test]
fn test_upcoming_and_past_log_views() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    service.schedule_workout(day_id, today_local() - Duration::days(3))?;
    service.schedule_workout(day_id, today_local())?;
    service.schedule_workout(day_id, today_local() + Duration::days(2))?;

    let upcoming = service.upcoming_logs()?;
    assert_eq!(upcoming.len(), 2); // today counts as upcoming
    assert!(upcoming[0].workout_date <= upcoming[1].workout_date);

    let past = service.past_logs(None)?;
    assert_eq!(past.len(), 1);
    Ok(())
}

#[test]
fn test_delete_log_removes_snapshot_and_sets() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let log_id = service.schedule_workout(day_id, today_local())?;
    let bench = service.log_details(log_id)?.exercises[0].clone();
    service.record_set(log_id, bench.id, 1, 60.0, 8)?;

    service.delete_log(log_id)?;
    assert!(service.log_details(log_id).is_err());
    assert!(db::list_logged_exercises(&service.conn, log_id)?.is_empty());
    assert!(db::list_set_records(&service.conn, log_id)?.is_empty());
    Ok(())
}

#[test]
fn test_rename_workout_updates_future_log_headers() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let yesterday = today_local() - Duration::days(1);
    let tomorrow = today_local() + Duration::days(1);
    let past_log = service.schedule_workout(day_id, yesterday)?;
    let future_log = service.schedule_workout(day_id, tomorrow)?;

    service.rename_workout("PPL", "Push Pull Legs")?;

    assert_eq!(service.log_details(future_log)?.entry.workout_name, "Push Pull Legs");
    assert_eq!(service.log_details(past_log)?.entry.workout_name, "PPL");
    Ok(())
}

#[test]
fn test_csv_export_lists_recorded_sets() -> Result<()> {
    let mut service = create_test_service()?;
    let day_id = seed_push_day(&mut service)?;
    let log_id = service.schedule_workout(day_id, today_local())?;
    let bench = service.log_details(log_id)?.exercises[0].clone();
    service.record_set(log_id, bench.id, 1, 60.0, 8)?;

    let mut buffer = Vec::new();
    service.export_sets_csv(&mut buffer)?;
    let csv = String::from_utf8(buffer)?;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("date,exercise,set,weight,reps,muscle_group")
    );
    let row = lines.next().expect("one data row");
    assert!(row.contains("Bench Press"));
    assert!(row.contains("60"));
    assert!(row.contains("chest"));
    Ok(())
}

#[test]
fn test_config_round_trips_through_toml() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");

    // First load writes the default file.
    let mut config = gym_planner_lib::load_config_util(&path)?;
    assert!(path.exists());
    assert_eq!(config.rest_between_sets_secs, 30);
    assert_eq!(config.rest_between_exercises_secs, 60);

    config.units = Units::Imperial;
    config.rest_between_sets_secs = 45;
    config.auto_fill_weight = false;
    gym_planner_lib::save_config_util(&path, &config)?;

    let reloaded = gym_planner_lib::load_config_util(&path)?;
    assert_eq!(reloaded.units, Units::Imperial);
    assert_eq!(reloaded.rest_between_sets_secs, 45);
    assert!(!reloaded.auto_fill_weight);
    assert!(reloaded.auto_fill_reps);
    Ok(())
}
