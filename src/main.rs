//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::{stdin, stdout};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use gym_planner_lib::{
    date_from_timestamp, parse_color, today_local, AppService, Day, EditExerciseParams,
    LogDetails, Outcome, RecurringRule, Session, SessionEvent, Stage, TemplateExercise,
    TimerSnapshot, Units, Workout, WorkoutLogEntry,
};

fn main() -> Result<()> {
    let cli_args = cli::Cli::parse();

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::Cli::command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let header_color = header_color(&service);

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }

        // --- Workout template commands ---
        cli::Commands::CreateWorkout { name } => {
            let id = service.create_workout(&name)?;
            println!("Created workout '{}' ID: {id}", name.trim());
        }
        cli::Commands::RenameWorkout {
            identifier,
            new_name,
        } => {
            service.rename_workout(&identifier, &new_name)?;
            println!("Renamed workout '{identifier}' to '{}'.", new_name.trim());
        }
        cli::Commands::DeleteWorkout { identifier } => {
            service.delete_workout(&identifier)?;
            println!("Deleted workout '{identifier}' and its scheduled sessions.");
        }
        cli::Commands::ListWorkouts => {
            let workouts = service.list_workouts()?;
            if workouts.is_empty() {
                println!("No workouts defined yet. Create one with 'create-workout'.");
            } else {
                print_workout_table(workouts, header_color);
            }
        }

        // --- Day commands ---
        cli::Commands::AddDay { workout, name } => {
            let id = service.add_day(&workout, &name)?;
            println!("Added day '{}' ID: {id}", name.trim());
        }
        cli::Commands::RenameDay { day_id, new_name } => {
            service.rename_day(day_id, &new_name)?;
            println!("Renamed day {day_id} to '{}'.", new_name.trim());
        }
        cli::Commands::DeleteDay { day_id } => {
            service.delete_day(day_id)?;
            println!("Deleted day {day_id} and its scheduled sessions.");
        }
        cli::Commands::SwapDays { day_a, day_b } => {
            service.swap_days(day_a, day_b)?;
            println!("Swapped days {day_a} and {day_b}.");
        }
        cli::Commands::ListDays { workout } => {
            let days = service.list_days(&workout)?;
            if days.is_empty() {
                println!("Workout '{workout}' has no days yet.");
            }
            for day in days {
                let exercises = service.list_exercises(day.id)?;
                print_day_table(&day, exercises, header_color);
            }
        }

        // --- Exercise commands ---
        cli::Commands::AddExercise {
            day_id,
            name,
            sets,
            reps,
            link,
            muscle,
        } => {
            let id = service.add_exercise(
                day_id,
                &name,
                sets,
                reps,
                link.as_deref(),
                muscle.map(Into::into),
            )?;
            println!("Added exercise '{}' ID: {id}", name.trim());
        }
        cli::Commands::EditExercise {
            exercise_id,
            name,
            sets,
            reps,
            link,
            muscle,
        } => {
            // An empty link string clears the stored link.
            let link_update = match link {
                Some(ref s) if s.trim().is_empty() => Some(None),
                Some(s) => Some(Some(s)),
                None => None,
            };
            service.edit_exercise(EditExerciseParams {
                id: exercise_id,
                new_name: name,
                new_sets: sets,
                new_reps: reps,
                new_web_link: link_update,
                new_muscle_group: muscle.map(|m| Some(m.into())),
            })?;
            println!("Updated exercise {exercise_id}. Future scheduled sessions follow the change.");
        }
        cli::Commands::DeleteExercise { exercise_id } => {
            service.delete_exercise(exercise_id)?;
            println!("Deleted exercise {exercise_id}.");
        }

        // --- Recurrence commands ---
        cli::Commands::Recur {
            day_id,
            every,
            weekdays,
        } => {
            let id = service.add_recurring_rule(day_id, every, weekdays.as_deref())?;
            println!("Created recurring rule ID: {id}. Run 'reconcile' to schedule it.");
        }
        cli::Commands::EditRecur {
            rule_id,
            every,
            weekdays,
            clear_weekdays,
        } => {
            let weekday_update = if clear_weekdays {
                Some(None)
            } else {
                weekdays.as_deref().map(Some)
            };
            service.edit_recurring_rule(rule_id, every, weekday_update)?;
            println!("Updated recurring rule {rule_id}.");
        }
        cli::Commands::DeleteRecur { rule_id } => {
            service.delete_recurring_rule(rule_id)?;
            println!("Deleted recurring rule {rule_id}. Already scheduled sessions remain.");
        }
        cli::Commands::Schedule => {
            let preview = service.preview_schedule()?;
            if preview.is_empty() {
                println!("No recurring rules. Create one with 'recur'.");
            } else {
                print_schedule_table(preview, header_color);
            }
        }
        cli::Commands::Reconcile => {
            let report = service.reconcile_schedule()?;
            for (rule_id, log_id, date) in &report.created {
                println!("Rule {rule_id}: scheduled log {log_id} on {date}.");
            }
            if report.skipped > 0 {
                println!("{} rule(s) already scheduled.", report.skipped);
            }
            for (rule_id, error) in &report.failed {
                eprintln!("Rule {rule_id} failed: {error}");
            }
            if report.created.is_empty() && report.failed.is_empty() {
                println!("Schedule is up to date.");
            }
        }
        cli::Commands::ScheduleDay { day_id, date } => {
            let date = match date {
                Some(ref s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))?,
                None => today_local(),
            };
            let log_id = service.schedule_workout(day_id, date)?;
            println!("Scheduled log {log_id} on {date}.");
        }

        // --- Log commands ---
        cli::Commands::Logs {
            upcoming,
            past,
            limit,
        } => {
            let logs = if upcoming {
                service.upcoming_logs()?
            } else if past {
                service.past_logs(limit)?
            } else {
                service.list_logs(&gym_planner_lib::LogFilters {
                    limit,
                    ..Default::default()
                })?
            };
            if logs.is_empty() {
                println!("No workout logs found.");
            } else {
                print_log_table(logs, header_color);
            }
        }
        cli::Commands::Log { log_id } => {
            let details = service.log_details(log_id)?;
            print_log_details(&details, header_color, service.config.units);
        }
        cli::Commands::DeleteLog { log_id } => {
            service.delete_log(log_id)?;
            println!("Deleted workout log {log_id}.");
        }
        cli::Commands::RecordSet {
            log_id,
            logged_exercise_id,
            set_number,
            weight,
            reps,
        } => {
            service.record_set(log_id, logged_exercise_id, set_number, weight, reps)?;
            println!(
                "Recorded set {set_number}: {weight} {} x {reps}.",
                service.config.units.weight_abbr()
            );
        }

        // --- Session ---
        cli::Commands::Start { log_id } => {
            run_session(&mut service, log_id)?;
        }

        // --- Preferences ---
        cli::Commands::SetRest {
            between_sets,
            between_exercises,
        } => {
            if between_sets.is_none() && between_exercises.is_none() {
                bail!("Give --between-sets and/or --between-exercises.");
            }
            if let Some(secs) = between_sets {
                service.set_rest_between_sets(secs)?;
                println!("Rest between sets set to {secs}s.");
            }
            if let Some(secs) = between_exercises {
                service.set_rest_between_exercises(secs)?;
                println!("Rest between exercises set to {secs}s.");
            }
        }
        cli::Commands::SetAutoFill { weight, reps } => {
            if weight.is_none() && reps.is_none() {
                bail!("Give --weight and/or --reps.");
            }
            if let Some(enabled) = weight {
                service.set_auto_fill_weight(enabled)?;
                println!("Weight auto-fill {}.", on_off(enabled));
            }
            if let Some(enabled) = reps {
                service.set_auto_fill_reps(enabled)?;
                println!("Reps auto-fill {}.", on_off(enabled));
            }
        }
        cli::Commands::SetUnits { units } => {
            let units = match units {
                cli::UnitsCli::Metric => Units::Metric,
                cli::UnitsCli::Imperial => Units::Imperial,
            };
            service.set_units(units)?;
            println!("Units set to {units:?}.");
        }

        // --- Export / paths ---
        cli::Commands::ExportCsv => {
            service.export_sets_csv(stdout().lock())?;
        }
        cli::Commands::DbPath => {
            println!("{}", service.db_path.display());
        }
        cli::Commands::ConfigPath => {
            println!("{}", service.get_config_path().display());
        }
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn header_color(service: &AppService) -> Color {
    parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green)
}

// --- Interactive session runner ---

/// Drives a session from the terminal. Input lines arrive over a channel so
/// the main loop can keep ticking the clock once a second while waiting.
fn run_session(service: &mut AppService, log_id: i64) -> Result<()> {
    let mut session = match gym_planner_lib::session::load_snapshot(log_id)? {
        Some(snapshot) => {
            let now = Local::now().timestamp();
            let (session, rest_finished) = snapshot.fast_forward(now);
            println!("Resuming saved session.");
            if rest_finished {
                println!("Rest finished while you were away.");
            }
            session
        }
        None => service.start_session(log_id)?,
    };

    let details = service.log_details(log_id)?;
    println!(
        "{} / {} on {}",
        details.entry.workout_name,
        details.entry.day_name,
        date_from_timestamp(details.entry.workout_date)
    );
    if session.stage == Stage::Overview {
        print_session_overview(&session);
        session.handle(SessionEvent::Begin)?;
    }
    print_current_set(&session, service.config.units);
    println!("Commands: w <weight>, r <reps>, d(one), s(kip), x (next exercise), + (more rest), n (skip rest), f(inish), q(uit & save), ?");

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let mut line = String::new();
        while stdin().read_line(&mut line).is_ok() {
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
            line.clear();
        }
    });

    let mut awaiting_finish_confirm = false;
    loop {
        let outcome = match rx.recv_timeout(Duration::from_secs(1)) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let outcome = session.handle(SessionEvent::Tick)?;
                if session.stage == Stage::Rest {
                    print!("\rRest: {:>3}s  ", session.rest_remaining);
                    use std::io::Write;
                    stdout().flush().ok();
                }
                outcome
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                save_and_exit(&session)?;
                return Ok(());
            }
            Ok(line) => {
                if awaiting_finish_confirm {
                    awaiting_finish_confirm = false;
                    if line.eq_ignore_ascii_case("y") {
                        session.handle(SessionEvent::FinishWorkout)?
                    } else {
                        println!("Going back to the first skipped set.");
                        let outcome = session.handle(SessionEvent::RevisitSkipped)?;
                        print_current_set(&session, service.config.units);
                        outcome
                    }
                } else {
                    match handle_session_command(&mut session, &line) {
                        Ok(Some(outcome)) => outcome,
                        Ok(None) => {
                            save_and_exit(&session)?;
                            return Ok(());
                        }
                        Err(e) => {
                            eprintln!("{e}");
                            Outcome::Continue
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::Continue => {}
            Outcome::RestStarted(secs) => {
                println!("Resting {secs}s. '+' adds 15s, 'n' skips.");
            }
            Outcome::RestFinished => {
                println!();
                print_current_set(&session, service.config.units);
            }
            Outcome::FinishPrompt => {
                println!("Only skipped sets remain. Finish the workout? [y/N]");
                awaiting_finish_confirm = true;
            }
            Outcome::Finished {
                duration_secs,
                sets,
            } => {
                service.save_session_results(log_id, duration_secs, &sets)?;
                println!(
                    "Workout saved: {} set(s) in {}m{:02}s.",
                    sets.len(),
                    duration_secs / 60,
                    duration_secs % 60
                );
                return Ok(());
            }
        }
    }
}

/// Returns `Ok(None)` when the user asked to save and quit.
fn handle_session_command(session: &mut Session, line: &str) -> Result<Option<Outcome>> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let outcome = match command {
        "" => Outcome::Continue,
        "w" => {
            let weight: f64 = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("Usage: w <weight>"))?
                .parse()
                .context("Weight must be a number")?;
            session.handle(SessionEvent::UpdateWeight(weight))?
        }
        "r" => {
            let reps: i64 = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("Usage: r <reps>"))?
                .parse()
                .context("Reps must be a whole number")?;
            session.handle(SessionEvent::UpdateReps(reps))?
        }
        "d" | "done" => session.handle(SessionEvent::CompleteSet)?,
        "s" | "skip" => session.handle(SessionEvent::SkipSet)?,
        "x" | "next" => session.handle(SessionEvent::SkipToNextExercise)?,
        "+" => session.handle(SessionEvent::ExtendRest)?,
        "n" => session.handle(SessionEvent::SkipRest)?,
        "f" | "finish" => session.handle(SessionEvent::FinishWorkout)?,
        "q" | "quit" | "save" => return Ok(None),
        "?" | "help" => {
            println!("w <weight>  set the weight for this set");
            println!("r <reps>    set the reps for this set");
            println!("d           complete the set and start resting");
            println!("s           skip this set");
            println!("x           skip the rest of this exercise");
            println!("+           add 15s to the rest");
            println!("n           skip the rest");
            println!("f           finish the workout");
            println!("q           save the session and exit");
            Outcome::Continue
        }
        other => {
            eprintln!("Unknown command '{other}'. Type '?' for help.");
            Outcome::Continue
        }
    };
    Ok(Some(outcome))
}

fn save_and_exit(session: &Session) -> Result<()> {
    if session.stage == Stage::Completed {
        return Ok(());
    }
    let snapshot = TimerSnapshot::capture(session, Local::now().timestamp());
    gym_planner_lib::session::save_snapshot(&snapshot)?;
    println!(
        "Session saved. Resume with 'start {}'.",
        session.workout_log_id
    );
    Ok(())
}

fn print_session_overview(session: &Session) {
    let mut last_exercise = 0;
    for set in &session.sets {
        if set.logged_exercise_id != last_exercise {
            println!("  {}", set.exercise_name);
            last_exercise = set.logged_exercise_id;
        }
    }
    println!("{} set(s) total. Starting.", session.sets.len());
}

fn print_current_set(session: &Session, units: Units) {
    if session.stage == Stage::Completed {
        return;
    }
    let set = session.current_set();
    let total_sets = session
        .sets
        .iter()
        .filter(|s| s.logged_exercise_id == set.logged_exercise_id)
        .count();
    let weight = set
        .weight
        .map(|w| format!("{w} {}", units.weight_abbr()))
        .unwrap_or_else(|| "-".to_string());
    let reps = set
        .reps
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} set {}/{} (goal {} reps) | weight: {weight}, reps: {reps}",
        set.exercise_name, set.set_number, total_sets, set.goal_reps
    );
}

// --- Table rendering ---

fn print_workout_table(workouts: Vec<Workout>, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Workout").fg(header_color),
        ]);
    for workout in workouts {
        table.add_row(vec![Cell::new(workout.id.to_string()), Cell::new(workout.name)]);
    }
    println!("{table}");
}

fn print_day_table(day: &Day, exercises: Vec<TemplateExercise>, header_color: Color) {
    println!("Day {} '{}'", day.id, day.name);
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Sets").fg(header_color),
            Cell::new("Reps").fg(header_color),
            Cell::new("Muscle").fg(header_color),
            Cell::new("Link").fg(header_color),
        ]);
    for exercise in exercises {
        table.add_row(vec![
            Cell::new(exercise.id.to_string()),
            Cell::new(exercise.name),
            Cell::new(exercise.sets.to_string()),
            Cell::new(exercise.reps.to_string()),
            Cell::new(
                exercise
                    .muscle_group
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(exercise.web_link.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_schedule_table(preview: Vec<(RecurringRule, NaiveDate)>, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Workout").fg(header_color),
            Cell::new("Day").fg(header_color),
            Cell::new("Cadence").fg(header_color),
            Cell::new("Next").fg(header_color),
        ]);
    for (rule, next) in preview {
        let cadence = match rule.days_of_week.as_deref() {
            Some(days) if !days.trim().is_empty() => format!("weekdays {days}"),
            _ => format!("every {} day(s)", rule.interval_days),
        };
        table.add_row(vec![
            Cell::new(rule.id.to_string()),
            Cell::new(rule.workout_name),
            Cell::new(rule.day_name),
            Cell::new(cadence),
            Cell::new(next.to_string()),
        ]);
    }
    println!("{table}");
}

fn print_log_table(logs: Vec<WorkoutLogEntry>, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Date").fg(header_color),
            Cell::new("Workout").fg(header_color),
            Cell::new("Day").fg(header_color),
            Cell::new("Completed").fg(header_color),
        ]);
    for log in logs {
        let completed = log
            .completion_time
            .map(|secs| format!("{}m{:02}s", secs / 60, secs % 60))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(log.id.to_string()),
            Cell::new(date_from_timestamp(log.workout_date).to_string()),
            Cell::new(log.workout_name),
            Cell::new(log.day_name),
            Cell::new(completed),
        ]);
    }
    println!("{table}");
}

fn print_log_details(details: &LogDetails, header_color: Color, units: Units) {
    println!(
        "Log {}: {} / {} on {}",
        details.entry.id,
        details.entry.workout_name,
        details.entry.day_name,
        date_from_timestamp(details.entry.workout_date)
    );
    if let Some(secs) = details.entry.completion_time {
        println!("Completed in {}m{:02}s", secs / 60, secs % 60);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Plan").fg(header_color),
            Cell::new(format!("Recorded ({})", units.weight_abbr())).fg(header_color),
        ]);
    for exercise in &details.exercises {
        let recorded: Vec<String> = details
            .sets
            .iter()
            .filter(|s| s.logged_exercise_id == exercise.id)
            .map(|s| format!("#{}: {} x {}", s.set_number, s.weight, s.reps))
            .collect();
        table.add_row(vec![
            Cell::new(exercise.id.to_string()),
            Cell::new(&exercise.name),
            Cell::new(format!("{} x {}", exercise.sets, exercise.reps)),
            Cell::new(if recorded.is_empty() {
                "-".to_string()
            } else {
                recorded.join(", ")
            }),
        ]);
    }
    println!("{table}");
}
