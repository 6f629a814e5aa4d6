// src/cli.rs
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use gym_planner_lib::MuscleGroup;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan workout templates, schedule recurring sessions and log your lifts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuscleGroupCli {
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

impl From<MuscleGroupCli> for MuscleGroup {
    fn from(value: MuscleGroupCli) -> Self {
        match value {
            MuscleGroupCli::Chest => MuscleGroup::Chest,
            MuscleGroupCli::Back => MuscleGroup::Back,
            MuscleGroupCli::Shoulders => MuscleGroup::Shoulders,
            MuscleGroupCli::Biceps => MuscleGroup::Biceps,
            MuscleGroupCli::Triceps => MuscleGroup::Triceps,
            MuscleGroupCli::Forearms => MuscleGroup::Forearms,
            MuscleGroupCli::Abs => MuscleGroup::Abs,
            MuscleGroupCli::Legs => MuscleGroup::Legs,
            MuscleGroupCli::Glutes => MuscleGroup::Glutes,
            MuscleGroupCli::Hamstrings => MuscleGroup::Hamstrings,
            MuscleGroupCli::Calves => MuscleGroup::Calves,
            MuscleGroupCli::Quads => MuscleGroup::Quads,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitsCli {
    Metric,
    Imperial,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new workout template
    CreateWorkout {
        /// Name of the workout (e.g., "Push Pull Legs")
        name: String,
    },
    /// Rename a workout template
    RenameWorkout {
        /// Workout name or ID
        identifier: String,
        new_name: String,
    },
    /// Delete a workout template, its days and its future scheduled sessions
    DeleteWorkout {
        /// Workout name or ID
        identifier: String,
    },
    /// List workout templates
    ListWorkouts,
    /// Add a day to a workout template
    AddDay {
        /// Workout name or ID
        workout: String,
        /// Name of the day (e.g., "Push")
        name: String,
    },
    /// Rename a day
    RenameDay {
        day_id: i64,
        new_name: String,
    },
    /// Delete a day, its exercises and its future scheduled sessions
    DeleteDay {
        day_id: i64,
    },
    /// Swap the positions of two days of the same workout
    SwapDays {
        day_a: i64,
        day_b: i64,
    },
    /// List days of a workout with their exercises
    ListDays {
        /// Workout name or ID
        workout: String,
    },
    /// Add an exercise to a day
    AddExercise {
        day_id: i64,
        /// Name of the exercise (e.g., "Bench Press")
        name: String,
        /// Number of sets
        #[arg(short, long)]
        sets: i64,
        /// Goal repetitions per set
        #[arg(short, long)]
        reps: i64,
        /// Link to a form video or reference page
        #[arg(short, long)]
        link: Option<String>,
        /// Primary muscle group
        #[arg(short, long, value_enum)]
        muscle: Option<MuscleGroupCli>,
    },
    /// Edit an exercise; future scheduled sessions follow the change
    EditExercise {
        exercise_id: i64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        sets: Option<i64>,
        #[arg(short, long)]
        reps: Option<i64>,
        #[arg(short, long)]
        link: Option<String>,
        #[arg(short, long, value_enum)]
        muscle: Option<MuscleGroupCli>,
    },
    /// Remove an exercise from a day
    DeleteExercise {
        exercise_id: i64,
    },
    /// Make a day recur on a fixed interval or on weekdays
    Recur {
        day_id: i64,
        /// Repeat every N days, counted from today
        #[arg(short, long, conflicts_with = "weekdays")]
        every: Option<i64>,
        /// Comma-separated weekdays, 0 = Sunday through 6 = Saturday (e.g., "1,3,5")
        #[arg(short, long)]
        weekdays: Option<String>,
    },
    /// Edit a recurring rule
    EditRecur {
        rule_id: i64,
        #[arg(short, long, conflicts_with = "weekdays")]
        every: Option<i64>,
        #[arg(short, long)]
        weekdays: Option<String>,
        /// Drop the weekday list and fall back to the interval
        #[arg(long, conflicts_with = "weekdays")]
        clear_weekdays: bool,
    },
    /// Delete a recurring rule (already scheduled sessions stay)
    DeleteRecur {
        rule_id: i64,
    },
    /// Show recurring rules and the date each will next fire
    Schedule,
    /// Materialize the next occurrence of every recurring rule
    Reconcile,
    /// Schedule a one-off session of a day
    ScheduleDay {
        day_id: i64,
        /// Date in YYYY-MM-DD format; defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List workout logs
    Logs {
        /// Show only upcoming sessions (today and later)
        #[arg(long, conflicts_with = "past")]
        upcoming: bool,
        /// Show only past sessions
        #[arg(long)]
        past: bool,
        /// Show only the last N entries
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show one log with its exercises and recorded sets
    Log {
        log_id: i64,
    },
    /// Delete a log with its recorded sets
    DeleteLog {
        log_id: i64,
    },
    /// Record a single set result against a log
    RecordSet {
        log_id: i64,
        logged_exercise_id: i64,
        set_number: i64,
        weight: f64,
        reps: i64,
    },
    /// Run a scheduled session interactively, with rest timers
    Start {
        log_id: i64,
    },
    /// Configure rest durations in seconds
    SetRest {
        /// Rest after a set of the same exercise
        #[arg(long)]
        between_sets: Option<u64>,
        /// Rest before the next exercise
        #[arg(long)]
        between_exercises: Option<u64>,
    },
    /// Configure weight/reps pre-filling during sessions
    SetAutoFill {
        #[arg(long)]
        weight: Option<bool>,
        #[arg(long)]
        reps: Option<bool>,
    },
    /// Set display units
    SetUnits {
        #[arg(value_enum)]
        units: UnitsCli,
    },
    /// Export every recorded set as CSV to stdout
    ExportCsv,
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
