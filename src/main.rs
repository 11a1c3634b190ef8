use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use liftrs::autoregulation::AutoregulationPolicy;
use liftrs::config::{default_config_path, AppConfig};
use liftrs::engine::{plan_session, PlanRequest};
use liftrs::history::{HistoryIndex, HistoryIndexOptions};
use liftrs::logging::init_logging;
use liftrs::models::{
    Equipment, Exercise, Goal, ReadinessSignal, SessionIntent, TrainingAge, UserBaseline,
    WorkoutHistoryEntry,
};
use liftrs::periodization::{
    derive_block_context, generate_macro_cycle, MacroCycle, MacroParams,
};
use liftrs::readiness::score_readiness;
use liftrs::selection::{PlanningMode, SelectionConstraints, SelectionInput};
use liftrs::stall::detect_all_stalls;
use liftrs::volume::{weekly_target, Muscle};

/// liftrs - Resistance Training Program Engine
///
/// Plans, prescribes, and autoregulates resistance-training sessions across
/// a periodized cycle, from an exercise catalog and workout history.
#[derive(Parser)]
#[command(name = "liftrs")]
#[command(version = "0.1.0")]
#[command(about = "Resistance training program engine", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a training session for a date
    Plan {
        /// Exercise catalog JSON file
        #[arg(long)]
        library: PathBuf,

        /// Workout history JSON file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Readiness signal JSON file
        #[arg(long)]
        readiness: Option<PathBuf>,

        /// Stored macro cycle JSON file
        #[arg(long)]
        cycle: Option<PathBuf>,

        /// User baselines JSON file
        #[arg(long)]
        baselines: Option<PathBuf>,

        /// Session intent (push, pull, legs, upper, lower, full-body)
        #[arg(long, default_value = "full-body")]
        intent: String,

        /// Session date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Session time budget in minutes
        #[arg(long, default_value_t = 60)]
        minutes: u32,

        /// Primary goal (hypertrophy, strength, strength-hypertrophy, fat-loss, general)
        #[arg(long, default_value = "hypertrophy")]
        goal: String,

        /// Training age (beginner, intermediate, advanced)
        #[arg(long, default_value = "intermediate")]
        age: String,

        /// Training days per week
        #[arg(long, default_value_t = 4)]
        days_per_week: u32,

        /// Available equipment, comma-separated
        #[arg(long, default_value = "barbell,dumbbell,cable,machine")]
        equipment: String,

        /// Bodyweight in lbs, for load heuristics
        #[arg(long)]
        bodyweight: Option<Decimal>,
    },

    /// Generate or inspect a periodized macro cycle
    Cycle {
        #[command(subcommand)]
        command: CycleCommands,
    },

    /// Score a readiness signal into a fatigue report
    Fatigue {
        /// Readiness signal JSON file
        #[arg(long)]
        readiness: PathBuf,
    },

    /// Detect stalled lifts across workout history
    Stall {
        /// Workout history JSON file
        #[arg(long)]
        history: PathBuf,
    },

    /// Print volume landmarks and weekly targets
    Volume {
        /// Week within the mesocycle
        #[arg(long, default_value_t = 1)]
        week: u32,

        /// Mesocycle length in weeks
        #[arg(long, default_value_t = 4)]
        meso_length: u32,

        /// Treat the week as a deload
        #[arg(long)]
        deload: bool,
    },
}

#[derive(Subcommand)]
enum CycleCommands {
    /// Generate a macro cycle
    Generate {
        /// User identifier
        #[arg(long, default_value = "local")]
        user: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Duration in weeks
        #[arg(long, default_value_t = 12)]
        weeks: u32,

        /// Training age (beginner, intermediate, advanced)
        #[arg(long, default_value = "intermediate")]
        age: String,

        /// Primary goal
        #[arg(long, default_value = "hypertrophy")]
        goal: String,

        /// Write the cycle to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve a date to its block context
    Context {
        /// Stored macro cycle JSON file
        #[arg(long)]
        cycle: PathBuf,

        /// Date to resolve (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}

fn parse_intent(s: &str) -> Result<SessionIntent> {
    Ok(match s.to_lowercase().replace('-', "_").as_str() {
        "push" => SessionIntent::Push,
        "pull" => SessionIntent::Pull,
        "legs" => SessionIntent::Legs,
        "upper" => SessionIntent::Upper,
        "lower" => SessionIntent::Lower,
        "full_body" | "fullbody" => SessionIntent::FullBody,
        "body_part" | "bodypart" => SessionIntent::BodyPart,
        other => bail!("unknown intent: {}", other),
    })
}

fn parse_goal(s: &str) -> Result<Goal> {
    Ok(match s.to_lowercase().replace('-', "_").as_str() {
        "hypertrophy" => Goal::Hypertrophy,
        "strength" => Goal::Strength,
        "strength_hypertrophy" => Goal::StrengthHypertrophy,
        "fat_loss" | "fatloss" => Goal::FatLoss,
        "athleticism" => Goal::Athleticism,
        "general_health" => Goal::GeneralHealth,
        "general" | "general_fitness" => Goal::GeneralFitness,
        other => bail!("unknown goal: {}", other),
    })
}

fn parse_age(s: &str) -> Result<TrainingAge> {
    Ok(match s.to_lowercase().as_str() {
        "beginner" => TrainingAge::Beginner,
        "intermediate" => TrainingAge::Intermediate,
        "advanced" => TrainingAge::Advanced,
        other => bail!("unknown training age: {}", other),
    })
}

fn parse_equipment(s: &str) -> Result<Vec<Equipment>> {
    s.split(',')
        .map(|item| {
            Ok(match item.trim().to_lowercase().as_str() {
                "barbell" => Equipment::Barbell,
                "dumbbell" => Equipment::Dumbbell,
                "cable" => Equipment::Cable,
                "machine" => Equipment::Machine,
                "kettlebell" => Equipment::Kettlebell,
                "band" => Equipment::Band,
                "bodyweight" => Equipment::Bodyweight,
                "sled" => Equipment::Sled,
                "other" => Equipment::Other,
                other => bail!("unknown equipment: {}", other),
            })
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {} from {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", what))
}

#[derive(Tabled)]
struct SetRow {
    exercise: String,
    role: String,
    set: u32,
    reps: u32,
    load: String,
    rpe: String,
    rest_s: String,
}

#[derive(Tabled)]
struct LandmarkRow {
    muscle: String,
    mv: u32,
    mev: u32,
    mav: u32,
    mrv: u32,
    weekly_target: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut app_config = AppConfig::load(&config_path)?;
    if cli.verbose > 0 {
        app_config.logging.level = if cli.verbose > 1 {
            liftrs::LogLevel::Trace
        } else {
            liftrs::LogLevel::Debug
        };
    }
    init_logging(&app_config.logging)?;

    let json_output = cli.format.eq_ignore_ascii_case("json");

    match cli.command {
        Commands::Plan {
            library,
            history,
            readiness,
            cycle,
            baselines,
            intent,
            date,
            minutes,
            goal,
            age,
            days_per_week,
            equipment,
            bodyweight,
        } => {
            let library: Vec<Exercise> = read_json(&library, "exercise catalog")?;
            let history: Vec<WorkoutHistoryEntry> = match history {
                Some(path) => read_json(&path, "workout history")?,
                None => Vec::new(),
            };
            let readiness: Option<ReadinessSignal> = match readiness {
                Some(path) => Some(read_json(&path, "readiness signal")?),
                None => None,
            };
            let macro_cycle: Option<MacroCycle> = match cycle {
                Some(path) => Some(read_json(&path, "macro cycle")?),
                None => None,
            };
            let baselines: Vec<UserBaseline> = match baselines {
                Some(path) => read_json(&path, "baselines")?,
                None => Vec::new(),
            };

            let selection = SelectionInput {
                mode: PlanningMode::Intent,
                intent: parse_intent(&intent)?,
                target_muscles: vec![],
                pinned_exercise_ids: vec![],
                session_minutes: minutes,
                training_age: parse_age(&age)?,
                goal: parse_goal(&goal)?,
                constraints: SelectionConstraints {
                    available_equipment: parse_equipment(&equipment)?,
                    days_per_week,
                },
                favorite_exercise_ids: vec![],
                avoided_exercise_ids: vec![],
                pain_sites: vec![],
            };
            let request = PlanRequest {
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                selection,
                macro_cycle: macro_cycle.as_ref(),
                fallback_context: None,
                readiness: readiness.as_ref(),
                baselines: &baselines,
                bodyweight,
                policy: AutoregulationPolicy::default(),
                now: Utc::now(),
            };

            let outcome = plan_session(&library, &history, &request, &app_config.engine)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
                return Ok(());
            }

            println!(
                "{} {:?} week {} of {:?} block ({} est. min)",
                "Session:".bold(),
                outcome.context.intent,
                outcome.context.week_in_block,
                outcome.context.block_type,
                outcome.plan.estimated_minutes.round()
            );
            println!("{} {}", "Readiness:".bold(), outcome.fatigue.rationale());
            if let Some(note) = &outcome.plan.notes {
                println!("{}", note.red().bold());
            }

            let mut rows = Vec::new();
            for exercise in outcome.plan.exercises() {
                for set in exercise.warmup_sets.iter().chain(exercise.sets.iter()) {
                    rows.push(SetRow {
                        exercise: exercise.exercise_id.clone(),
                        role: format!("{:?}", set.role).to_lowercase(),
                        set: set.set_index + 1,
                        reps: set.target_reps,
                        load: set
                            .target_load
                            .map_or_else(|| "-".to_string(), |l| l.to_string()),
                        rpe: set
                            .target_rpe
                            .map_or_else(|| "-".to_string(), |r| r.to_string()),
                        rest_s: set
                            .rest_seconds
                            .map_or_else(|| "-".to_string(), |r| r.to_string()),
                    });
                }
            }
            println!("{}", Table::new(rows));

            for message in &outcome.coach_messages {
                let text = match message.level {
                    liftrs::explain::CoachMessageLevel::Alert => message.text.red(),
                    liftrs::explain::CoachMessageLevel::Caution => message.text.yellow(),
                    liftrs::explain::CoachMessageLevel::Info => message.text.normal(),
                };
                println!("  {}", text);
            }
        }

        Commands::Cycle { command } => match command {
            CycleCommands::Generate {
                user,
                start,
                weeks,
                age,
                goal,
                output,
            } => {
                let macro_cycle = generate_macro_cycle(MacroParams {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user,
                    start_date: start,
                    duration_weeks: weeks,
                    training_age: parse_age(&age)?,
                    primary_goal: parse_goal(&goal)?,
                })
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

                let json = serde_json::to_string_pretty(&macro_cycle)?;
                match output {
                    Some(path) => {
                        fs::write(&path, &json)?;
                        println!("Cycle written to {}", path.display());
                    }
                    None => println!("{}", json),
                }
            }
            CycleCommands::Context { cycle, date } => {
                let macro_cycle: MacroCycle = read_json(&cycle, "macro cycle")?;
                match derive_block_context(&macro_cycle, date) {
                    Some(ctx) => {
                        if json_output {
                            println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);
                        } else {
                            println!(
                                "{} {:?} (week {} of block, week {} of meso {}, week {} of macro)",
                                "Block:".bold(),
                                ctx.block.block_type,
                                ctx.week_in_block,
                                ctx.week_in_meso,
                                ctx.mesocycle.meso_number,
                                ctx.week_in_macro
                            );
                        }
                    }
                    None => println!("{}", "Date is outside the macro cycle.".yellow()),
                }
            }
        },

        Commands::Fatigue { readiness } => {
            let signal: ReadinessSignal = read_json(&readiness, "readiness signal")?;
            let score = score_readiness(Some(&signal), Utc::now());
            if json_output {
                println!("{}", serde_json::to_string_pretty(&score)?);
            } else {
                println!("{} {:.2}", "Overall readiness:".bold(), score.overall);
                println!("  {}", score.rationale());
                for (muscle, freshness) in &score.per_muscle {
                    println!("  {muscle}: {freshness:.2}");
                }
            }
        }

        Commands::Stall { history } => {
            let entries: Vec<WorkoutHistoryEntry> = read_json(&history, "workout history")?;
            let index = HistoryIndex::build(&entries, &HistoryIndexOptions::default());
            let mut ids: Vec<String> = entries
                .iter()
                .flat_map(|e| e.exercises.iter().map(|x| x.exercise_id.clone()))
                .collect();
            ids.sort();
            ids.dedup();
            let reports = detect_all_stalls(&index, &ids);
            if json_output {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in reports {
                    let line = format!(
                        "{}: {} sessions since PR ({:.1} wks) -> {:?}",
                        report.exercise_id,
                        report.sessions_since_pr,
                        report.weeks_without_progress,
                        report.intervention
                    );
                    if report.intervention == liftrs::InterventionLevel::None {
                        println!("{}", line.green());
                    } else {
                        println!("{}", line.yellow());
                    }
                }
            }
        }

        Commands::Volume {
            week,
            meso_length,
            deload,
        } => {
            let rows: Vec<LandmarkRow> = Muscle::ALL
                .into_iter()
                .map(|muscle| {
                    let lm = muscle.landmarks();
                    LandmarkRow {
                        muscle: muscle.to_string(),
                        mv: lm.mv,
                        mev: lm.mev,
                        mav: lm.mav,
                        mrv: lm.mrv,
                        weekly_target: weekly_target(muscle, week, meso_length, deload),
                    }
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}
