//! Planning engine orchestration
//!
//! `plan_session` wires the subsystems together: context resolution, history
//! indexing, fatigue scoring, exercise selection, load solving, prescription,
//! and autoregulation. The engine is a pure function of its inputs; all
//! timestamps arrive from the caller.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::autoregulation::{
    apply_action, select_action, AutoregulationPolicy, ModificationLog,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, InvalidInputError, Result};
use crate::explain::{
    coach_messages, exercise_rationales, filtered_summaries, prescription_rationales,
    volume_compliance, CoachMessage, ExerciseRationale, FilteredExerciseSummary,
    PrescriptionRationale, SessionContext, VolumeCompliance,
};
use crate::history::{HistoryIndex, HistoryIndexOptions};
use crate::models::{
    Exercise, ReadinessSignal, UserBaseline, WorkoutHistoryEntry, WorkoutPlan,
};
use crate::periodization::{
    derive_block_context, ContextSource, CycleContextSnapshot, MacroCycle, PrescriptionModifiers,
};
use crate::prescription::{block_adjusted_rpe, prescribe, rep_range, PrescriptionContext};
use crate::progression::{next_top_set_load, LoadBasis, ProgressionContext};
use crate::readiness::{score_readiness, FatigueScore};
use crate::selection::{select_exercises, SelectionContext, SelectionInput, SelectionResult};

/// Everything one planning call consumes.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub date: NaiveDate,
    pub selection: SelectionInput,
    pub macro_cycle: Option<&'a MacroCycle>,
    /// Substitute context when no macro covers the date.
    pub fallback_context: Option<CycleContextSnapshot>,
    pub readiness: Option<&'a ReadinessSignal>,
    pub baselines: &'a [UserBaseline],
    pub bodyweight: Option<Decimal>,
    pub policy: AutoregulationPolicy,
    /// Caller-supplied wall clock, for readiness signal age only.
    pub now: DateTime<Utc>,
}

/// Everything one planning call produces.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: WorkoutPlan,
    pub selection: SelectionResult,
    pub fatigue: FatigueScore,
    pub modifications: ModificationLog,
    pub context: SessionContext,
    pub rationales: Vec<ExerciseRationale>,
    pub prescriptions: Vec<PrescriptionRationale>,
    pub coach_messages: Vec<CoachMessage>,
    pub filtered: Vec<FilteredExerciseSummary>,
    pub volume: Vec<VolumeCompliance>,
}

fn validate_inputs(
    library: &[Exercise],
    history: &[WorkoutHistoryEntry],
    request: &PlanRequest<'_>,
) -> Result<()> {
    if request.selection.session_minutes == 0 {
        return Err(EngineError::InvalidInput(
            InvalidInputError::InvalidSessionMinutes { minutes: 0 },
        ));
    }

    for exercise in library {
        let in_band = |v: u8| (1..=5).contains(&v);
        if !in_band(exercise.fatigue_cost) || !in_band(exercise.sfr) || !in_band(exercise.length_position)
        {
            return Err(EngineError::InvalidInput(
                InvalidInputError::MalformedExercise {
                    exercise_id: exercise.id.clone(),
                    reason: "fatigue_cost, sfr, and length_position must be 1-5".to_string(),
                },
            ));
        }
    }

    for id in &request.selection.pinned_exercise_ids {
        if !library.iter().any(|e| e.id == *id) {
            return Err(EngineError::InvalidInput(InvalidInputError::UnknownExercise {
                exercise_id: id.clone(),
            }));
        }
    }

    for entry in history {
        for exercise in &entry.exercises {
            for set in &exercise.sets {
                if set.load.map_or(false, |l| l < Decimal::ZERO) {
                    return Err(EngineError::InvalidInput(InvalidInputError::MalformedSet {
                        exercise_id: exercise.exercise_id.clone(),
                        reason: "negative load".to_string(),
                    }));
                }
            }
        }
    }

    Ok(())
}

fn resolve_context(request: &PlanRequest<'_>) -> CycleContextSnapshot {
    if let Some(macro_cycle) = request.macro_cycle {
        if let Some(ctx) = derive_block_context(macro_cycle, request.date) {
            return ctx.snapshot();
        }
        warn!(date = %request.date, "date outside macro bounds; falling back");
    }
    match request.fallback_context {
        Some(mut snapshot) => {
            snapshot.source = ContextSource::Fallback;
            snapshot
        }
        None => CycleContextSnapshot::default_fallback(),
    }
}

/// Plan one session. Behavioral edge cases (empty history, infeasible
/// slots, missing readiness) degrade gracefully; only schema violations
/// error.
#[instrument(skip_all, fields(date = %request.date, intent = ?request.selection.intent))]
pub fn plan_session(
    library: &[Exercise],
    history: &[WorkoutHistoryEntry],
    request: &PlanRequest<'_>,
    config: &EngineConfig,
) -> Result<PlanOutcome> {
    validate_inputs(library, history, request)?;

    let cycle = resolve_context(request);

    // Seeding the first session of a fresh meso anchors progression on the
    // previous meso's heaviest accumulation week.
    let meso_seed = cycle.source == ContextSource::Computed
        && cycle.week_in_meso == 1
        && cycle.week_in_macro > 1;
    let index = HistoryIndex::build(
        history,
        &HistoryIndexOptions {
            intent: None,
            meso_seed,
        },
    );

    let fatigue = score_readiness(request.readiness, request.now);

    let selection_ctx = SelectionContext {
        date: request.date,
        week_in_meso: cycle.week_in_meso,
        meso_length: cycle.meso_length_weeks,
        is_deload: cycle.is_deload(),
        fatigue_overall: fatigue.overall,
    };
    let selection = select_exercises(library, &index, &request.selection, &selection_ctx, config);

    let modifiers = PrescriptionModifiers::for_context(&cycle);
    let prescription_ctx = PrescriptionContext {
        goal: request.selection.goal,
        training_age: request.selection.training_age,
        modifiers,
        is_deload: cycle.is_deload(),
    };
    let progression_ctx = ProgressionContext {
        training_age: request.selection.training_age,
        is_deload: cycle.is_deload(),
        week_in_block: cycle.week_in_block,
    };
    // The solver back-solves against the block-adjusted effort target, not
    // the raw goal x training-age base.
    let solver_rpe = block_adjusted_rpe(&prescription_ctx);

    let mut main_lifts = Vec::new();
    let mut accessories = Vec::new();
    let mut load_bases: Vec<(String, String)> = Vec::new();

    for picked in &selection.selected {
        let Some(exercise) = library.iter().find(|e| e.id == picked.exercise_id) else {
            continue;
        };
        let is_main = selection.main_lift_ids.contains(&picked.exercise_id);
        let range = rep_range(exercise, request.selection.goal, is_main);
        let decision = next_top_set_load(
            exercise,
            &index,
            library,
            request.baselines,
            range,
            solver_rpe,
            &progression_ctx,
            request.selection.goal,
            request.bodyweight,
        );
        load_bases.push((exercise.id.clone(), load_basis_label(&decision.basis)));

        let prescription = prescribe(
            exercise,
            is_main,
            picked.set_target,
            &decision,
            &prescription_ctx,
            picked.order_index,
        );
        if is_main {
            main_lifts.push(prescription);
        } else {
            accessories.push(prescription);
        }
    }

    let mut plan = WorkoutPlan {
        main_lifts,
        accessories,
        estimated_minutes: 0.0,
        notes: None,
    };
    enforce_timebox(
        &mut plan,
        library,
        f64::from(request.selection.session_minutes),
        config,
    );
    plan.estimated_minutes =
        estimated_plan_minutes(library, &plan.main_lifts, &plan.accessories);

    let action = select_action(&fatigue, &request.policy);
    let modifications = apply_action(&mut plan, action);
    plan.estimated_minutes =
        estimated_plan_minutes(library, &plan.main_lifts, &plan.accessories);

    info!(
        exercises = plan.main_lifts.len() + plan.accessories.len(),
        minutes = plan.estimated_minutes,
        action = ?modifications.action,
        "session planned"
    );

    let context = SessionContext::from_parts(
        request.date,
        request.selection.intent,
        request.selection.goal,
        request.selection.training_age,
        &cycle,
        &fatigue,
    );
    let weekly_actual = index.weekly_sets_per_muscle(request.date, 7);

    Ok(PlanOutcome {
        rationales: exercise_rationales(&selection),
        prescriptions: prescription_rationales(&plan, &load_bases),
        coach_messages: coach_messages(&fatigue, Some(&modifications), &selection),
        filtered: filtered_summaries(&selection),
        volume: volume_compliance(
            &selection,
            &weekly_actual,
            cycle.week_in_meso,
            cycle.meso_length_weeks,
            cycle.is_deload(),
        ),
        context,
        plan,
        selection,
        fatigue,
        modifications,
    })
}

fn load_basis_label(basis: &LoadBasis) -> String {
    match basis {
        LoadBasis::DoubleProgression => "double_progression".into(),
        LoadBasis::Hold => "hold".into(),
        LoadBasis::RepDeload => "rep_deload".into(),
        LoadBasis::Autoregulated => "autoregulated".into(),
        LoadBasis::Baseline => "baseline".into(),
        LoadBasis::Donor { donor_id } => format!("donor:{}", donor_id),
        LoadBasis::Heuristic => "heuristic".into(),
        LoadBasis::Bodyweight => "bodyweight".into(),
    }
}

/// Block volume multipliers can push the prescribed plan past the session
/// budget even when selection fit. Accessories are dropped from the back
/// first; mains then shed back-off sets but are never removed and keep
/// their warmup ramps.
fn enforce_timebox(
    plan: &mut WorkoutPlan,
    library: &[Exercise],
    budget: f64,
    config: &EngineConfig,
) {
    let limit = budget * (1.0 + config.time_epsilon);
    loop {
        let estimated = estimated_plan_minutes(library, &plan.main_lifts, &plan.accessories);
        if estimated <= limit {
            return;
        }
        if let Some(dropped) = plan.accessories.pop() {
            warn!(
                exercise = %dropped.exercise_id,
                "accessory dropped to satisfy the session timebox"
            );
            continue;
        }
        let sheddable = plan
            .main_lifts
            .iter_mut()
            .max_by_key(|main| main.sets.len())
            .filter(|main| main.sets.len() > 1);
        match sheddable {
            Some(main) => {
                main.sets.pop();
            }
            None => return,
        }
    }
}

fn estimated_plan_minutes(
    library: &[Exercise],
    main_lifts: &[crate::models::WorkoutExercise],
    accessories: &[crate::models::WorkoutExercise],
) -> f64 {
    main_lifts
        .iter()
        .chain(accessories.iter())
        .map(|we| {
            let execution = library
                .iter()
                .find(|e| e.id == we.exercise_id)
                .map_or(40, |e| e.execution_seconds());
            we.estimated_minutes(execution)
        })
        .sum()
}
