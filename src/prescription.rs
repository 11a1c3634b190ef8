//! Prescription builder
//!
//! Turns a selected exercise plus a solved load into concrete working sets:
//! target reps, target RPE, rest periods, back-off sets, and the warmup ramp
//! for loaded main lifts. Block modifiers shape every prescription; the RIR
//! contract is `RIR = 10 - RPE` with RIR clamped to `[0, 4]`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{
    Equipment, Exercise, Goal, SetRole, TrainingAge, WorkoutExercise, WorkoutSet,
};
use crate::periodization::{adjusted_rir, PrescriptionModifiers};
use crate::progression::{round_to_half, LoadDecision, RepRange};

/// Everything block- and user-level that shapes a single prescription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrescriptionContext {
    pub goal: Goal,
    pub training_age: TrainingAge,
    pub modifiers: PrescriptionModifiers,
    pub is_deload: bool,
}

/// Half-open rep range by goal and role; library overrides win.
pub fn rep_range(exercise: &Exercise, goal: Goal, is_main: bool) -> RepRange {
    if let Some((min, max)) = exercise.rep_range {
        return RepRange { min, max };
    }
    let (min, max) = match (goal.normalized(), is_main) {
        (Goal::Strength, true) => (3, 6),
        (Goal::Strength, false) => (6, 10),
        (Goal::Hypertrophy, true) => (6, 11),
        (Goal::Hypertrophy, false) => (8, 16),
        (Goal::StrengthHypertrophy, true) => (4, 9),
        (Goal::StrengthHypertrophy, false) => (8, 13),
        (Goal::FatLoss, true) => (8, 13),
        (Goal::FatLoss, false) => (12, 21),
        (_, true) => (6, 11),
        (_, false) => (10, 16),
    };
    RepRange { min, max }
}

/// Base target RPE by goal and training age, before block adjustment.
pub fn base_target_rpe(goal: Goal, age: TrainingAge) -> Decimal {
    match (goal.normalized(), age) {
        (Goal::Strength | Goal::StrengthHypertrophy, TrainingAge::Beginner) => dec!(7),
        (Goal::Strength | Goal::StrengthHypertrophy, TrainingAge::Intermediate) => dec!(7.5),
        (Goal::Strength | Goal::StrengthHypertrophy, TrainingAge::Advanced) => dec!(8),
        (Goal::Hypertrophy, TrainingAge::Beginner) => dec!(7.5),
        (Goal::Hypertrophy, TrainingAge::Intermediate) => dec!(8),
        (Goal::Hypertrophy, TrainingAge::Advanced) => dec!(8.5),
        (Goal::FatLoss, TrainingAge::Beginner) => dec!(7.5),
        (Goal::FatLoss, _) => dec!(8),
        (_, TrainingAge::Beginner) => dec!(7),
        (_, _) => dec!(7.5),
    }
}

/// Back-off set load fraction of the top set.
pub fn back_off_multiplier(goal: Goal) -> Decimal {
    match goal.normalized() {
        Goal::Strength => dec!(0.90),
        Goal::StrengthHypertrophy => dec!(0.88),
        Goal::Hypertrophy | Goal::FatLoss => dec!(0.85),
        _ => dec!(0.87),
    }
}

/// Base rest period before the block's rest multiplier.
///
/// Heavy compound low-rep work rests at least three minutes; isolation work
/// recovers in 60-90 seconds.
pub fn rest_seconds(exercise: &Exercise, is_main: bool, target_reps: u32) -> u32 {
    if is_main && exercise.is_compound && target_reps <= 5 {
        180
    } else if is_main {
        150
    } else if exercise.is_compound {
        135
    } else {
        75
    }
}

/// Run a base RPE through the block's RIR adjustment and the deload cap.
fn apply_rir_adjustment(base: Decimal, ctx: &PrescriptionContext) -> Decimal {
    let base_rir = 10.0 - base.to_f64().unwrap_or(8.0);
    let rir = adjusted_rir(base_rir, ctx.modifiers.rir_adjustment);
    let mut rpe = round_to_half(Decimal::from_f64(10.0 - rir).unwrap_or(base));
    if ctx.is_deload {
        rpe = rpe.min(dec!(6));
    }
    rpe
}

/// Block-adjusted target RPE before any per-exercise bump. This is the
/// effort level the load solver targets when it back-solves from an
/// estimated 1RM.
pub fn block_adjusted_rpe(ctx: &PrescriptionContext) -> Decimal {
    apply_rir_adjustment(base_target_rpe(ctx.goal, ctx.training_age), ctx)
}

/// Resolve the working target RPE for one exercise under block modifiers.
fn target_rpe(exercise: &Exercise, is_main: bool, ctx: &PrescriptionContext) -> Decimal {
    let mut base = base_target_rpe(ctx.goal, ctx.training_age);
    if !is_main && !exercise.is_compound && ctx.goal.normalized() == Goal::Hypertrophy {
        // Accessory isolation tolerates closer proximity to failure.
        base += dec!(0.5);
    }
    apply_rir_adjustment(base, ctx)
}

fn warmup_ramp(age: TrainingAge) -> Vec<(Decimal, u32, u32)> {
    match age {
        // (fraction of top set, reps, rest seconds)
        TrainingAge::Beginner => vec![(dec!(0.6), 8, 60), (dec!(0.8), 3, 90)],
        _ => vec![(dec!(0.5), 8, 60), (dec!(0.7), 5, 60), (dec!(0.85), 3, 90)],
    }
}

/// Build the full prescription for one selected exercise.
///
/// Set count scales with the block volume multiplier, the top-set load with
/// the intensity multiplier, and rests with the rest multiplier. Main lifts
/// get back-off sets after the top set and, when loaded, a warmup ramp.
pub fn prescribe(
    exercise: &Exercise,
    is_main: bool,
    set_target: u32,
    load: &LoadDecision,
    ctx: &PrescriptionContext,
    order_index: u32,
) -> WorkoutExercise {
    let role = if is_main { SetRole::Main } else { SetRole::Accessory };
    let range = rep_range(exercise, ctx.goal, is_main);
    let rpe = target_rpe(exercise, is_main, ctx);

    let set_count = ((f64::from(set_target) * ctx.modifiers.volume_multiplier).round() as u32).max(1);
    let rest = {
        let base = rest_seconds(exercise, is_main, range.min);
        (f64::from(base) * ctx.modifiers.rest_multiplier).round() as u32
    };

    let intensity = Decimal::from_f64(ctx.modifiers.intensity_multiplier).unwrap_or(Decimal::ONE);
    let top_set_load = load.load.map(|l| {
        let mut adjusted = l * intensity;
        if ctx.is_deload {
            adjusted *= back_off_multiplier(ctx.goal);
        }
        round_to_half(adjusted)
    });
    let back_off_load = top_set_load.map(|l| round_to_half(l * back_off_multiplier(ctx.goal)));

    let mut sets = Vec::with_capacity(set_count as usize);
    for set_index in 0..set_count {
        let is_back_off = is_main && set_index > 0;
        sets.push(WorkoutSet {
            set_index,
            role,
            target_reps: range.min,
            target_load: if is_back_off { back_off_load } else { top_set_load },
            target_rpe: Some(rpe),
            rest_seconds: Some(rest),
            is_back_off,
        });
    }

    let warmup_sets = match top_set_load {
        Some(top) if is_main => warmup_ramp(ctx.training_age)
            .iter()
            .enumerate()
            .map(|(i, (fraction, reps, rest))| WorkoutSet {
                set_index: i as u32,
                role: SetRole::Warmup,
                target_reps: *reps,
                target_load: Some(round_to_half(top * fraction)),
                target_rpe: None,
                rest_seconds: Some(*rest),
                is_back_off: false,
            })
            .collect(),
        _ => Vec::new(),
    };

    WorkoutExercise {
        exercise_id: exercise.id.clone(),
        order_index,
        role,
        is_main_lift: is_main,
        sets,
        warmup_sets,
    }
}

/// Smallest increment the prescription's implement supports; used by
/// microloading interventions.
pub fn microload_increment(equipment: Equipment) -> Decimal {
    match equipment {
        Equipment::Barbell => dec!(2.5),
        Equipment::Dumbbell | Equipment::Kettlebell => dec!(1),
        _ => dec!(2.5),
    }
}
