//! Load progression solver
//!
//! Decides the next top-set load for an exercise from its recent sessions,
//! cascading through: modal-anchored double progression, autoregulated
//! 1RM back-solving, stored baselines, cross-exercise donor estimation, and
//! finally equipment heuristics. The cascade never fails; the worst case is
//! an equipment-default load.
//!
//! Rep ranges are half-open: the working ceiling of `[lo, hi)` is `hi - 1`.
//! Double progression adds reps until the ceiling, then adds load and resets
//! reps to `lo`.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::history::{modal_load, modal_reps, modal_rpe, weighted_modal_load, HistoryIndex};
use crate::models::{
    BaselineContext, Equipment, Exercise, Goal, MovementPattern, PerformedSet, TrainingAge,
    UserBaseline,
};

/// Half-open rep range `[min, max)` for a prescription role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepRange {
    pub min: u32,
    pub max: u32,
}

impl RepRange {
    /// Highest rep count that still sits inside the range.
    pub fn ceiling(self) -> u32 {
        self.max.saturating_sub(1).max(self.min)
    }
}

/// Which rung of the cascade produced a load.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBasis {
    /// Rep ceiling reached at manageable RPE: load added, reps reset.
    DoubleProgression,
    /// Progressing through the rep range at the same load.
    Hold,
    /// Modal reps fell under the range floor: 10% load deload.
    RepDeload,
    /// Mixed signals: load back-solved from the session's estimated 1RM.
    Autoregulated,
    /// No history: stored user baseline.
    Baseline,
    /// No history or baseline: estimated from a related exercise.
    Donor { donor_id: String },
    /// Equipment/bodyweight heuristic.
    Heuristic,
    /// Bodyweight-only exercise: no load prescribed.
    Bodyweight,
}

/// Outcome of the solver for one exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadDecision {
    pub load: Option<Decimal>,
    pub basis: LoadBasis,
    /// Double progression fired: the next session starts back at range floor.
    pub resets_reps: bool,
}

/// Context the solver needs from periodization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionContext {
    pub training_age: TrainingAge,
    pub is_deload: bool,
    pub week_in_block: u32,
}

/// Round a load to the nearest 0.5 lb.
pub fn round_to_half(load: Decimal) -> Decimal {
    (load * dec!(2)).round() / dec!(2)
}

/// Smallest practical load increment for an implement.
pub fn load_increment(equipment: Equipment) -> Decimal {
    match equipment {
        Equipment::Barbell | Equipment::Cable => dec!(5),
        Equipment::Dumbbell => dec!(2.5),
        _ => dec!(2.5),
    }
}

/// Epley estimated 1RM: `load * (1 + reps / 30)`.
pub fn epley_one_rm(load: Decimal, reps: u32) -> Decimal {
    load * (Decimal::ONE + Decimal::from(reps) / dec!(30))
}

fn age_damping(age: TrainingAge) -> Decimal {
    match age {
        TrainingAge::Beginner => dec!(1.0),
        TrainingAge::Intermediate => dec!(0.7),
        TrainingAge::Advanced => dec!(0.5),
    }
}

/// Closed-form double-progression decision from the latest session's modal
/// values.
fn double_progression(
    latest_load: Decimal,
    latest_reps: u32,
    latest_rpe: Option<Decimal>,
    rep_range: RepRange,
    equipment: Equipment,
) -> LoadDecision {
    let rpe_manageable = latest_rpe.map_or(true, |rpe| rpe <= dec!(8.5));

    if latest_reps >= rep_range.ceiling() && rpe_manageable {
        return LoadDecision {
            load: Some(round_to_half(latest_load + load_increment(equipment))),
            basis: LoadBasis::DoubleProgression,
            resets_reps: true,
        };
    }
    if latest_reps < rep_range.min {
        return LoadDecision {
            load: Some(round_to_half(latest_load * dec!(0.9))),
            basis: LoadBasis::RepDeload,
            resets_reps: false,
        };
    }
    LoadDecision {
        load: Some(round_to_half(latest_load)),
        basis: LoadBasis::Hold,
        resets_reps: false,
    }
}

/// Autoregulated fallback: estimate the session 1RM with Epley, then
/// back-solve for a load at `target_rpe` and the lower end of the rep
/// range. Training age damps the step; deload weeks suppress it.
pub fn compute_next_load(
    sets: &[PerformedSet],
    rep_range: RepRange,
    target_rpe: Decimal,
    ctx: &ProgressionContext,
) -> Option<Decimal> {
    let e1rm = sets
        .iter()
        .filter(|s| !s.was_skipped && s.reps > 0)
        .filter_map(|s| s.load.map(|load| epley_one_rm(load, s.reps)))
        .max()?;

    let rir = (dec!(10) - target_rpe).max(Decimal::ZERO);
    let effective_reps = Decimal::from(rep_range.min) + rir;
    let candidate = e1rm / (Decimal::ONE + effective_reps / dec!(30));

    let anchor = modal_load(sets).unwrap_or(candidate);
    let step = candidate - anchor;

    let week_factor = if ctx.is_deload {
        Decimal::ZERO
    } else {
        let decay =
            dec!(1.0) - dec!(0.1) * Decimal::from(ctx.week_in_block.saturating_sub(1));
        decay.clamp(dec!(0.5), dec!(1.0))
    };

    Some(round_to_half(
        anchor + step * age_damping(ctx.training_age) * week_factor,
    ))
}

/// Baseline lookup with goal-driven context preference and cross-context
/// conversion (`strength -> volume * 0.78`, `volume -> strength * 1.12`).
pub fn baseline_load(
    baselines: &[UserBaseline],
    exercise_id: &str,
    goal: Goal,
) -> Option<Decimal> {
    let find = |context: BaselineContext| {
        baselines
            .iter()
            .find(|b| b.exercise_id == exercise_id && b.context == context)
            .map(|b| b.load)
    };

    let wants_strength = matches!(
        goal.normalized(),
        Goal::Strength | Goal::StrengthHypertrophy
    );

    let load = if wants_strength {
        find(BaselineContext::Strength)
            .or_else(|| find(BaselineContext::Volume).map(|l| l * dec!(1.12)))
    } else {
        find(BaselineContext::Volume)
            .or_else(|| find(BaselineContext::Strength).map(|l| l * dec!(0.78)))
    };
    load.or_else(|| find(BaselineContext::Default))
        .map(round_to_half)
}

/// Pairwise load transfer ratio between implements, for donor estimation.
fn equipment_transfer(from: Equipment, to: Equipment) -> Decimal {
    use Equipment::*;
    if from == to {
        return dec!(1.0);
    }
    match (from, to) {
        (Barbell, Dumbbell) => dec!(0.4),
        (Dumbbell, Barbell) => dec!(2.2),
        (Barbell, Machine) => dec!(0.9),
        (Machine, Barbell) => dec!(1.05),
        (Barbell, Cable) => dec!(0.6),
        (Cable, Barbell) => dec!(1.5),
        (Dumbbell, Cable) => dec!(1.2),
        (Cable, Dumbbell) => dec!(0.8),
        (Dumbbell, Machine) => dec!(1.8),
        (Machine, Dumbbell) => dec!(0.5),
        (Machine, Cable) => dec!(0.7),
        (Cable, Machine) => dec!(1.4),
        (Kettlebell, Dumbbell) | (Dumbbell, Kettlebell) => dec!(1.0),
        _ => dec!(0.85),
    }
}

fn overlap_fraction<T: PartialEq>(target: &[T], donor: &[T]) -> f64 {
    if target.is_empty() {
        return 0.0;
    }
    let shared = target.iter().filter(|t| donor.contains(t)).count();
    shared as f64 / target.len() as f64
}

/// Estimate a load for a never-performed exercise from the best-matching
/// donor exercise that has a baseline.
pub fn donor_estimate(
    target: &Exercise,
    library: &[Exercise],
    baselines: &[UserBaseline],
    goal: Goal,
) -> Option<(Decimal, String)> {
    let mut best: Option<(f64, &Exercise, Decimal)> = None;

    for donor in library {
        if donor.id == target.id {
            continue;
        }
        let Some(donor_load) = baseline_load(baselines, &donor.id, goal) else {
            continue;
        };
        let muscle_overlap = overlap_fraction(&target.primary_muscles, &donor.primary_muscles);
        if muscle_overlap == 0.0 {
            continue;
        }
        let pattern_overlap = overlap_fraction(&target.patterns, &donor.patterns);
        let mut score = muscle_overlap * 4.0 + pattern_overlap * 3.0;
        if donor.primary_equipment() == target.primary_equipment() {
            score += 2.0;
        }
        if donor.is_compound == target.is_compound {
            score += 1.0;
        }

        let better = match &best {
            None => true,
            Some((best_score, best_donor, _)) => {
                score > *best_score || (score == *best_score && donor.name < best_donor.name)
            }
        };
        if better {
            best = Some((score, donor, donor_load));
        }
    }

    let (_, donor, donor_load) = best?;

    let mut estimate = donor_load
        * equipment_transfer(donor.primary_equipment(), target.primary_equipment());
    if donor.is_compound && !target.is_compound {
        estimate *= dec!(0.5);
    }
    let fatigue_scale = (f64::from(target.fatigue_cost) / f64::from(donor.fatigue_cost.max(1)))
        .clamp(0.45, 0.9);
    estimate *= Decimal::from_f64(fatigue_scale).unwrap_or(dec!(0.9));

    Some((
        apply_equipment_floor(round_to_half(estimate), target.primary_equipment()),
        donor.id.clone(),
    ))
}

fn bodyweight_ratio(equipment: Equipment, is_compound: bool) -> Decimal {
    use Equipment::*;
    match (equipment, is_compound) {
        (Barbell, true) => dec!(0.75),
        (Barbell, false) => dec!(0.3),
        (Dumbbell, true) => dec!(0.25),
        (Dumbbell, false) => dec!(0.12),
        (Machine, true) => dec!(0.8),
        (Machine, false) => dec!(0.4),
        (Cable, true) => dec!(0.35),
        (Cable, false) => dec!(0.25),
        (Kettlebell, _) => dec!(0.3),
        (Sled, _) => dec!(1.2),
        _ => dec!(0.2),
    }
}

fn pattern_multiplier(pattern: Option<MovementPattern>) -> Decimal {
    use MovementPattern::*;
    match pattern {
        Some(Squat) => dec!(1.2),
        Some(Hinge) => dec!(1.3),
        Some(HorizontalPush) => dec!(1.0),
        Some(VerticalPush) => dec!(0.65),
        Some(HorizontalPull) | Some(VerticalPull) => dec!(0.9),
        Some(Lunge) => dec!(0.8),
        Some(Carry) => dec!(1.0),
        Some(Isolation) | Some(Rotation) | Some(AntiRotation) => dec!(0.5),
        None => dec!(0.6),
    }
}

fn equipment_default(equipment: Equipment) -> Option<Decimal> {
    use Equipment::*;
    match equipment {
        Barbell => Some(dec!(65)),
        Dumbbell => Some(dec!(20)),
        Machine => Some(dec!(60)),
        Cable => Some(dec!(40)),
        Kettlebell => Some(dec!(24)),
        Band => Some(dec!(15)),
        Sled => Some(dec!(90)),
        Other => Some(dec!(30)),
        Bodyweight => None,
    }
}

/// Machines cannot select below their first plate.
fn apply_equipment_floor(load: Decimal, equipment: Equipment) -> Decimal {
    if equipment == Equipment::Machine {
        load.max(dec!(10))
    } else {
        load
    }
}

/// Final heuristic rung: bodyweight-scaled or equipment-default load.
pub fn heuristic_load(exercise: &Exercise, bodyweight: Option<Decimal>) -> Option<Decimal> {
    let equipment = exercise.primary_equipment();
    if equipment == Equipment::Bodyweight {
        return None;
    }
    let raw = match bodyweight {
        Some(bw) => {
            bw * bodyweight_ratio(equipment, exercise.is_compound)
                * pattern_multiplier(exercise.dominant_pattern())
        }
        None => equipment_default(equipment)?,
    };
    Some(apply_equipment_floor(round_to_half(raw), equipment))
}

/// Full cascade: history, baseline, donor, heuristic.
#[allow(clippy::too_many_arguments)]
pub fn next_top_set_load(
    exercise: &Exercise,
    history: &HistoryIndex,
    library: &[Exercise],
    baselines: &[UserBaseline],
    rep_range: RepRange,
    target_rpe: Decimal,
    ctx: &ProgressionContext,
    goal: Goal,
    bodyweight: Option<Decimal>,
) -> LoadDecision {
    if exercise.is_bodyweight_only() {
        return LoadDecision {
            load: None,
            basis: LoadBasis::Bodyweight,
            resets_reps: false,
        };
    }

    let sessions = history.sessions(&exercise.id);
    if let Some(latest) = sessions.first() {
        let equipment = exercise.primary_equipment();

        // Accessories anchor on the confidence-weighted historical modal
        // load; a top-of-scale modal RPE holds the weight outright.
        if !exercise.main_lift_eligible {
            if let Some(anchor) = weighted_modal_load(sessions) {
                let latest_rpe = modal_rpe(&latest.sets);
                if latest_rpe.map_or(false, |rpe| rpe >= dec!(9)) {
                    return LoadDecision {
                        load: Some(round_to_half(anchor)),
                        basis: LoadBasis::Hold,
                        resets_reps: false,
                    };
                }
                if let Some(reps) = modal_reps(&latest.sets) {
                    return double_progression(anchor, reps, latest_rpe, rep_range, equipment);
                }
            }
        }

        match (modal_load(&latest.sets), modal_reps(&latest.sets)) {
            (Some(load), Some(reps)) => {
                return double_progression(load, reps, modal_rpe(&latest.sets), rep_range, equipment);
            }
            _ => {
                // Loads or reps missing from the log: salvage what we can
                // through the 1RM estimate.
                if let Some(load) = compute_next_load(&latest.sets, rep_range, target_rpe, ctx) {
                    debug!(exercise = %exercise.id, "mixed history signals; autoregulated load");
                    return LoadDecision {
                        load: Some(apply_equipment_floor(load, equipment)),
                        basis: LoadBasis::Autoregulated,
                        resets_reps: false,
                    };
                }
            }
        }
    }

    if let Some(load) = baseline_load(baselines, &exercise.id, goal) {
        return LoadDecision {
            load: Some(apply_equipment_floor(load, exercise.primary_equipment())),
            basis: LoadBasis::Baseline,
            resets_reps: false,
        };
    }

    if let Some((load, donor_id)) = donor_estimate(exercise, library, baselines, goal) {
        return LoadDecision {
            load: Some(load),
            basis: LoadBasis::Donor { donor_id },
            resets_reps: false,
        };
    }

    match heuristic_load(exercise, bodyweight) {
        Some(load) => LoadDecision {
            load: Some(load),
            basis: LoadBasis::Heuristic,
            resets_reps: false,
        },
        None => LoadDecision {
            load: None,
            basis: LoadBasis::Bodyweight,
            resets_reps: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryIndexOptions;
    use crate::models::{
        JointStress, MovementPattern, PerformedExercise, SelectionMode, SessionIntent, SplitTag,
        WorkoutHistoryEntry, WorkoutStatus,
    };
    use crate::volume::Muscle;
    use chrono::NaiveDate;

    fn barbell_exercise(id: &str, name: &str) -> Exercise {
        Exercise {
            id: id.into(),
            name: name.into(),
            patterns: vec![MovementPattern::HorizontalPush],
            split: SplitTag::Push,
            is_compound: true,
            main_lift_eligible: true,
            joint_stress: JointStress::Medium,
            equipment: vec![Equipment::Barbell],
            fatigue_cost: 4,
            sfr: 4,
            length_position: 3,
            stimulus_bias: vec![],
            contraindications: vec![],
            primary_muscles: vec![Muscle::Chest],
            secondary_muscles: vec![Muscle::Triceps],
            difficulty: TrainingAge::Intermediate,
            is_unilateral: false,
            rep_range: None,
            seconds_per_set: None,
        }
    }

    fn history_with(sets: Vec<PerformedSet>) -> HistoryIndex {
        let entry = WorkoutHistoryEntry {
            date: NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
            status: WorkoutStatus::Completed,
            intent: SessionIntent::Push,
            exercises: vec![PerformedExercise {
                exercise_id: "bench".into(),
                pattern: MovementPattern::HorizontalPush,
                primary_muscles: vec![Muscle::Chest],
                sets,
            }],
            phase: None,
            week_in_meso: None,
            selection_mode: SelectionMode::Intent,
        };
        HistoryIndex::build(&[entry], &HistoryIndexOptions::default())
    }

    fn set(idx: u32, reps: u32, load: Decimal, rpe: Decimal) -> PerformedSet {
        PerformedSet {
            set_index: idx,
            reps,
            load: Some(load),
            rpe: Some(rpe),
            was_skipped: false,
        }
    }

    fn ctx() -> ProgressionContext {
        ProgressionContext {
            training_age: TrainingAge::Intermediate,
            is_deload: false,
            week_in_block: 1,
        }
    }

    #[test]
    fn test_double_progression_adds_increment_at_ceiling() {
        // 5x5 @ 200 @ RPE 8.5 in a [3, 6) range: barbell increment fires.
        let sets: Vec<PerformedSet> =
            (0..5).map(|i| set(i, 5, dec!(200), dec!(8.5))).collect();
        let history = history_with(sets);
        let bench = barbell_exercise("bench", "Barbell Bench Press");
        let decision = next_top_set_load(
            &bench,
            &history,
            &[],
            &[],
            RepRange { min: 3, max: 6 },
            dec!(8),
            &ctx(),
            Goal::Strength,
            None,
        );
        assert_eq!(decision.load, Some(dec!(205)));
        assert_eq!(decision.basis, LoadBasis::DoubleProgression);
        assert!(decision.resets_reps);
    }

    #[test]
    fn test_double_progression_holds_when_rpe_too_high() {
        let sets: Vec<PerformedSet> = (0..5).map(|i| set(i, 5, dec!(200), dec!(9))).collect();
        let history = history_with(sets);
        let bench = barbell_exercise("bench", "Barbell Bench Press");
        let decision = next_top_set_load(
            &bench,
            &history,
            &[],
            &[],
            RepRange { min: 3, max: 6 },
            dec!(8),
            &ctx(),
            Goal::Strength,
            None,
        );
        assert_eq!(decision.load, Some(dec!(200)));
        assert_eq!(decision.basis, LoadBasis::Hold);
    }

    #[test]
    fn test_rep_deload_under_floor() {
        let sets: Vec<PerformedSet> = (0..3).map(|i| set(i, 2, dec!(200), dec!(9.5))).collect();
        let history = history_with(sets);
        let bench = barbell_exercise("bench", "Barbell Bench Press");
        let decision = next_top_set_load(
            &bench,
            &history,
            &[],
            &[],
            RepRange { min: 3, max: 6 },
            dec!(8),
            &ctx(),
            Goal::Strength,
            None,
        );
        assert_eq!(decision.load, Some(dec!(180)));
        assert_eq!(decision.basis, LoadBasis::RepDeload);
        assert!(decision.load.unwrap() < dec!(200) * dec!(0.95));
    }

    #[test]
    fn test_accessory_holds_at_modal_rpe_nine() {
        let sets: Vec<PerformedSet> = (0..3).map(|i| set(i, 12, dec!(30), dec!(9))).collect();
        let history = history_with(sets);
        let mut raise = barbell_exercise("bench", "Dumbbell Lateral Raise");
        raise.main_lift_eligible = false;
        raise.is_compound = false;
        raise.equipment = vec![Equipment::Dumbbell];
        let decision = next_top_set_load(
            &raise,
            &history,
            &[],
            &[],
            RepRange { min: 8, max: 15 },
            dec!(8.5),
            &ctx(),
            Goal::Hypertrophy,
            None,
        );
        assert_eq!(decision.load, Some(dec!(30)));
        assert_eq!(decision.basis, LoadBasis::Hold);
    }

    #[test]
    fn test_baseline_context_preference_and_conversion() {
        let baselines = vec![UserBaseline {
            exercise_id: "bench".into(),
            context: BaselineContext::Strength,
            load: dec!(200),
        }];
        // Strength goal takes the strength baseline directly.
        assert_eq!(
            baseline_load(&baselines, "bench", Goal::Strength),
            Some(dec!(200))
        );
        // Hypertrophy converts strength -> volume.
        assert_eq!(
            baseline_load(&baselines, "bench", Goal::Hypertrophy),
            Some(dec!(156))
        );

        let volume_only = vec![UserBaseline {
            exercise_id: "bench".into(),
            context: BaselineContext::Volume,
            load: dec!(150),
        }];
        assert_eq!(
            baseline_load(&volume_only, "bench", Goal::Strength),
            Some(dec!(168))
        );
    }

    #[test]
    fn test_donor_estimation_prefers_pattern_and_muscle_overlap() {
        let incline = {
            let mut e = barbell_exercise("incline-bench", "Incline Barbell Bench");
            e.main_lift_eligible = false;
            e
        };
        let bench = barbell_exercise("bench", "Barbell Bench Press");
        let squat = {
            let mut e = barbell_exercise("squat", "Barbell Back Squat");
            e.patterns = vec![MovementPattern::Squat];
            e.primary_muscles = vec![Muscle::Quads, Muscle::Glutes];
            e
        };
        let library = vec![bench.clone(), squat.clone(), incline.clone()];
        let baselines = vec![
            UserBaseline {
                exercise_id: "bench".into(),
                context: BaselineContext::Default,
                load: dec!(200),
            },
            UserBaseline {
                exercise_id: "squat".into(),
                context: BaselineContext::Default,
                load: dec!(300),
            },
        ];
        let (load, donor) =
            donor_estimate(&incline, &library, &baselines, Goal::Hypertrophy).unwrap();
        assert_eq!(donor, "bench");
        // Same equipment, same compound-ness, equal fatigue: 200 * 0.9.
        assert_eq!(load, dec!(180));
    }

    #[test]
    fn test_donor_isolation_penalty() {
        let fly = {
            let mut e = barbell_exercise("cable-fly", "Cable Fly");
            e.is_compound = false;
            e.main_lift_eligible = false;
            e.equipment = vec![Equipment::Cable];
            e.fatigue_cost = 2;
            e.patterns = vec![MovementPattern::Isolation];
            e
        };
        let bench = barbell_exercise("bench", "Barbell Bench Press");
        let library = vec![bench.clone(), fly.clone()];
        let baselines = vec![UserBaseline {
            exercise_id: "bench".into(),
            context: BaselineContext::Default,
            load: dec!(200),
        }];
        let (load, donor) = donor_estimate(&fly, &library, &baselines, Goal::Hypertrophy).unwrap();
        assert_eq!(donor, "bench");
        // 200 * 0.6 (barbell->cable) * 0.5 (isolation) * 0.5 (fatigue 2/4) = 30.
        assert_eq!(load, dec!(30));
    }

    #[test]
    fn test_heuristic_defaults_and_machine_floor() {
        let mut machine = barbell_exercise("leg-ext", "Leg Extension");
        machine.equipment = vec![Equipment::Machine];
        machine.is_compound = false;
        machine.patterns = vec![MovementPattern::Isolation];
        assert_eq!(heuristic_load(&machine, None), Some(dec!(60)));

        // Tiny lifter: bodyweight-scaled estimate still clears the floor.
        let low = heuristic_load(&machine, Some(dec!(60))).unwrap();
        assert!(low >= dec!(10));
    }

    #[test]
    fn test_bodyweight_exercise_gets_no_load() {
        let mut pullup = barbell_exercise("pullup", "Pull-Up");
        pullup.equipment = vec![Equipment::Bodyweight];
        let decision = next_top_set_load(
            &pullup,
            &HistoryIndex::default(),
            &[],
            &[],
            RepRange { min: 6, max: 12 },
            dec!(8),
            &ctx(),
            Goal::Hypertrophy,
            None,
        );
        assert_eq!(decision.load, None);
        assert_eq!(decision.basis, LoadBasis::Bodyweight);
    }

    #[test]
    fn test_loads_round_to_half() {
        assert_eq!(round_to_half(dec!(102.3)), dec!(102.5));
        assert_eq!(round_to_half(dec!(102.2)), dec!(102));
        assert_eq!(round_to_half(dec!(102.75)), dec!(103));
    }

    #[test]
    fn test_compute_next_load_damps_by_age() {
        let sets: Vec<PerformedSet> = (0..3).map(|i| set(i, 8, dec!(100), dec!(7))).collect();
        let range = RepRange { min: 8, max: 12 };
        let beginner = compute_next_load(
            &sets,
            range,
            dec!(8),
            &ProgressionContext {
                training_age: TrainingAge::Beginner,
                is_deload: false,
                week_in_block: 1,
            },
        )
        .unwrap();
        let advanced = compute_next_load(
            &sets,
            range,
            dec!(8),
            &ProgressionContext {
                training_age: TrainingAge::Advanced,
                is_deload: false,
                week_in_block: 1,
            },
        )
        .unwrap();
        // e1rm 126.67, candidate at 10 effective reps ~95: step is negative,
        // so heavier damping keeps the load closer to the modal anchor.
        assert!(advanced >= beginner);
    }

    #[test]
    fn test_compute_next_load_deload_suppresses_step() {
        let sets: Vec<PerformedSet> = (0..3).map(|i| set(i, 8, dec!(100), dec!(7))).collect();
        let range = RepRange { min: 8, max: 12 };
        let held = compute_next_load(
            &sets,
            range,
            dec!(8),
            &ProgressionContext {
                training_age: TrainingAge::Beginner,
                is_deload: true,
                week_in_block: 1,
            },
        )
        .unwrap();
        assert_eq!(held, dec!(100));
    }
}
