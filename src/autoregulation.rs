//! Autoregulation: post-prescription plan adjustment
//!
//! After prescription, the overall fatigue score selects one of five
//! actions. Transforms mutate the plan in place and record every change in
//! a modification log so downstream explanation can show exactly what moved
//! and why.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::WorkoutPlan;
use crate::progression::round_to_half;
use crate::readiness::FatigueScore;

/// Note prepended to a plan when fatigue forces a reactive deload.
pub const AUTO_DELOAD_NOTE: &str = "[AUTO-DELOAD TRIGGERED]";

const MAX_SETS_TO_DROP: usize = 2;
const MIN_SETS_PRESERVED: usize = 2;

/// The five autoregulation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoregulationAction {
    Maintain,
    ScaleDown,
    ScaleUp,
    ReduceVolume,
    TriggerDeload,
}

/// What the caller permits the autoregulator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoregulationPolicy {
    pub allow_down_regulation: bool,
    pub allow_up_regulation: bool,
    /// Prefer dropping accessory sets over shaving load when fatigued.
    pub aggressive_volume_reduction: bool,
}

impl Default for AutoregulationPolicy {
    fn default() -> Self {
        Self {
            allow_down_regulation: true,
            allow_up_regulation: true,
            aggressive_volume_reduction: false,
        }
    }
}

/// One recorded change to the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub exercise_id: String,
    pub field: String,
    pub before: String,
    pub after: String,
    pub reason: String,
}

/// The applied action plus every change it made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationLog {
    pub action: AutoregulationAction,
    pub entries: Vec<Modification>,
}

impl ModificationLog {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pick the action for a fatigue score under the caller's policy.
pub fn select_action(fatigue: &FatigueScore, policy: &AutoregulationPolicy) -> AutoregulationAction {
    let f = fatigue.overall;
    if f < 0.3 && policy.allow_down_regulation {
        AutoregulationAction::TriggerDeload
    } else if f < 0.5 && policy.allow_down_regulation {
        if policy.aggressive_volume_reduction {
            AutoregulationAction::ReduceVolume
        } else {
            AutoregulationAction::ScaleDown
        }
    } else if f > 0.85 && policy.allow_up_regulation {
        AutoregulationAction::ScaleUp
    } else {
        AutoregulationAction::Maintain
    }
}

/// Apply the selected action to the plan, returning the modification log.
pub fn apply_action(plan: &mut WorkoutPlan, action: AutoregulationAction) -> ModificationLog {
    let mut entries = Vec::new();
    match action {
        AutoregulationAction::Maintain => {}
        AutoregulationAction::ScaleDown => scale_loads(
            plan,
            dec!(0.9),
            dec!(-1),
            "fatigue below readiness band",
            &mut entries,
        ),
        AutoregulationAction::ScaleUp => scale_loads(
            plan,
            dec!(1.05),
            dec!(0.5),
            "readiness well above band",
            &mut entries,
        ),
        AutoregulationAction::ReduceVolume => reduce_volume(plan, &mut entries),
        AutoregulationAction::TriggerDeload => trigger_deload(plan, &mut entries),
    }
    if !entries.is_empty() {
        info!(action = ?action, changes = entries.len(), "autoregulation adjusted plan");
    }
    ModificationLog { action, entries }
}

fn scale_loads(
    plan: &mut WorkoutPlan,
    load_factor: Decimal,
    rpe_delta: Decimal,
    reason: &str,
    entries: &mut Vec<Modification>,
) {
    for exercise in plan.exercises_mut() {
        for set in &mut exercise.sets {
            if let Some(load) = set.target_load {
                let adjusted = round_to_half(load * load_factor);
                if adjusted != load {
                    entries.push(Modification {
                        exercise_id: exercise.exercise_id.clone(),
                        field: format!("set[{}].target_load", set.set_index),
                        before: load.to_string(),
                        after: adjusted.to_string(),
                        reason: reason.to_string(),
                    });
                    set.target_load = Some(adjusted);
                }
                if let Some(rpe) = set.target_rpe {
                    let adjusted_rpe = (rpe + rpe_delta).clamp(dec!(1), dec!(10));
                    if adjusted_rpe != rpe {
                        entries.push(Modification {
                            exercise_id: exercise.exercise_id.clone(),
                            field: format!("set[{}].target_rpe", set.set_index),
                            before: rpe.to_string(),
                            after: adjusted_rpe.to_string(),
                            reason: reason.to_string(),
                        });
                        set.target_rpe = Some(adjusted_rpe);
                    }
                }
            }
        }
    }
}

/// Drop accessory sets, mains untouched. At most [`MAX_SETS_TO_DROP`] per
/// accessory, never below [`MIN_SETS_PRESERVED`].
fn reduce_volume(plan: &mut WorkoutPlan, entries: &mut Vec<Modification>) {
    for exercise in &mut plan.accessories {
        let before = exercise.sets.len();
        if before <= MIN_SETS_PRESERVED {
            continue;
        }
        let after = before.saturating_sub(MAX_SETS_TO_DROP).max(MIN_SETS_PRESERVED);
        exercise.sets.truncate(after);
        entries.push(Modification {
            exercise_id: exercise.exercise_id.clone(),
            field: "sets".to_string(),
            before: before.to_string(),
            after: after.to_string(),
            reason: "volume reduced under accumulated fatigue".to_string(),
        });
    }
}

/// Reactive deload: halve volume, cut load to 60%, cap effort at RPE 6.
fn trigger_deload(plan: &mut WorkoutPlan, entries: &mut Vec<Modification>) {
    for exercise in plan.exercises_mut() {
        let before = exercise.sets.len();
        let after = ((before as f64 * 0.5).round() as usize).max(1);
        if after < before {
            exercise.sets.truncate(after);
            entries.push(Modification {
                exercise_id: exercise.exercise_id.clone(),
                field: "sets".to_string(),
                before: before.to_string(),
                after: after.to_string(),
                reason: "deload triggered by fatigue".to_string(),
            });
        }
        for set in &mut exercise.sets {
            if let Some(load) = set.target_load {
                let adjusted = round_to_half(load * dec!(0.6));
                entries.push(Modification {
                    exercise_id: exercise.exercise_id.clone(),
                    field: format!("set[{}].target_load", set.set_index),
                    before: load.to_string(),
                    after: adjusted.to_string(),
                    reason: "deload triggered by fatigue".to_string(),
                });
                set.target_load = Some(adjusted);
            }
            if set.target_rpe.is_some() {
                set.target_rpe = Some(dec!(6));
            }
        }
    }
    plan.notes = Some(match plan.notes.take() {
        Some(existing) => format!("{} {}", AUTO_DELOAD_NOTE, existing),
        None => AUTO_DELOAD_NOTE.to_string(),
    });
}
