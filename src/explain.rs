//! Explainability projections
//!
//! Pure projections of the decision state the engine already computed:
//! score components, load bases, fatigue contributions, and volume
//! accounting. Nothing here recomputes a decision; records serialize the
//! same values the ranker and solver used.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::autoregulation::ModificationLog;
use crate::models::{Goal, SessionIntent, SetRole, TrainingAge, WorkoutPlan};
use crate::periodization::{BlockType, ContextSource, CycleContextSnapshot};
use crate::readiness::FatigueScore;
use crate::selection::{
    ScoreBreakdown, SelectionResult, W_DIVERSITY, W_LENGTHENED, W_MUSCLE_DEFICIT, W_PREFERENCE,
    W_SFR, W_TARGETEDNESS,
};
use crate::volume::{weekly_target, Muscle};

/// Where the session sits in the cycle, plus readiness, for narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub date: NaiveDate,
    pub intent: SessionIntent,
    pub goal: Goal,
    pub training_age: TrainingAge,
    pub block_type: BlockType,
    pub week_in_block: u32,
    pub week_in_meso: u32,
    pub week_in_macro: u32,
    pub context_source: ContextSource,
    pub fatigue_overall: f64,
    pub fatigue_rationale: String,
}

impl SessionContext {
    pub fn from_parts(
        date: NaiveDate,
        intent: SessionIntent,
        goal: Goal,
        training_age: TrainingAge,
        cycle: &CycleContextSnapshot,
        fatigue: &FatigueScore,
    ) -> Self {
        Self {
            date,
            intent,
            goal,
            training_age,
            block_type: cycle.block_type,
            week_in_block: cycle.week_in_block,
            week_in_meso: cycle.week_in_meso,
            week_in_macro: cycle.week_in_macro,
            context_source: cycle.source,
            fatigue_overall: fatigue.overall,
            fatigue_rationale: fatigue.rationale(),
        }
    }
}

/// Why one exercise made the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRationale {
    pub exercise_id: String,
    pub role: SetRole,
    pub set_target: u32,
    #[serde(default)]
    pub score: Option<ScoreBreakdown>,
    /// Highest weighted score components, strongest first.
    pub top_contributors: Vec<String>,
}

fn top_contributors(score: &ScoreBreakdown) -> Vec<String> {
    let mut weighted = vec![
        ("muscle_deficit", W_MUSCLE_DEFICIT * score.muscle_deficit),
        ("targetedness", W_TARGETEDNESS * score.targetedness),
        ("stimulus_to_fatigue", W_SFR * score.sfr),
        ("lengthened_position", W_LENGTHENED * score.lengthened),
        ("preference", W_PREFERENCE * score.preference),
        ("movement_diversity", W_DIVERSITY * score.movement_diversity),
    ];
    weighted.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    weighted
        .into_iter()
        .take(3)
        .filter(|(_, value)| *value > 0.0)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Project rationales from a selection result.
pub fn exercise_rationales(selection: &SelectionResult) -> Vec<ExerciseRationale> {
    selection
        .selected
        .iter()
        .map(|picked| ExerciseRationale {
            exercise_id: picked.exercise_id.clone(),
            role: picked.role,
            set_target: picked.set_target,
            score: picked.score,
            top_contributors: picked
                .score
                .as_ref()
                .map(top_contributors)
                .unwrap_or_else(|| vec!["main_lift_seed".to_string()]),
        })
        .collect()
}

/// Why each exercise was excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredExerciseSummary {
    pub exercise_id: String,
    pub reason: String,
}

pub fn filtered_summaries(selection: &SelectionResult) -> Vec<FilteredExerciseSummary> {
    selection
        .rejected
        .iter()
        .map(|rejected| FilteredExerciseSummary {
            exercise_id: rejected.exercise_id.clone(),
            reason: format!("{:?}", rejected.reason),
        })
        .collect()
}

/// Message severity for coach-facing notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachMessageLevel {
    Info,
    Caution,
    Alert,
}

/// A short coach-facing note derived from the plan's decision state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachMessage {
    pub level: CoachMessageLevel,
    pub text: String,
}

/// Derive coach messages from fatigue, modifications, and coverage gaps.
pub fn coach_messages(
    fatigue: &FatigueScore,
    modifications: Option<&ModificationLog>,
    selection: &SelectionResult,
) -> Vec<CoachMessage> {
    let mut messages = Vec::new();

    if fatigue.overall < 0.3 {
        messages.push(CoachMessage {
            level: CoachMessageLevel::Alert,
            text: "Recovery is severely compromised; today's session was deloaded.".to_string(),
        });
    } else if fatigue.overall < 0.5 {
        messages.push(CoachMessage {
            level: CoachMessageLevel::Caution,
            text: "Readiness is below your normal band; loads were eased.".to_string(),
        });
    }

    if let Some(log) = modifications {
        if !log.is_empty() {
            messages.push(CoachMessage {
                level: CoachMessageLevel::Info,
                text: format!(
                    "{} prescription value(s) were adjusted ({:?}).",
                    log.entries.len(),
                    log.action
                ),
            });
        }
    }

    if !selection.coverage_gaps.is_empty() {
        let names: Vec<String> = selection
            .coverage_gaps
            .iter()
            .map(|m| m.to_string())
            .collect();
        messages.push(CoachMessage {
            level: CoachMessageLevel::Caution,
            text: format!(
                "No suitable exercise covered: {}. Consider expanding available equipment.",
                names.join(", ")
            ),
        });
    }

    messages
}

/// Weekly volume status of one muscle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    BelowTarget,
    OnTrack,
    NearMax,
    OverMax,
}

/// Per-muscle weekly volume accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeCompliance {
    pub muscle: Muscle,
    pub weekly_target: u32,
    pub weekly_actual: f64,
    /// Actual plus what this session commits.
    pub projected: f64,
    pub mrv: u32,
    pub status: ComplianceStatus,
}

/// Build the volume compliance report for the muscles the session touches.
pub fn volume_compliance(
    selection: &SelectionResult,
    weekly_actual: &[f64; Muscle::COUNT],
    week_in_meso: u32,
    meso_length: u32,
    is_deload: bool,
) -> Vec<VolumeCompliance> {
    let mut committed = [0.0; Muscle::COUNT];
    for picked in &selection.selected {
        for (muscle, amount) in &picked.volume_contribution {
            committed[muscle.index()] += amount;
        }
    }

    let mut report = Vec::new();
    for muscle in Muscle::ALL {
        let idx = muscle.index();
        if committed[idx] == 0.0 && weekly_actual[idx] == 0.0 {
            continue;
        }
        let target = weekly_target(muscle, week_in_meso, meso_length, is_deload);
        let mrv = muscle.landmarks().mrv;
        let projected = weekly_actual[idx] + committed[idx];
        let status = if projected > f64::from(mrv) {
            ComplianceStatus::OverMax
        } else if projected >= f64::from(mrv) * 0.9 {
            ComplianceStatus::NearMax
        } else if projected >= f64::from(target) {
            ComplianceStatus::OnTrack
        } else {
            ComplianceStatus::BelowTarget
        };
        report.push(VolumeCompliance {
            muscle,
            weekly_target: target,
            weekly_actual: weekly_actual[idx],
            projected,
            mrv,
            status,
        });
    }
    report
}

/// Why each prescription looks the way it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRationale {
    pub exercise_id: String,
    pub sets: usize,
    pub target_reps: u32,
    pub target_rpe: Option<String>,
    pub load_basis: String,
    pub has_warmup_ramp: bool,
}

pub fn prescription_rationales(
    plan: &WorkoutPlan,
    load_bases: &[(String, String)],
) -> Vec<PrescriptionRationale> {
    plan.exercises()
        .map(|exercise| PrescriptionRationale {
            exercise_id: exercise.exercise_id.clone(),
            sets: exercise.sets.len(),
            target_reps: exercise.sets.first().map_or(0, |s| s.target_reps),
            target_rpe: exercise
                .sets
                .first()
                .and_then(|s| s.target_rpe)
                .map(|rpe| rpe.to_string()),
            load_basis: load_bases
                .iter()
                .find(|(id, _)| *id == exercise.exercise_id)
                .map(|(_, basis)| basis.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            has_warmup_ramp: !exercise.warmup_sets.is_empty(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectedExercise;

    fn selection_with_gap() -> SelectionResult {
        SelectionResult {
            selected: vec![SelectedExercise {
                exercise_id: "bench".into(),
                role: SetRole::Main,
                order_index: 0,
                set_target: 4,
                score: None,
                volume_contribution: vec![(Muscle::Chest, 4.0)],
            }],
            main_lift_ids: vec!["bench".into()],
            accessory_ids: vec![],
            rejected: vec![],
            coverage_gaps: vec![Muscle::SideDelts],
            estimated_minutes: 18.0,
        }
    }

    #[test]
    fn test_rationales_echo_scores_without_recompute() {
        let mut selection = selection_with_gap();
        let score = ScoreBreakdown {
            muscle_deficit: 0.8,
            sfr: 1.0,
            ..ScoreBreakdown::default()
        };
        selection.selected[0].score = Some(score);
        let rationales = exercise_rationales(&selection);
        assert_eq!(rationales[0].score, Some(score));
        assert_eq!(rationales[0].top_contributors[0], "muscle_deficit");
    }

    #[test]
    fn test_coach_messages_flag_coverage_gap() {
        let selection = selection_with_gap();
        let messages = coach_messages(&FatigueScore::default_moderate(), None, &selection);
        assert!(messages
            .iter()
            .any(|m| m.level == CoachMessageLevel::Caution && m.text.contains("Side Delts")));
    }

    #[test]
    fn test_volume_compliance_statuses() {
        let selection = selection_with_gap();
        let mut actual = [0.0; Muscle::COUNT];
        actual[Muscle::Chest.index()] = 20.0;
        let report = volume_compliance(&selection, &actual, 3, 4, false);
        let chest = report.iter().find(|r| r.muscle == Muscle::Chest).unwrap();
        // 20 actual + 4 committed = 24 of MRV 22.
        assert_eq!(chest.status, ComplianceStatus::OverMax);

        let actual = [0.0; Muscle::COUNT];
        let report = volume_compliance(&selection, &actual, 3, 4, false);
        let chest = report.iter().find(|r| r.muscle == Muscle::Chest).unwrap();
        assert_eq!(chest.status, ComplianceStatus::BelowTarget);
    }
}
