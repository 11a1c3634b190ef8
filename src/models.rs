use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::volume::Muscle;

/// Movement patterns from the closed library vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    HorizontalPush,
    VerticalPush,
    HorizontalPull,
    VerticalPull,
    Squat,
    Hinge,
    Lunge,
    Carry,
    Rotation,
    AntiRotation,
    Isolation,
}

/// Equipment vocabulary. Closed set; catalog entries outside it are rejected
/// at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Cable,
    Machine,
    Kettlebell,
    Band,
    Bodyweight,
    Sled,
    Other,
}

/// Split tag assigned to an exercise in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTag {
    Push,
    Pull,
    Legs,
    Upper,
    Lower,
}

/// Joint stress classification for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointStress {
    Low,
    Medium,
    High,
}

/// Training age buckets. Also used as the exercise difficulty scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingAge {
    Beginner,
    Intermediate,
    Advanced,
}

/// Primary training goal as stated by the user.
///
/// `Athleticism` and `GeneralHealth` normalize to `GeneralFitness` before any
/// prescription table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Hypertrophy,
    Strength,
    StrengthHypertrophy,
    FatLoss,
    Athleticism,
    GeneralHealth,
    GeneralFitness,
}

impl Goal {
    /// Collapse the user-facing goal set onto the internal prescription set.
    pub fn normalized(self) -> Goal {
        match self {
            Goal::Athleticism | Goal::GeneralHealth => Goal::GeneralFitness,
            other => other,
        }
    }
}

/// Session intent: which slice of the body a session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIntent {
    Push,
    Pull,
    Legs,
    Upper,
    Lower,
    FullBody,
    BodyPart,
}

/// How the exercises of a logged session were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMode {
    Intent,
    Manual,
    Template,
}

/// Workout lifecycle status. The history index only consumes performed
/// statuses (`COMPLETED`, `IN_PROGRESS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkoutStatus {
    Completed,
    InProgress,
    Planned,
    Skipped,
    Cancelled,
}

impl WorkoutStatus {
    /// Whether this status counts as performed work for history purposes.
    pub fn is_performed(self) -> bool {
        matches!(self, WorkoutStatus::Completed | WorkoutStatus::InProgress)
    }
}

/// Library exercise. Read-only during planning; shared across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Opaque identifier (UUID elsewhere, treated as an atom here).
    pub id: String,

    /// Display name; also the final deterministic tie-break key.
    pub name: String,

    /// Movement patterns, most dominant first.
    pub patterns: Vec<MovementPattern>,

    /// Split tag from the library.
    pub split: SplitTag,

    /// Multi-joint movement.
    pub is_compound: bool,

    /// Eligible to be seeded as a session main lift.
    pub main_lift_eligible: bool,

    /// Joint stress classification.
    pub joint_stress: JointStress,

    /// Equipment required to perform the exercise.
    pub equipment: Vec<Equipment>,

    /// Systemic fatigue cost, 1-5.
    pub fatigue_cost: u8,

    /// Stimulus-to-fatigue ratio, 1-5 (higher is more efficient).
    pub sfr: u8,

    /// How well the exercise loads the muscle at long lengths, 1-5.
    pub length_position: u8,

    /// Stimulus bias tags (free-form, e.g. "stretch", "peak-contraction").
    #[serde(default)]
    pub stimulus_bias: Vec<String>,

    /// Contraindication tags matched against the user's reported pain sites.
    #[serde(default)]
    pub contraindications: Vec<String>,

    /// Primary muscles, dominant first.
    pub primary_muscles: Vec<Muscle>,

    /// Secondary muscles.
    #[serde(default)]
    pub secondary_muscles: Vec<Muscle>,

    /// Skill requirement.
    pub difficulty: TrainingAge,

    /// Performed one side at a time.
    #[serde(default)]
    pub is_unilateral: bool,

    /// Library override of the goal-derived rep range.
    #[serde(default)]
    pub rep_range: Option<(u32, u32)>,

    /// Average seconds to execute one set, excluding rest.
    #[serde(default)]
    pub seconds_per_set: Option<u32>,
}

impl Exercise {
    /// Most dominant movement pattern, if any are declared.
    pub fn dominant_pattern(&self) -> Option<MovementPattern> {
        self.patterns.first().copied()
    }

    /// Loaded externally, or bodyweight-only (no load prescription).
    pub fn is_bodyweight_only(&self) -> bool {
        self.equipment.is_empty()
            || self.equipment.iter().all(|e| *e == Equipment::Bodyweight)
    }

    /// Primary loading implement, used for increments and load heuristics.
    pub fn primary_equipment(&self) -> Equipment {
        self.equipment
            .iter()
            .copied()
            .find(|e| *e != Equipment::Bodyweight)
            .unwrap_or(Equipment::Bodyweight)
    }

    /// Execution seconds for one set; defaults by movement complexity.
    pub fn execution_seconds(&self) -> u32 {
        self.seconds_per_set
            .unwrap_or(if self.is_compound { 45 } else { 30 })
    }
}

/// One set performed in a logged workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformedSet {
    pub set_index: u32,
    pub reps: u32,
    #[serde(default)]
    pub load: Option<Decimal>,
    #[serde(default)]
    pub rpe: Option<Decimal>,
    #[serde(default)]
    pub was_skipped: bool,
}

/// One exercise within a logged workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformedExercise {
    pub exercise_id: String,
    pub pattern: MovementPattern,
    pub primary_muscles: Vec<Muscle>,
    pub sets: Vec<PerformedSet>,
}

/// A logged workout consumed by the history index. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutHistoryEntry {
    pub date: NaiveDate,
    pub status: WorkoutStatus,
    pub intent: SessionIntent,
    pub exercises: Vec<PerformedExercise>,

    /// Block-type snapshot at logging time, when the session was planned
    /// inside a periodized cycle.
    #[serde(default)]
    pub phase: Option<crate::periodization::BlockType>,

    /// Week-in-meso snapshot at logging time.
    #[serde(default)]
    pub week_in_meso: Option<u32>,

    pub selection_mode: SelectionMode,
}

/// Role of a prescribed set or exercise within the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetRole {
    Warmup,
    Main,
    Accessory,
}

/// One prescribed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub set_index: u32,
    pub role: SetRole,
    pub target_reps: u32,
    #[serde(default)]
    pub target_load: Option<Decimal>,
    #[serde(default)]
    pub target_rpe: Option<Decimal>,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    #[serde(default)]
    pub is_back_off: bool,
}

/// One prescribed exercise with its working sets and optional warmup ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub exercise_id: String,
    pub order_index: u32,
    pub role: SetRole,
    pub is_main_lift: bool,
    pub sets: Vec<WorkoutSet>,
    /// Warmup ramp preceding the working sets (main lifts only).
    #[serde(default)]
    pub warmup_sets: Vec<WorkoutSet>,
}

impl WorkoutExercise {
    /// Estimated minutes to complete this exercise, warmup included.
    ///
    /// Working sets cost execution time plus rest; warmup sets use a
    /// 30-second execution cap and a 45-second default rest.
    pub fn estimated_minutes(&self, execution_seconds: u32) -> f64 {
        let working: u32 = self
            .sets
            .iter()
            .map(|s| execution_seconds + s.rest_seconds.unwrap_or(90))
            .sum();
        let warmup: u32 = self
            .warmup_sets
            .iter()
            .map(|s| execution_seconds.min(30) + s.rest_seconds.unwrap_or(45))
            .sum();
        f64::from(working + warmup) / 60.0
    }
}

/// A planned session. Owned by the planning call that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub main_lifts: Vec<WorkoutExercise>,
    pub accessories: Vec<WorkoutExercise>,
    /// Estimated wall-clock minutes for the whole session.
    pub estimated_minutes: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkoutPlan {
    /// All exercises in plan order, mains first.
    pub fn exercises(&self) -> impl Iterator<Item = &WorkoutExercise> {
        self.main_lifts.iter().chain(self.accessories.iter())
    }

    /// Mutable iteration in plan order, for autoregulation transforms.
    pub fn exercises_mut(&mut self) -> impl Iterator<Item = &mut WorkoutExercise> {
        self.main_lifts.iter_mut().chain(self.accessories.iter_mut())
    }
}

/// Wearable recovery metrics (Whoop-style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhoopMetrics {
    /// Recovery score, 0-100.
    pub recovery: f64,
    /// Day strain, 0-21.
    pub strain: f64,
    /// Heart-rate variability in milliseconds.
    pub hrv: f64,
    /// Sleep quality score, 0-100.
    pub sleep_quality: f64,
    /// Sleep duration in hours.
    pub sleep_duration: f64,
}

/// Self-reported readiness on simple ordinal scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectiveReadiness {
    /// Overall readiness, 1-5.
    pub readiness: u8,
    /// Motivation to train, 1-5.
    pub motivation: u8,
    /// Per-muscle soreness, 1 (fresh) to 3 (very sore).
    #[serde(default)]
    pub soreness: BTreeMap<Muscle, u8>,
}

/// Performance-derived signals computed from recent logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSignals {
    /// Mean (actual - target) RPE over recent sessions.
    pub rpe_deviation: f64,
    /// Exercises currently flagged as stalled.
    pub stall_count: u32,
    /// Fraction of prescribed volume actually completed, 0-1.
    pub volume_compliance_rate: f64,
}

/// Readiness inputs for one planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSignal {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(default)]
    pub whoop: Option<WhoopMetrics>,
    #[serde(default)]
    pub subjective: Option<SubjectiveReadiness>,
    #[serde(default)]
    pub performance: Option<PerformanceSignals>,
}

/// Baseline context for stored per-exercise loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineContext {
    Default,
    Strength,
    Volume,
}

/// User-recorded baseline load for an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBaseline {
    pub exercise_id: String,
    pub context: BaselineContext,
    pub load: Decimal,
}
