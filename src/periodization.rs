//! Block periodization: macro / meso / block hierarchy
//!
//! A macrocycle owns an ordered sequence of mesocycles, each of which owns an
//! ordered sequence of training blocks. The hierarchy is strictly tree-shaped;
//! no back-references are stored. Generation is template-driven by training
//! age, and date resolution uses 0-indexed half-open week intervals.

use anyhow::Result as AnyResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, InvalidInputError, Result};
use crate::models::{Goal, TrainingAge};

/// The four block types, in ascending intensity, terminating in recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Accumulation,
    Intensification,
    Realization,
    Deload,
}

impl BlockType {
    pub fn from_str(s: &str) -> AnyResult<Self> {
        match s.to_lowercase().as_str() {
            "accumulation" => Ok(Self::Accumulation),
            "intensification" => Ok(Self::Intensification),
            "realization" => Ok(Self::Realization),
            "deload" => Ok(Self::Deload),
            _ => anyhow::bail!("Unknown block type: {}", s),
        }
    }

    pub fn is_deload(self) -> bool {
        matches!(self, BlockType::Deload)
    }
}

/// Physiological adaptation a block is biased toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationType {
    NeuralAdaptation,
    MyofibrillarHypertrophy,
    SarcoplasmicHypertrophy,
    WorkCapacity,
    Recovery,
}

/// Relative weekly volume level of a block or meso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTarget {
    Low,
    Moderate,
    High,
    Peak,
}

/// Which quality the block's intensity selection favors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBias {
    Strength,
    Hypertrophy,
    Endurance,
}

/// One training block inside a mesocycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBlock {
    /// 1-based position within the meso.
    pub block_number: u32,
    pub block_type: BlockType,
    /// 0-indexed start week within the macro.
    pub start_week: u32,
    pub duration_weeks: u32,
    pub volume_target: VolumeTarget,
    pub intensity_bias: IntensityBias,
    pub adaptation_type: AdaptationType,
}

/// One mesocycle: an ordered run of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesocycle {
    /// 1-based position within the macro.
    pub meso_number: u32,
    /// 0-indexed start week within the macro.
    pub start_week: u32,
    pub duration_weeks: u32,
    pub focus: String,
    pub volume_target: VolumeTarget,
    pub intensity_bias: IntensityBias,
    pub blocks: Vec<TrainingBlock>,
}

/// The full periodized cycle for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroCycle {
    pub id: String,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_weeks: u32,
    pub training_age: TrainingAge,
    pub primary_goal: Goal,
    pub mesocycles: Vec<Mesocycle>,
}

/// Where a resolved context came from, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Computed,
    Fallback,
    None,
}

/// Derived view of where a date falls inside a macro. Borrows from the
/// macro; owned snapshots use [`CycleContextSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlockContext<'a> {
    pub block: &'a TrainingBlock,
    pub mesocycle: &'a Mesocycle,
    pub macro_cycle: &'a MacroCycle,
    /// 1-based week within the block.
    pub week_in_block: u32,
    /// 1-based week within the meso.
    pub week_in_meso: u32,
    /// 1-based week within the macro.
    pub week_in_macro: u32,
    pub source: ContextSource,
}

impl BlockContext<'_> {
    pub fn snapshot(&self) -> CycleContextSnapshot {
        CycleContextSnapshot {
            block_type: self.block.block_type,
            block_duration_weeks: self.block.duration_weeks,
            week_in_block: self.week_in_block,
            week_in_meso: self.week_in_meso,
            week_in_macro: self.week_in_macro,
            meso_length_weeks: self.mesocycle.duration_weeks,
            source: self.source,
        }
    }
}

/// Owned, macro-independent context snapshot. Callers without a stored macro
/// supply one of these with `source = Fallback`; planning without any cycle
/// information uses [`CycleContextSnapshot::default_fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleContextSnapshot {
    pub block_type: BlockType,
    pub block_duration_weeks: u32,
    pub week_in_block: u32,
    pub week_in_meso: u32,
    pub week_in_macro: u32,
    pub meso_length_weeks: u32,
    pub source: ContextSource,
}

impl CycleContextSnapshot {
    /// Neutral context for planning outside any cycle: week 1 of a 4-week
    /// accumulation pattern, marked as absent for observability.
    pub fn default_fallback() -> Self {
        Self {
            block_type: BlockType::Accumulation,
            block_duration_weeks: 3,
            week_in_block: 1,
            week_in_meso: 1,
            week_in_macro: 1,
            meso_length_weeks: 4,
            source: ContextSource::None,
        }
    }

    pub fn is_deload(&self) -> bool {
        self.block_type.is_deload()
    }
}

/// Inputs to macro generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroParams {
    pub id: String,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub duration_weeks: u32,
    pub training_age: TrainingAge,
    pub primary_goal: Goal,
}

/// Block template entry: type plus duration in weeks.
type BlockTemplate = &'static [(BlockType, u32)];

/// Meso template by training age.
///
/// - Beginner: 3 accumulation + 1 deload (4 weeks).
/// - Intermediate: 2 accumulation + 2 intensification + 1 deload (5 weeks).
/// - Advanced: 2 accumulation + 2 intensification + 1 realization + 1 deload
///   (6 weeks).
fn block_template(age: TrainingAge) -> BlockTemplate {
    match age {
        TrainingAge::Beginner => &[(BlockType::Accumulation, 3), (BlockType::Deload, 1)],
        TrainingAge::Intermediate => &[
            (BlockType::Accumulation, 2),
            (BlockType::Intensification, 2),
            (BlockType::Deload, 1),
        ],
        TrainingAge::Advanced => &[
            (BlockType::Accumulation, 2),
            (BlockType::Intensification, 2),
            (BlockType::Realization, 1),
            (BlockType::Deload, 1),
        ],
    }
}

fn block_volume_target(block_type: BlockType) -> VolumeTarget {
    match block_type {
        BlockType::Accumulation => VolumeTarget::High,
        BlockType::Intensification => VolumeTarget::Moderate,
        BlockType::Realization => VolumeTarget::Low,
        BlockType::Deload => VolumeTarget::Low,
    }
}

fn block_intensity_bias(block_type: BlockType) -> IntensityBias {
    match block_type {
        BlockType::Accumulation => IntensityBias::Hypertrophy,
        BlockType::Intensification | BlockType::Realization => IntensityBias::Strength,
        BlockType::Deload => IntensityBias::Endurance,
    }
}

/// Adaptation target by block type and training age. Beginner accumulation
/// builds work capacity before hypertrophy-specific volume pays off.
fn adaptation_type(block_type: BlockType, age: TrainingAge) -> AdaptationType {
    match (block_type, age) {
        (BlockType::Accumulation, TrainingAge::Beginner) => AdaptationType::WorkCapacity,
        (BlockType::Accumulation, _) => AdaptationType::SarcoplasmicHypertrophy,
        (BlockType::Intensification, _) => AdaptationType::MyofibrillarHypertrophy,
        (BlockType::Realization, _) => AdaptationType::NeuralAdaptation,
        (BlockType::Deload, _) => AdaptationType::Recovery,
    }
}

/// Generate a macro cycle by repeating the training-age meso template.
///
/// Complete mesos only: `floor(duration / meso_length)` repetitions; tail
/// weeks that cannot fit a full template are dropped.
pub fn generate_macro_cycle(params: MacroParams) -> Result<MacroCycle> {
    let template = block_template(params.training_age);
    let meso_length: u32 = template.iter().map(|(_, w)| w).sum();

    if params.duration_weeks < meso_length {
        return Err(EngineError::InvalidInput(InvalidInputError::MacroTooShort {
            duration_weeks: params.duration_weeks,
            meso_length,
        }));
    }

    let meso_count = params.duration_weeks / meso_length;
    let mut mesocycles = Vec::with_capacity(meso_count as usize);

    for meso_idx in 0..meso_count {
        let meso_start = meso_idx * meso_length;
        let mut blocks = Vec::with_capacity(template.len());
        let mut cursor = meso_start;

        for (block_idx, (block_type, weeks)) in template.iter().enumerate() {
            blocks.push(TrainingBlock {
                block_number: block_idx as u32 + 1,
                block_type: *block_type,
                start_week: cursor,
                duration_weeks: *weeks,
                volume_target: block_volume_target(*block_type),
                intensity_bias: block_intensity_bias(*block_type),
                adaptation_type: adaptation_type(*block_type, params.training_age),
            });
            cursor += weeks;
        }

        let first = &blocks[0];
        mesocycles.push(Mesocycle {
            meso_number: meso_idx + 1,
            start_week: meso_start,
            duration_weeks: meso_length,
            focus: format!("{:?} meso {}", params.primary_goal.normalized(), meso_idx + 1),
            volume_target: first.volume_target,
            intensity_bias: first.intensity_bias,
            blocks,
        });
    }

    let planned_weeks = meso_count * meso_length;
    if planned_weeks < params.duration_weeks {
        debug!(
            dropped_weeks = params.duration_weeks - planned_weeks,
            "macro tail weeks dropped; partial mesocycles are never generated"
        );
    }

    Ok(MacroCycle {
        id: params.id,
        user_id: params.user_id,
        start_date: params.start_date,
        end_date: params.start_date + chrono::Duration::weeks(i64::from(params.duration_weeks)),
        duration_weeks: params.duration_weeks,
        training_age: params.training_age,
        primary_goal: params.primary_goal,
        mesocycles,
    })
}

/// Resolve a date to its position in the cycle.
///
/// Weeks are compared 0-indexed with half-open `[start, start + duration)`
/// intervals; the returned week numbers are 1-based. Dates outside the macro
/// bounds resolve to `None` (callers may substitute a fallback snapshot).
pub fn derive_block_context<'a>(
    macro_cycle: &'a MacroCycle,
    date: NaiveDate,
) -> Option<BlockContext<'a>> {
    let days_since_start = (date - macro_cycle.start_date).num_days();
    if days_since_start < 0 {
        return None;
    }

    let week_in_macro = (days_since_start / 7) as u32 + 1;
    if week_in_macro > macro_cycle.duration_weeks {
        return None;
    }
    let week_index = week_in_macro - 1;

    let meso = macro_cycle.mesocycles.iter().find(|m| {
        week_index >= m.start_week && week_index < m.start_week + m.duration_weeks
    })?;
    let block = meso.blocks.iter().find(|b| {
        week_index >= b.start_week && week_index < b.start_week + b.duration_weeks
    })?;

    Some(BlockContext {
        block,
        mesocycle: meso,
        macro_cycle,
        week_in_block: week_index - block.start_week + 1,
        week_in_meso: week_index - meso.start_week + 1,
        week_in_macro,
        source: ContextSource::Computed,
    })
}

/// Session-shaping multipliers derived from block type and week-in-block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionModifiers {
    /// Scales prescribed set counts.
    pub volume_multiplier: f64,
    /// Scales prescribed top-set loads.
    pub intensity_multiplier: f64,
    /// Added to the base reps-in-reserve; the result clamps to `[0, 4]`.
    pub rir_adjustment: f64,
    /// Scales prescribed rest periods.
    pub rest_multiplier: f64,
}

impl PrescriptionModifiers {
    /// Continuous-ramp modifier form: linear interpolation across the block.
    pub fn for_context(ctx: &CycleContextSnapshot) -> Self {
        let denom = ctx.block_duration_weeks.saturating_sub(1).max(1) as f64;
        let p = ((ctx.week_in_block.saturating_sub(1)) as f64 / denom).clamp(0.0, 1.0);

        match ctx.block_type {
            BlockType::Accumulation => Self {
                volume_multiplier: 1.0 + 0.2 * p,
                intensity_multiplier: 0.9,
                rir_adjustment: 1.0 - p,
                rest_multiplier: 1.0,
            },
            BlockType::Intensification => Self {
                volume_multiplier: 1.0,
                intensity_multiplier: 0.95 + 0.05 * p,
                rir_adjustment: -p,
                rest_multiplier: 1.0,
            },
            BlockType::Realization => Self {
                volume_multiplier: 0.8,
                intensity_multiplier: 1.0,
                rir_adjustment: -1.0,
                rest_multiplier: 1.2,
            },
            BlockType::Deload => Self {
                volume_multiplier: 0.5,
                intensity_multiplier: 0.6,
                rir_adjustment: 2.0 + p,
                rest_multiplier: 0.8,
            },
        }
    }
}

/// Apply a RIR adjustment to a base RIR, clamped to the legal band.
pub fn adjusted_rir(base_rir: f64, adjustment: f64) -> f64 {
    (base_rir + adjustment).clamp(0.0, 4.0)
}
