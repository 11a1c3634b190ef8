//! Stall detection
//!
//! Walks each exercise's history most-recent-first looking for the last
//! session that set an estimated-1RM personal record, then converts the
//! drought length into an intervention level. Runs as a periodic diagnostic,
//! not inside the planning hot path.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::history::{ExerciseSession, HistoryIndex};
use crate::models::PerformedSet;

/// Assumed training frequency when converting session counts to weeks.
const SESSIONS_PER_WEEK: f64 = 3.0;

/// Escalating interventions for a stalled lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionLevel {
    /// Progress is current; nothing to do.
    None,
    /// Switch to 1-2 lb increments.
    Microload,
    /// Drop 10% and rebuild over 2-3 weeks.
    Deload,
    /// Swap grip, stance, or implement.
    Variation,
    /// Return to MEV for four weeks.
    VolumeReset,
}

impl InterventionLevel {
    fn from_weeks(weeks: f64) -> Self {
        if weeks < 2.0 {
            InterventionLevel::None
        } else if weeks < 3.0 {
            InterventionLevel::Microload
        } else if weeks < 5.0 {
            InterventionLevel::Deload
        } else if weeks < 8.0 {
            InterventionLevel::Variation
        } else {
            InterventionLevel::VolumeReset
        }
    }
}

/// Stall diagnosis for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StallReport {
    pub exercise_id: String,
    pub sessions_since_pr: u32,
    pub weeks_without_progress: f64,
    pub best_e1rm: Decimal,
    pub intervention: InterventionLevel,
}

/// Brzycki-style estimated 1RM with the rep term capped at 10: past ten
/// reps the estimate degrades into a conditioning measure.
pub fn estimated_one_rm(load: Decimal, reps: u32) -> Decimal {
    load * (Decimal::ONE + Decimal::from(reps.min(10)) / dec!(30))
}

fn session_best_e1rm(sets: &[PerformedSet]) -> Option<Decimal> {
    sets.iter()
        .filter(|s| !s.was_skipped && s.reps > 0)
        .filter_map(|s| s.load.map(|load| estimated_one_rm(load, s.reps)))
        .max()
}

/// Detect the stall state of one exercise from its session list (most
/// recent first). A session is a PR when its best estimated 1RM exceeds
/// every older session's best; both rep PRs and load PRs register through
/// the estimate.
pub fn detect_stall(exercise_id: &str, sessions: &[ExerciseSession]) -> Option<StallReport> {
    if sessions.is_empty() {
        return None;
    }
    let bests: Vec<Decimal> = sessions
        .iter()
        .map(|s| session_best_e1rm(&s.sets))
        .collect::<Option<Vec<_>>>()
        .or_else(|| {
            // Sessions without loads cannot set load PRs; keep the loaded ones.
            let loaded: Vec<Decimal> = sessions
                .iter()
                .filter_map(|s| session_best_e1rm(&s.sets))
                .collect();
            if loaded.is_empty() {
                None
            } else {
                Some(loaded)
            }
        })?;

    let mut pr_index = None;
    for (i, best) in bests.iter().enumerate() {
        let older_best = bests[i + 1..].iter().max();
        if older_best.map_or(true, |older| best > older) {
            pr_index = Some(i);
            break;
        }
    }
    let sessions_since_pr = pr_index.unwrap_or(bests.len().saturating_sub(1)) as u32;
    let weeks = f64::from(sessions_since_pr) / SESSIONS_PER_WEEK;

    Some(StallReport {
        exercise_id: exercise_id.to_string(),
        sessions_since_pr,
        weeks_without_progress: weeks,
        best_e1rm: bests
            .iter()
            .copied()
            .max()
            .unwrap_or(Decimal::ZERO),
        intervention: InterventionLevel::from_weeks(weeks),
    })
}

/// Run stall detection across every exercise in the index.
pub fn detect_all_stalls(index: &HistoryIndex, exercise_ids: &[String]) -> Vec<StallReport> {
    let mut reports: Vec<StallReport> = exercise_ids
        .iter()
        .filter_map(|id| detect_stall(id, index.sessions(id)))
        .collect();
    reports.sort_by(|a, b| {
        b.sessions_since_pr
            .cmp(&a.sessions_since_pr)
            .then_with(|| a.exercise_id.cmp(&b.exercise_id))
    });
    reports
}

/// Count of currently stalled exercises, for the performance readiness
/// signal.
pub fn stall_count(reports: &[StallReport]) -> u32 {
    reports
        .iter()
        .filter(|r| r.intervention != InterventionLevel::None)
        .count() as u32
}
