//! Workout history index
//!
//! Normalizes completed workout history into per-exercise session lists and
//! extracts the modal (most frequent) working load and RPE per session. Modal
//! values, not means, anchor load progression: the working weight an athlete
//! actually repeated is a far better progression anchor than an average
//! polluted by warmups and drop sets.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

use crate::models::{
    PerformedSet, SelectionMode, SessionIntent, WorkoutHistoryEntry,
};
use crate::periodization::BlockType;
use crate::volume::Muscle;

/// One normalized session of a single exercise, most recent first in the
/// index. Confidence reflects how trustworthy the log is for progression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSession {
    pub date: NaiveDate,
    pub sets: Vec<PerformedSet>,
    /// Log trust in `[0, 1]`: selection-mode base scaled by set completion.
    pub confidence: f64,
    pub selection_mode: SelectionMode,
    pub intent: SessionIntent,
}

/// Options controlling history normalization.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndexOptions {
    /// Restrict to sessions logged with this intent.
    pub intent: Option<SessionIntent>,
    /// Seeding a new mesocycle's first session: restrict to accumulation
    /// entries anchored at the highest completed accumulation week and drop
    /// deload entries entirely.
    pub meso_seed: bool,
}

/// Indexed view over completed history, grouped by exercise.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    by_exercise: HashMap<String, Vec<ExerciseSession>>,
    /// Flat (date, muscle, working-set count) stream for volume accounting.
    muscle_sets: Vec<(NaiveDate, Muscle, u32)>,
}

fn session_confidence(entry: &WorkoutHistoryEntry, sets: &[PerformedSet]) -> f64 {
    let base = match entry.selection_mode {
        SelectionMode::Intent => 1.0,
        SelectionMode::Template => 0.85,
        SelectionMode::Manual => 0.6,
    };
    if sets.is_empty() {
        return 0.0;
    }
    let completed = sets.iter().filter(|s| !s.was_skipped).count() as f64;
    base * (completed / sets.len() as f64)
}

impl HistoryIndex {
    /// Build the index from raw history entries.
    pub fn build(entries: &[WorkoutHistoryEntry], opts: &HistoryIndexOptions) -> Self {
        let mut performed: Vec<&WorkoutHistoryEntry> = entries
            .iter()
            .filter(|e| e.status.is_performed())
            .filter(|e| opts.intent.map_or(true, |i| e.intent == i))
            .collect();
        performed.sort_by(|a, b| b.date.cmp(&a.date));

        if opts.meso_seed {
            performed.retain(|e| e.phase != Some(BlockType::Deload));
            let accumulation: Vec<&WorkoutHistoryEntry> = performed
                .iter()
                .copied()
                .filter(|e| e.phase == Some(BlockType::Accumulation))
                .collect();
            if !accumulation.is_empty() {
                // Anchor the new meso at the heaviest completed accumulation
                // week when week snapshots exist.
                let anchor_week = accumulation.iter().filter_map(|e| e.week_in_meso).max();
                performed = match anchor_week {
                    Some(week) => accumulation
                        .into_iter()
                        .filter(|e| e.week_in_meso.map_or(true, |w| w == week))
                        .collect(),
                    None => accumulation,
                };
                debug!(anchor_week = ?anchor_week, "meso seed restricted to accumulation baseline");
            }
        }

        let mut by_exercise: HashMap<String, Vec<ExerciseSession>> = HashMap::new();
        let mut muscle_sets = Vec::new();

        for entry in performed {
            for performed_exercise in &entry.exercises {
                let working_sets: u32 = performed_exercise
                    .sets
                    .iter()
                    .filter(|s| !s.was_skipped && s.reps > 0)
                    .count() as u32;
                for muscle in &performed_exercise.primary_muscles {
                    muscle_sets.push((entry.date, *muscle, working_sets));
                }

                by_exercise
                    .entry(performed_exercise.exercise_id.clone())
                    .or_default()
                    .push(ExerciseSession {
                        date: entry.date,
                        sets: performed_exercise.sets.clone(),
                        confidence: session_confidence(entry, &performed_exercise.sets),
                        selection_mode: entry.selection_mode,
                        intent: entry.intent,
                    });
            }
        }

        HistoryIndex {
            by_exercise,
            muscle_sets,
        }
    }

    /// Sessions for an exercise, most recent first. Empty if never performed.
    pub fn sessions(&self, exercise_id: &str) -> &[ExerciseSession] {
        self.by_exercise
            .get(exercise_id)
            .map_or(&[], |v| v.as_slice())
    }

    /// Most recent session of an exercise.
    pub fn latest_session(&self, exercise_id: &str) -> Option<&ExerciseSession> {
        self.sessions(exercise_id).first()
    }

    /// Date the exercise was last performed.
    pub fn last_used(&self, exercise_id: &str) -> Option<NaiveDate> {
        self.latest_session(exercise_id).map(|s| s.date)
    }

    /// Whether the exercise was ever logged under the given intent.
    pub fn used_with_intent(&self, exercise_id: &str, intent: SessionIntent) -> bool {
        self.sessions(exercise_id).iter().any(|s| s.intent == intent)
    }

    /// Working sets per muscle over the trailing window ending at `as_of`,
    /// indexed by [`Muscle::index`].
    pub fn weekly_sets_per_muscle(&self, as_of: NaiveDate, window_days: i64) -> [f64; Muscle::COUNT] {
        let mut totals = [0.0; Muscle::COUNT];
        for (date, muscle, sets) in &self.muscle_sets {
            let age = (as_of - *date).num_days();
            if age >= 0 && age < window_days {
                totals[muscle.index()] += f64::from(*sets);
            }
        }
        totals
    }
}

/// Working sets eligible for modal statistics: performed, and not logged as
/// sub-working effort (RPE < 6 marks ramp-in sets).
fn modal_eligible(sets: &[PerformedSet]) -> impl Iterator<Item = &PerformedSet> {
    sets.iter().filter(|s| {
        !s.was_skipped && s.reps > 0 && s.rpe.map_or(true, |rpe| rpe >= dec!(6))
    })
}

/// Most frequent working-set load of a session.
///
/// Ties break toward the latest set index, then the higher load, so a
/// same-frequency top set beats an earlier ramp plateau.
pub fn modal_load(sets: &[PerformedSet]) -> Option<Decimal> {
    let mut freq: HashMap<Decimal, (u32, u32)> = HashMap::new();
    for set in modal_eligible(sets) {
        let load = set.load?;
        let slot = freq.entry(load).or_insert((0, 0));
        slot.0 += 1;
        slot.1 = slot.1.max(set.set_index);
    }
    freq.into_iter()
        .max_by(|(load_a, (count_a, idx_a)), (load_b, (count_b, idx_b))| {
            count_a
                .cmp(count_b)
                .then(idx_a.cmp(idx_b))
                .then(load_a.cmp(load_b))
        })
        .map(|(load, _)| load)
}

/// Most frequent working-set RPE of a session; same tie rules as loads.
pub fn modal_rpe(sets: &[PerformedSet]) -> Option<Decimal> {
    let mut freq: HashMap<Decimal, (u32, u32)> = HashMap::new();
    for set in modal_eligible(sets) {
        let rpe = set.rpe?;
        let slot = freq.entry(rpe).or_insert((0, 0));
        slot.0 += 1;
        slot.1 = slot.1.max(set.set_index);
    }
    freq.into_iter()
        .max_by(|(rpe_a, (count_a, idx_a)), (rpe_b, (count_b, idx_b))| {
            count_a
                .cmp(count_b)
                .then(idx_a.cmp(idx_b))
                .then(rpe_a.cmp(rpe_b))
        })
        .map(|(rpe, _)| rpe)
}

/// Most frequent rep count among working sets; ties toward later, higher.
pub fn modal_reps(sets: &[PerformedSet]) -> Option<u32> {
    let mut freq: HashMap<u32, (u32, u32)> = HashMap::new();
    for set in modal_eligible(sets) {
        let slot = freq.entry(set.reps).or_insert((0, 0));
        slot.0 += 1;
        slot.1 = slot.1.max(set.set_index);
    }
    freq.into_iter()
        .max_by(|(reps_a, (count_a, idx_a)), (reps_b, (count_b, idx_b))| {
            count_a
                .cmp(count_b)
                .then(idx_a.cmp(idx_b))
                .then(reps_a.cmp(reps_b))
        })
        .map(|(reps, _)| reps)
}

/// Rewrite all working-set loads of a session to the session's modal load.
///
/// Accessory progression anchors on the weight actually worked; stray heavier
/// or lighter sets would otherwise skew the double-progression decision.
pub fn normalize_to_modal(sets: &[PerformedSet]) -> Vec<PerformedSet> {
    match modal_load(sets) {
        Some(load) => sets
            .iter()
            .map(|s| PerformedSet {
                load: s.load.map(|_| load),
                ..s.clone()
            })
            .collect(),
        None => sets.to_vec(),
    }
}

/// Confidence-weighted modal load across sessions.
///
/// Each session votes its modal load with weight equal to its confidence.
/// Manual logs are promoted to full confidence when the exercise has no
/// intent-planned sessions at all (the manual log is then the only signal).
/// Ties prefer the more recent session, then the higher load.
pub fn weighted_modal_load(sessions: &[ExerciseSession]) -> Option<Decimal> {
    let has_intent = sessions
        .iter()
        .any(|s| s.selection_mode == SelectionMode::Intent);

    // recency: lower index = more recent; store min index per load.
    let mut votes: HashMap<Decimal, (f64, usize)> = HashMap::new();
    for (idx, session) in sessions.iter().enumerate() {
        let Some(load) = modal_load(&session.sets) else {
            continue;
        };
        let weight = if !has_intent && session.selection_mode == SelectionMode::Manual {
            1.0
        } else {
            session.confidence
        };
        let slot = votes.entry(load).or_insert((0.0, idx));
        slot.0 += weight;
        slot.1 = slot.1.min(idx);
    }

    votes
        .into_iter()
        .max_by(|(load_a, (w_a, idx_a)), (load_b, (w_b, idx_b))| {
            w_a.partial_cmp(w_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(idx_b.cmp(idx_a))
                .then(load_a.cmp(load_b))
        })
        .map(|(load, _)| load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovementPattern, PerformedExercise, WorkoutStatus};

    fn set(idx: u32, reps: u32, load: Decimal, rpe: Decimal) -> PerformedSet {
        PerformedSet {
            set_index: idx,
            reps,
            load: Some(load),
            rpe: Some(rpe),
            was_skipped: false,
        }
    }

    fn entry(
        date: NaiveDate,
        exercise_id: &str,
        sets: Vec<PerformedSet>,
        mode: SelectionMode,
    ) -> WorkoutHistoryEntry {
        WorkoutHistoryEntry {
            date,
            status: WorkoutStatus::Completed,
            intent: SessionIntent::Push,
            exercises: vec![PerformedExercise {
                exercise_id: exercise_id.to_string(),
                pattern: MovementPattern::HorizontalPush,
                primary_muscles: vec![Muscle::Chest],
                sets,
            }],
            phase: None,
            week_in_meso: None,
            selection_mode: mode,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_modal_load_most_frequent_wins() {
        let sets = vec![
            set(0, 8, dec!(95), dec!(7)),
            set(1, 8, dec!(100), dec!(8)),
            set(2, 8, dec!(100), dec!(8)),
            set(3, 6, dec!(100), dec!(9)),
        ];
        assert_eq!(modal_load(&sets), Some(dec!(100)));
    }

    #[test]
    fn test_modal_load_tie_prefers_later_then_heavier() {
        // 2 votes each; 105 appears in later set indices.
        let sets = vec![
            set(0, 8, dec!(100), dec!(7)),
            set(1, 8, dec!(100), dec!(7.5)),
            set(2, 6, dec!(105), dec!(8)),
            set(3, 6, dec!(105), dec!(8.5)),
        ];
        assert_eq!(modal_load(&sets), Some(dec!(105)));
    }

    #[test]
    fn test_modal_excludes_low_rpe_ramp_sets() {
        let sets = vec![
            set(0, 10, dec!(45), dec!(3)),
            set(1, 8, dec!(45), dec!(4)),
            set(2, 8, dec!(95), dec!(8)),
        ];
        assert_eq!(modal_load(&sets), Some(dec!(95)));
    }

    #[test]
    fn test_modal_includes_sets_without_rpe() {
        let sets = vec![
            PerformedSet {
                set_index: 0,
                reps: 8,
                load: Some(dec!(80)),
                rpe: None,
                was_skipped: false,
            },
            PerformedSet {
                set_index: 1,
                reps: 8,
                load: Some(dec!(80)),
                rpe: None,
                was_skipped: false,
            },
        ];
        assert_eq!(modal_load(&sets), Some(dec!(80)));
        assert_eq!(modal_rpe(&sets), None);
    }

    #[test]
    fn test_normalize_to_modal() {
        let sets = vec![
            set(0, 8, dec!(95), dec!(7)),
            set(1, 8, dec!(100), dec!(8)),
            set(2, 8, dec!(100), dec!(8)),
        ];
        let normalized = normalize_to_modal(&sets);
        assert!(normalized.iter().all(|s| s.load == Some(dec!(100))));
        // Reps and indices untouched.
        assert_eq!(normalized[0].set_index, 0);
        assert_eq!(normalized[0].reps, 8);
    }

    #[test]
    fn test_index_filters_unperformed_and_sorts_desc() {
        let mut skipped = entry(
            date(2025, 6, 1),
            "bench",
            vec![set(0, 5, dec!(200), dec!(8))],
            SelectionMode::Intent,
        );
        skipped.status = WorkoutStatus::Skipped;

        let entries = vec![
            entry(
                date(2025, 6, 2),
                "bench",
                vec![set(0, 5, dec!(205), dec!(8))],
                SelectionMode::Intent,
            ),
            skipped,
            entry(
                date(2025, 6, 9),
                "bench",
                vec![set(0, 5, dec!(210), dec!(8))],
                SelectionMode::Intent,
            ),
        ];
        let index = HistoryIndex::build(&entries, &HistoryIndexOptions::default());
        let sessions = index.sessions("bench");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].date, date(2025, 6, 9));
        assert_eq!(modal_load(&sessions[0].sets), Some(dec!(210)));
    }

    #[test]
    fn test_intent_filter_restricts_sessions() {
        let mut pull = entry(
            date(2025, 6, 5),
            "bench",
            vec![set(0, 8, dec!(100), dec!(8))],
            SelectionMode::Intent,
        );
        pull.intent = SessionIntent::Pull;
        let push = entry(
            date(2025, 6, 9),
            "bench",
            vec![set(0, 8, dec!(105), dec!(8))],
            SelectionMode::Intent,
        );

        let index = HistoryIndex::build(
            &[push, pull],
            &HistoryIndexOptions {
                intent: Some(SessionIntent::Push),
                meso_seed: false,
            },
        );
        let sessions = index.sessions("bench");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].intent, SessionIntent::Push);
    }

    #[test]
    fn test_meso_seed_prefers_top_accumulation_week() {
        let mut week3 = entry(
            date(2025, 6, 16),
            "bench",
            vec![set(0, 8, dec!(185), dec!(8))],
            SelectionMode::Intent,
        );
        week3.phase = Some(BlockType::Accumulation);
        week3.week_in_meso = Some(3);

        let mut week1 = entry(
            date(2025, 6, 2),
            "bench",
            vec![set(0, 8, dec!(175), dec!(7))],
            SelectionMode::Intent,
        );
        week1.phase = Some(BlockType::Accumulation);
        week1.week_in_meso = Some(1);

        let mut deload = entry(
            date(2025, 6, 23),
            "bench",
            vec![set(0, 8, dec!(115), dec!(5))],
            SelectionMode::Intent,
        );
        deload.phase = Some(BlockType::Deload);
        deload.week_in_meso = Some(4);

        let index = HistoryIndex::build(
            &[week3, week1, deload],
            &HistoryIndexOptions {
                intent: None,
                meso_seed: true,
            },
        );
        let sessions = index.sessions("bench");
        assert_eq!(sessions.len(), 1);
        assert_eq!(modal_load(&sessions[0].sets), Some(dec!(185)));
    }

    #[test]
    fn test_weighted_modal_prefers_confident_sessions() {
        let sessions = vec![
            ExerciseSession {
                date: date(2025, 6, 9),
                sets: vec![set(0, 8, dec!(100), dec!(8)), set(1, 8, dec!(100), dec!(8))],
                confidence: 1.0,
                selection_mode: SelectionMode::Intent,
                intent: SessionIntent::Push,
            },
            ExerciseSession {
                date: date(2025, 6, 2),
                sets: vec![set(0, 8, dec!(90), dec!(8))],
                confidence: 0.4,
                selection_mode: SelectionMode::Manual,
                intent: SessionIntent::Push,
            },
        ];
        assert_eq!(weighted_modal_load(&sessions), Some(dec!(100)));
    }

    #[test]
    fn test_weighted_modal_manual_only_counts_full() {
        // No INTENT sessions at all: a lone manual log is trusted outright.
        let sessions = vec![ExerciseSession {
            date: date(2025, 6, 2),
            sets: vec![set(0, 8, dec!(90), dec!(8))],
            confidence: 0.3,
            selection_mode: SelectionMode::Manual,
            intent: SessionIntent::Push,
        }];
        assert_eq!(weighted_modal_load(&sessions), Some(dec!(90)));
    }

    #[test]
    fn test_weekly_sets_window() {
        let entries = vec![
            entry(
                date(2025, 6, 9),
                "bench",
                vec![set(0, 8, dec!(100), dec!(8)), set(1, 8, dec!(100), dec!(8))],
                SelectionMode::Intent,
            ),
            entry(
                date(2025, 5, 1),
                "bench",
                vec![set(0, 8, dec!(95), dec!(8))],
                SelectionMode::Intent,
            ),
        ];
        let index = HistoryIndex::build(&entries, &HistoryIndexOptions::default());
        let totals = index.weekly_sets_per_muscle(date(2025, 6, 10), 7);
        assert_eq!(totals[Muscle::Chest.index()], 2.0);
        assert_eq!(totals[Muscle::Back.index()], 0.0);
    }

    #[test]
    fn test_confidence_scales_with_completion() {
        let sets = vec![
            set(0, 8, dec!(100), dec!(8)),
            PerformedSet {
                set_index: 1,
                reps: 0,
                load: None,
                rpe: None,
                was_skipped: true,
            },
        ];
        let e = entry(date(2025, 6, 9), "bench", sets, SelectionMode::Intent);
        let index = HistoryIndex::build(&[e], &HistoryIndexOptions::default());
        let session = index.latest_session("bench").unwrap();
        assert!((session.confidence - 0.5).abs() < 1e-9);
    }
}
