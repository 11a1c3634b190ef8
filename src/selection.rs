//! Exercise selection: hard filters, main-lift seeding, beam search
//!
//! Selection runs in four stages:
//!
//! 1. Scope and hard filters reduce the catalog to in-scope candidates and
//!    record a structured rejection reason for everything else.
//! 2. Main-lift seeding fills up to two main slots from an intent-specific
//!    pattern requirement map.
//! 3. Per-exercise set targets derive from weekly volume targets and the
//!    muscle's training frequency.
//! 4. A beam search fills the accessory slots, maximizing a weighted
//!    multi-objective score under the session timebox, MRV ceilings, and
//!    coverage constraints.
//!
//! Determinism is a contract: scores are compared at fixed six-decimal
//! precision and every tie breaks by (SFR desc, fatigue cost asc, name).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::EngineConfig;
use crate::history::HistoryIndex;
use crate::models::{
    Equipment, Exercise, Goal, MovementPattern, SessionIntent, SetRole, TrainingAge,
};
use crate::prescription::{rep_range, rest_seconds};
use crate::volume::{sessions_per_week_for_split, weekly_target, Muscle, Split};

/// How the session's exercises are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    /// Rank the catalog against the session intent.
    Intent,
    /// Rank against an explicit target-muscle list.
    BodyPart,
    /// Use the pinned exercise list verbatim.
    Template,
}

/// Equipment and schedule constraints for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConstraints {
    pub available_equipment: Vec<Equipment>,
    pub days_per_week: u32,
}

/// All user-side inputs to one selection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionInput {
    pub mode: PlanningMode,
    pub intent: SessionIntent,
    #[serde(default)]
    pub target_muscles: Vec<Muscle>,
    #[serde(default)]
    pub pinned_exercise_ids: Vec<String>,
    pub session_minutes: u32,
    pub training_age: TrainingAge,
    pub goal: Goal,
    pub constraints: SelectionConstraints,
    #[serde(default)]
    pub favorite_exercise_ids: Vec<String>,
    #[serde(default)]
    pub avoided_exercise_ids: Vec<String>,
    /// Recent pain sites, matched against exercise contraindication tags.
    #[serde(default)]
    pub pain_sites: Vec<String>,
}

/// Cycle position and readiness the selector needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionContext {
    pub date: NaiveDate,
    pub week_in_meso: u32,
    pub meso_length: u32,
    pub is_deload: bool,
    /// Overall readiness in `[0, 1]` from the fatigue scorer.
    pub fatigue_overall: f64,
}

/// Structured reason an exercise was excluded, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFailure {
    OutOfScope,
    EquipmentUnavailable,
    Contraindicated,
    AvoidedByUser,
    AlreadySelected,
    OverMrv,
    TimeBudget,
    /// Same dominant pattern and primary muscles as a selected accessory.
    Redundant,
}

/// One rejected candidate with its first failure reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub exercise_id: String,
    pub reason: FilterFailure,
}

/// Raw score components for one candidate in one slot, all in `[0, 1]`.
/// Weights live in [`ScoreBreakdown::total`]; explanation projections
/// serialize the raw values alongside the weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    pub muscle_deficit: f64,
    pub targetedness: f64,
    pub sfr: f64,
    pub lengthened: f64,
    pub preference: f64,
    pub movement_diversity: f64,
    pub continuity: f64,
    pub time_fit: f64,
    pub recency_penalty: f64,
    pub redundancy_penalty: f64,
    pub fatigue_cost_penalty: f64,
}

pub const W_MUSCLE_DEFICIT: f64 = 1.0;
pub const W_TARGETEDNESS: f64 = 0.5;
pub const W_SFR: f64 = 0.4;
pub const W_LENGTHENED: f64 = 0.3;
pub const W_PREFERENCE: f64 = 0.2;
pub const W_DIVERSITY: f64 = 0.2;
pub const W_CONTINUITY: f64 = 0.15;
pub const W_TIME_FIT: f64 = 0.1;
pub const W_RECENCY: f64 = -0.3;
pub const W_REDUNDANCY: f64 = -0.4;
pub const W_FATIGUE_COST: f64 = -0.2;

impl ScoreBreakdown {
    /// Weighted sum of all components.
    pub fn total(&self) -> f64 {
        W_MUSCLE_DEFICIT * self.muscle_deficit
            + W_TARGETEDNESS * self.targetedness
            + W_SFR * self.sfr
            + W_LENGTHENED * self.lengthened
            + W_PREFERENCE * self.preference
            + W_DIVERSITY * self.movement_diversity
            + W_CONTINUITY * self.continuity
            + W_TIME_FIT * self.time_fit
            + W_RECENCY * self.recency_penalty
            + W_REDUNDANCY * self.redundancy_penalty
            + W_FATIGUE_COST * self.fatigue_cost_penalty
    }
}

/// Fixed-precision score for deterministic comparison across platforms.
fn quantized(score: f64) -> i64 {
    (score * 1e6).round() as i64
}

/// One selected exercise with its set target and (for accessories) the
/// score components that won it the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedExercise {
    pub exercise_id: String,
    pub role: SetRole,
    pub order_index: u32,
    pub set_target: u32,
    #[serde(default)]
    pub score: Option<ScoreBreakdown>,
    /// Weekly-set contribution per muscle: full sets to the dominant
    /// primary, half to the remaining primaries.
    pub volume_contribution: Vec<(Muscle, f64)>,
}

/// Output of one selection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<SelectedExercise>,
    pub main_lift_ids: Vec<String>,
    pub accessory_ids: Vec<String>,
    pub rejected: Vec<RejectedCandidate>,
    /// Required muscles the final selection failed to cover.
    pub coverage_gaps: Vec<Muscle>,
    pub estimated_minutes: f64,
}

/// Muscles in scope for an intent.
pub fn intent_scope(intent: SessionIntent, target_muscles: &[Muscle]) -> Vec<Muscle> {
    match intent {
        SessionIntent::Push => Muscle::in_split(Split::Push).collect(),
        SessionIntent::Pull => Muscle::in_split(Split::Pull).collect(),
        SessionIntent::Legs | SessionIntent::Lower => Muscle::in_split(Split::Legs).collect(),
        SessionIntent::Upper => Muscle::in_split(Split::Push)
            .chain(Muscle::in_split(Split::Pull))
            .collect(),
        SessionIntent::FullBody => Muscle::ALL.to_vec(),
        SessionIntent::BodyPart => target_muscles.to_vec(),
    }
}

/// High-priority muscles a session of this intent must cover.
pub fn required_muscles(intent: SessionIntent, target_muscles: &[Muscle]) -> Vec<Muscle> {
    match intent {
        SessionIntent::Push => vec![Muscle::Chest, Muscle::SideDelts],
        SessionIntent::Pull => vec![Muscle::Back, Muscle::Biceps],
        SessionIntent::Legs => vec![Muscle::Quads, Muscle::Hamstrings, Muscle::Glutes],
        SessionIntent::Upper => vec![Muscle::Chest, Muscle::Back],
        SessionIntent::Lower => vec![Muscle::Quads, Muscle::Hamstrings],
        SessionIntent::FullBody => vec![Muscle::Chest, Muscle::Back, Muscle::Quads],
        SessionIntent::BodyPart => target_muscles.to_vec(),
    }
}

fn sessions_per_week(intent: SessionIntent, days_per_week: u32) -> u32 {
    let rotation = match intent {
        SessionIntent::Push | SessionIntent::Pull | SessionIntent::Legs => 3,
        SessionIntent::Upper | SessionIntent::Lower => 2,
        SessionIntent::FullBody | SessionIntent::BodyPart => 1,
    };
    sessions_per_week_for_split(days_per_week, rotation)
}

fn hard_filter(
    exercise: &Exercise,
    input: &SelectionInput,
    scope: &[Muscle],
    allow_avoided: bool,
) -> Result<(), FilterFailure> {
    if !exercise.primary_muscles.iter().any(|m| scope.contains(m)) {
        return Err(FilterFailure::OutOfScope);
    }
    let equipment_ok = exercise.equipment.iter().all(|e| {
        *e == Equipment::Bodyweight || input.constraints.available_equipment.contains(e)
    });
    if !equipment_ok {
        return Err(FilterFailure::EquipmentUnavailable);
    }
    if exercise
        .contraindications
        .iter()
        .any(|tag| input.pain_sites.contains(tag))
    {
        return Err(FilterFailure::Contraindicated);
    }
    if !allow_avoided && input.avoided_exercise_ids.contains(&exercise.id) {
        return Err(FilterFailure::AvoidedByUser);
    }
    Ok(())
}

/// One main-lift slot: a predicate over the catalog.
struct MainSlotSpec {
    matches: fn(&Exercise) -> bool,
}

fn has_pattern(exercise: &Exercise, pattern: MovementPattern) -> bool {
    exercise.patterns.contains(&pattern)
}

fn main_slot_specs(intent: SessionIntent) -> Vec<MainSlotSpec> {
    match intent {
        SessionIntent::Push => vec![
            MainSlotSpec {
                matches: |e| has_pattern(e, MovementPattern::HorizontalPush) && e.is_compound,
            },
            MainSlotSpec {
                matches: |e| {
                    has_pattern(e, MovementPattern::VerticalPush)
                        || (has_pattern(e, MovementPattern::Isolation)
                            && e.primary_muscles
                                .iter()
                                .any(|m| matches!(m, Muscle::SideDelts | Muscle::FrontDelts)))
                },
            },
        ],
        SessionIntent::Pull => vec![
            MainSlotSpec {
                matches: |e| has_pattern(e, MovementPattern::HorizontalPull),
            },
            MainSlotSpec {
                matches: |e| has_pattern(e, MovementPattern::VerticalPull),
            },
        ],
        SessionIntent::Legs | SessionIntent::Lower => vec![
            MainSlotSpec {
                matches: |e| has_pattern(e, MovementPattern::Squat),
            },
            MainSlotSpec {
                matches: |e| has_pattern(e, MovementPattern::Hinge),
            },
        ],
        SessionIntent::Upper => vec![
            MainSlotSpec {
                matches: |e| {
                    e.is_compound
                        && (has_pattern(e, MovementPattern::HorizontalPush)
                            || has_pattern(e, MovementPattern::VerticalPush))
                },
            },
            MainSlotSpec {
                matches: |e| {
                    e.is_compound
                        && (has_pattern(e, MovementPattern::HorizontalPull)
                            || has_pattern(e, MovementPattern::VerticalPull))
                },
            },
        ],
        SessionIntent::FullBody => vec![
            MainSlotSpec {
                matches: |e| {
                    e.is_compound
                        && (has_pattern(e, MovementPattern::HorizontalPush)
                            || has_pattern(e, MovementPattern::VerticalPush))
                },
            },
            MainSlotSpec {
                matches: |e| {
                    e.is_compound
                        && (has_pattern(e, MovementPattern::HorizontalPull)
                            || has_pattern(e, MovementPattern::VerticalPull))
                },
            },
            MainSlotSpec {
                matches: |e| {
                    has_pattern(e, MovementPattern::Squat) || has_pattern(e, MovementPattern::Hinge)
                },
            },
        ],
        SessionIntent::BodyPart => vec![MainSlotSpec {
            matches: |e| e.is_compound,
        }],
    }
}

/// Whether a pattern belongs to the intent's movement family.
fn pattern_matches_intent(pattern: MovementPattern, intent: SessionIntent) -> bool {
    use MovementPattern::*;
    match intent {
        SessionIntent::Push => matches!(pattern, HorizontalPush | VerticalPush),
        SessionIntent::Pull => matches!(pattern, HorizontalPull | VerticalPull),
        SessionIntent::Legs | SessionIntent::Lower => matches!(pattern, Squat | Hinge | Lunge),
        SessionIntent::Upper => {
            matches!(pattern, HorizontalPush | VerticalPush | HorizontalPull | VerticalPull)
        }
        SessionIntent::FullBody | SessionIntent::BodyPart => true,
    }
}

/// Stage-2 priority key: eligibility, compound-ness, SFR, manageable
/// fatigue, pattern fit, then name for determinism.
fn main_priority_key(exercise: &Exercise, intent: SessionIntent) -> (u8, u8, u8, u8, u8) {
    (
        u8::from(exercise.main_lift_eligible),
        u8::from(exercise.is_compound),
        exercise.sfr,
        u8::from(exercise.fatigue_cost <= 4),
        u8::from(
            exercise
                .dominant_pattern()
                .map_or(false, |p| pattern_matches_intent(p, intent)),
        ),
    )
}

/// Stage-3 set target: weekly target split across the muscle's weekly
/// sessions, scaled by how dominant this exercise is for the muscle.
fn set_target_for(
    exercise: &Exercise,
    ctx: &SelectionContext,
    frequency: u32,
    is_dominant: bool,
    config: &EngineConfig,
) -> u32 {
    let Some(primary) = exercise.primary_muscles.first() else {
        return config.set_target_min;
    };
    let weekly = weekly_target(*primary, ctx.week_in_meso, ctx.meso_length, ctx.is_deload);
    let share = if is_dominant { 1.0 } else { 0.5 };
    let raw = (f64::from(weekly) / f64::from(frequency.max(1)) * share).round() as u32;
    raw.clamp(config.set_target_min, config.set_target_max)
}

fn volume_contribution(exercise: &Exercise, sets: u32) -> Vec<(Muscle, f64)> {
    exercise
        .primary_muscles
        .iter()
        .enumerate()
        .map(|(i, m)| (*m, if i == 0 { f64::from(sets) } else { f64::from(sets) * 0.5 }))
        .collect()
}

/// Expected minutes a main lift's warmup ramp costs, by training age.
fn warmup_minutes(age: TrainingAge) -> f64 {
    match age {
        TrainingAge::Beginner => 3.5,
        _ => 5.0,
    }
}

/// Estimated minutes for an exercise at a set count, rest and (for loaded
/// main lifts) the warmup ramp included.
fn exercise_minutes(
    exercise: &Exercise,
    sets: u32,
    is_main: bool,
    goal: Goal,
    age: TrainingAge,
) -> f64 {
    let reps = rep_range(exercise, goal, is_main).min;
    let rest = rest_seconds(exercise, is_main, reps);
    let working = f64::from(sets * (exercise.execution_seconds() + rest)) / 60.0;
    if is_main && !exercise.is_bodyweight_only() {
        working + warmup_minutes(age)
    } else {
        working
    }
}

#[derive(Clone)]
struct BeamPath {
    selected: Vec<usize>,
    minutes: f64,
    committed_sets: [f64; Muscle::COUNT],
    pattern_counts: Vec<(MovementPattern, u32)>,
    score: f64,
}

impl BeamPath {
    fn pattern_uses(&self, pattern: MovementPattern) -> u32 {
        self.pattern_counts
            .iter()
            .find(|(p, _)| *p == pattern)
            .map_or(0, |(_, n)| *n)
    }

    fn bump_pattern(&mut self, pattern: MovementPattern) {
        match self.pattern_counts.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, n)) => *n += 1,
            None => self.pattern_counts.push((pattern, 1)),
        }
    }
}

struct Candidate<'a> {
    exercise: &'a Exercise,
    set_target: u32,
    minutes: f64,
}

/// Full selection pipeline. Infeasible slots degrade to a partial result
/// with rejection diagnostics; this function does not fail.
pub fn select_exercises(
    library: &[Exercise],
    history: &HistoryIndex,
    input: &SelectionInput,
    ctx: &SelectionContext,
    config: &EngineConfig,
) -> SelectionResult {
    let scope = intent_scope(input.intent, &input.target_muscles);
    let frequency = sessions_per_week(input.intent, input.constraints.days_per_week);
    let weekly_actual = history.weekly_sets_per_muscle(ctx.date, 7);

    let mut rejected: Vec<RejectedCandidate> = Vec::new();
    fn record_rejection(rejected: &mut Vec<RejectedCandidate>, id: &str, reason: FilterFailure) {
        if !rejected.iter().any(|r| r.exercise_id == id) {
            rejected.push(RejectedCandidate {
                exercise_id: id.to_string(),
                reason,
            });
        }
    }

    // Stage 1: hard filters over the whole catalog.
    let mut pool: Vec<&Exercise> = Vec::new();
    for exercise in library {
        match hard_filter(exercise, input, &scope, false) {
            Ok(()) => pool.push(exercise),
            Err(reason) => record_rejection(&mut rejected, &exercise.id, reason),
        }
    }
    // Avoided exercises come back only when nothing compliant survived.
    if pool.is_empty() {
        for exercise in library {
            if hard_filter(exercise, input, &scope, true).is_ok() {
                pool.push(exercise);
            }
        }
        if !pool.is_empty() {
            debug!("avoid-list override: no compliant alternative exists");
            rejected.retain(|r| r.reason != FilterFailure::AvoidedByUser);
        }
    }

    // Template mode short-circuits ranking entirely.
    if input.mode == PlanningMode::Template {
        return select_from_template(library, input, ctx, frequency, config, rejected);
    }

    // Stage 2: main-lift seeding. Pinned main-eligible exercises take the
    // slots first, then the pattern requirement map fills the rest. Most
    // intents seed two mains; full-body carries a third slot for the
    // squat-or-hinge requirement.
    let main_slot_cap = main_slot_specs(input.intent).len().max(2);
    let mut mains: Vec<&Exercise> = Vec::new();
    for id in &input.pinned_exercise_ids {
        if mains.len() >= main_slot_cap {
            break;
        }
        if let Some(exercise) = pool
            .iter()
            .copied()
            .find(|e| e.id == *id && e.main_lift_eligible)
        {
            mains.push(exercise);
        }
    }
    for spec in main_slot_specs(input.intent) {
        if mains.len() >= main_slot_cap {
            break;
        }
        // A slot whose pattern an existing main already covers stays empty.
        if mains.iter().any(|m| (spec.matches)(m)) {
            continue;
        }
        let mut slot_candidates: Vec<&Exercise> = pool
            .iter()
            .copied()
            .filter(|e| (spec.matches)(e) && !mains.iter().any(|m| m.id == e.id))
            .collect();
        slot_candidates.sort_by(|a, b| {
            main_priority_key(b, input.intent)
                .cmp(&main_priority_key(a, input.intent))
                .then_with(|| a.name.cmp(&b.name))
        });
        if let Some(best) = slot_candidates.first() {
            mains.push(best);
        }
    }

    // Stage 3: set targets for the seeded mains. Time-constrained sessions
    // trim main volume (never the lifts themselves) before accessories are
    // even considered.
    let budget = f64::from(input.session_minutes);
    let mut dominant_taken: HashSet<Muscle> = HashSet::new();
    let mut main_sets: Vec<u32> = mains
        .iter()
        .map(|exercise| {
            let dominant = exercise
                .primary_muscles
                .first()
                .map_or(false, |m| dominant_taken.insert(*m));
            set_target_for(exercise, ctx, frequency, dominant, config)
        })
        .collect();
    let main_minutes = |sets: &[u32], mains: &[&Exercise]| -> f64 {
        mains
            .iter()
            .zip(sets)
            .map(|(e, s)| exercise_minutes(e, *s, true, input.goal, input.training_age))
            .sum()
    };
    while main_minutes(&main_sets, &mains) > budget
        && main_sets.iter().any(|s| *s > config.set_target_min)
    {
        for sets in main_sets.iter_mut() {
            if *sets > config.set_target_min {
                *sets -= 1;
            }
        }
    }

    let mut committed_sets = [0.0; Muscle::COUNT];
    let mut selected: Vec<SelectedExercise> = Vec::new();
    let mut minutes_used = 0.0;

    for (order, (exercise, sets)) in mains.iter().zip(&main_sets).enumerate() {
        let contribution = volume_contribution(exercise, *sets);
        for (muscle, amount) in &contribution {
            committed_sets[muscle.index()] += amount;
        }
        minutes_used += exercise_minutes(exercise, *sets, true, input.goal, input.training_age);
        selected.push(SelectedExercise {
            exercise_id: exercise.id.clone(),
            role: SetRole::Main,
            order_index: order as u32,
            set_target: *sets,
            score: None,
            volume_contribution: contribution,
        });
    }

    // Stage 4: beam search over accessory slots.
    let remaining = (budget - minutes_used).max(0.0);
    let main_ids: HashSet<&str> = mains.iter().map(|e| e.id.as_str()).collect();

    let mut candidates: Vec<Candidate> = pool
        .iter()
        .copied()
        .filter(|e| !main_ids.contains(e.id.as_str()))
        .map(|e| {
            // Dominance for accessories resolves during the search; targets
            // assume the non-dominant share when a main already owns the
            // muscle.
            let dominant = e
                .primary_muscles
                .first()
                .map_or(false, |m| !dominant_taken.contains(m));
            let sets = set_target_for(e, ctx, frequency, dominant, config);
            Candidate {
                exercise: e,
                set_target: sets,
                minutes: exercise_minutes(e, sets, false, input.goal, input.training_age),
            }
        })
        .collect();
    candidates.sort_by(|a, b| a.exercise.name.cmp(&b.exercise.name));

    let max_slots = {
        let per_accessory = 6.5;
        let by_time = (remaining / per_accessory).floor() as usize;
        by_time
            .min(config.max_accessory_slots)
            .min(config.max_exercises.saturating_sub(mains.len()))
    };

    let mut frontier = vec![BeamPath {
        selected: Vec::new(),
        minutes: minutes_used,
        committed_sets,
        pattern_counts: mains
            .iter()
            .filter_map(|e| e.dominant_pattern())
            .fold(Vec::new(), |mut acc, p| {
                match acc.iter_mut().find(|(q, _)| *q == p) {
                    Some((_, n)) => *n += 1,
                    None => acc.push((p, 1)),
                }
                acc
            }),
        score: 0.0,
    }];
    let epsilon = 1.0 + config.time_epsilon;

    let mut scored: Vec<(usize, ScoreBreakdown)> = Vec::new();
    for _slot in 0..max_slots {
        let mut expansions: Vec<(BeamPath, usize, ScoreBreakdown)> = Vec::new();
        for path in &frontier {
            for (cand_idx, candidate) in candidates.iter().enumerate() {
                if path.selected.contains(&cand_idx) {
                    continue;
                }
                if path.minutes + candidate.minutes > budget * epsilon {
                    record_rejection(
                        &mut rejected,
                        &candidate.exercise.id,
                        FilterFailure::TimeBudget,
                    );
                    continue;
                }
                if violates_mrv(candidate, &path.committed_sets, &weekly_actual) {
                    record_rejection(&mut rejected, &candidate.exercise.id, FilterFailure::OverMrv);
                    continue;
                }

                let breakdown = score_candidate(
                    candidate,
                    path,
                    &candidates,
                    &scope,
                    input,
                    ctx,
                    history,
                    &weekly_actual,
                    budget,
                    config,
                );
                // A fully redundant pair can never survive the final
                // constraints; prune it instead of carrying a doomed path.
                if breakdown.redundancy_penalty >= 1.0 {
                    record_rejection(&mut rejected, &candidate.exercise.id, FilterFailure::Redundant);
                    continue;
                }
                let mut next = path.clone();
                next.selected.push(cand_idx);
                next.minutes += candidate.minutes;
                for (muscle, amount) in volume_contribution(candidate.exercise, candidate.set_target)
                {
                    next.committed_sets[muscle.index()] += amount;
                }
                if let Some(pattern) = candidate.exercise.dominant_pattern() {
                    next.bump_pattern(pattern);
                }
                next.score += breakdown.total();
                expansions.push((next, cand_idx, breakdown));
            }
        }
        if expansions.is_empty() {
            break;
        }
        expansions.sort_by(|(a, _, _), (b, _, _)| {
            let (a_last, b_last) = (a.selected.last().unwrap(), b.selected.last().unwrap());
            let (ea, eb) = (candidates[*a_last].exercise, candidates[*b_last].exercise);
            quantized(b.score)
                .cmp(&quantized(a.score))
                .then_with(|| eb.sfr.cmp(&ea.sfr))
                .then_with(|| ea.fatigue_cost.cmp(&eb.fatigue_cost))
                .then_with(|| ea.name.cmp(&eb.name))
        });
        expansions.truncate(config.beam_width);
        for (_, cand_idx, breakdown) in &expansions {
            if !scored.iter().any(|(idx, _)| idx == cand_idx) {
                scored.push((*cand_idx, *breakdown));
            }
        }
        frontier = expansions.into_iter().map(|(path, _, _)| path).collect();
    }

    // Pick the best frontier path that satisfies the hard session
    // constraints; fall back to the best scoring path with gaps reported.
    let required = required_muscles(input.intent, &input.target_muscles);
    let valid = frontier
        .iter()
        .find(|path| {
            let total = mains.len() + path.selected.len();
            total >= config.min_exercises.min(mains.len() + candidates.len())
                && !has_redundant_pair(path, &candidates)
                && coverage_gaps(path, &candidates, &mains, &required).is_empty()
        })
        .or_else(|| frontier.iter().find(|p| !has_redundant_pair(p, &candidates)))
        .or_else(|| frontier.first());

    let best = match valid {
        Some(path) => path.clone(),
        None => BeamPath {
            selected: Vec::new(),
            minutes: minutes_used,
            committed_sets,
            pattern_counts: Vec::new(),
            score: 0.0,
        },
    };

    let gaps = coverage_gaps(&best, &candidates, &mains, &required);
    if !gaps.is_empty() {
        debug!(?gaps, "selection left required muscles uncovered");
    }

    // Beam-time rejections are path-local; anything the winning path kept
    // is not rejected.
    rejected.retain(|r| {
        !best
            .selected
            .iter()
            .any(|idx| candidates[*idx].exercise.id == r.exercise_id)
            && !mains.iter().any(|m| m.id == r.exercise_id)
    });

    let mut order = selected.len() as u32;
    let mut accessory_ids = Vec::new();
    for cand_idx in &best.selected {
        let candidate = &candidates[*cand_idx];
        accessory_ids.push(candidate.exercise.id.clone());
        selected.push(SelectedExercise {
            exercise_id: candidate.exercise.id.clone(),
            role: SetRole::Accessory,
            order_index: order,
            set_target: candidate.set_target,
            score: scored
                .iter()
                .find(|(idx, _)| idx == cand_idx)
                .map(|(_, b)| *b),
            volume_contribution: volume_contribution(candidate.exercise, candidate.set_target),
        });
        order += 1;
    }

    SelectionResult {
        main_lift_ids: mains.iter().map(|e| e.id.clone()).collect(),
        accessory_ids,
        selected,
        rejected,
        coverage_gaps: gaps,
        estimated_minutes: best.minutes,
    }
}

fn violates_mrv(
    candidate: &Candidate,
    committed: &[f64; Muscle::COUNT],
    weekly_actual: &[f64; Muscle::COUNT],
) -> bool {
    volume_contribution(candidate.exercise, candidate.set_target)
        .iter()
        .any(|(muscle, amount)| {
            let projected = committed[muscle.index()] + weekly_actual[muscle.index()] + amount;
            projected > f64::from(muscle.landmarks().mrv)
        })
}

fn has_redundant_pair(path: &BeamPath, candidates: &[Candidate]) -> bool {
    for (i, a_idx) in path.selected.iter().enumerate() {
        for b_idx in path.selected.iter().skip(i + 1) {
            let (a, b) = (candidates[*a_idx].exercise, candidates[*b_idx].exercise);
            if a.dominant_pattern() == b.dominant_pattern()
                && a.primary_muscles == b.primary_muscles
            {
                return true;
            }
        }
    }
    false
}

fn coverage_gaps(
    path: &BeamPath,
    candidates: &[Candidate],
    mains: &[&Exercise],
    required: &[Muscle],
) -> Vec<Muscle> {
    let mut covered: HashSet<Muscle> = HashSet::new();
    for exercise in mains {
        covered.extend(exercise.primary_muscles.iter().copied());
    }
    for cand_idx in &path.selected {
        covered.extend(candidates[*cand_idx].exercise.primary_muscles.iter().copied());
    }
    required
        .iter()
        .filter(|m| !covered.contains(m))
        .copied()
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn score_candidate(
    candidate: &Candidate,
    path: &BeamPath,
    candidates: &[Candidate],
    scope: &[Muscle],
    input: &SelectionInput,
    ctx: &SelectionContext,
    history: &HistoryIndex,
    weekly_actual: &[f64; Muscle::COUNT],
    budget: f64,
    config: &EngineConfig,
) -> ScoreBreakdown {
    let exercise = candidate.exercise;

    let mut muscle_deficit = 0.0;
    for muscle in &exercise.primary_muscles {
        let target =
            f64::from(weekly_target(*muscle, ctx.week_in_meso, ctx.meso_length, ctx.is_deload));
        if target <= 0.0 {
            continue;
        }
        let deficit = (target
            - weekly_actual[muscle.index()]
            - path.committed_sets[muscle.index()])
        .max(0.0);
        muscle_deficit += deficit / target;
    }

    let in_scope = exercise
        .primary_muscles
        .iter()
        .filter(|m| scope.contains(m))
        .count();
    let targetedness = in_scope as f64 / exercise.primary_muscles.len().max(1) as f64;

    let preference = if input.favorite_exercise_ids.contains(&exercise.id) {
        1.0
    } else if input.avoided_exercise_ids.contains(&exercise.id) {
        -1.0
    } else {
        0.0
    };

    let movement_diversity = match exercise.dominant_pattern() {
        Some(pattern) => {
            let uses = path.pattern_uses(pattern);
            if uses == 0 {
                1.0
            } else {
                1.0 / (1.0 + f64::from(uses))
            }
        }
        None => 0.5,
    };

    let continuity = if history.used_with_intent(&exercise.id, input.intent) {
        1.0
    } else if !history.sessions(&exercise.id).is_empty() {
        0.5
    } else {
        0.0
    };

    let remaining = (budget - path.minutes).max(0.0);
    let time_fit = if remaining > 0.0 {
        (1.0 - candidate.minutes / remaining).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let recency_penalty = match history.last_used(&exercise.id) {
        Some(date) => {
            let days = (ctx.date - date).num_days();
            let window = config.recency_window_days as i64;
            if days >= 0 && days < window {
                (window - days) as f64 / window as f64
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    let redundancy_penalty = if path.selected.iter().any(|idx| {
        let other = candidates[*idx].exercise;
        other.dominant_pattern() == exercise.dominant_pattern()
            && other.primary_muscles == exercise.primary_muscles
    }) {
        1.0
    } else {
        0.0
    };

    let fatigue_cost_penalty =
        f64::from(exercise.fatigue_cost) / 5.0 * (1.0 - ctx.fatigue_overall);

    ScoreBreakdown {
        muscle_deficit,
        targetedness,
        sfr: f64::from(exercise.sfr) / 5.0,
        lengthened: f64::from(exercise.length_position) / 5.0,
        preference,
        movement_diversity,
        continuity,
        time_fit,
        recency_penalty,
        redundancy_penalty,
        fatigue_cost_penalty,
    }
}

/// Template mode: honor the pinned list verbatim (main-eligible first).
fn select_from_template(
    library: &[Exercise],
    input: &SelectionInput,
    ctx: &SelectionContext,
    frequency: u32,
    config: &EngineConfig,
    rejected: Vec<RejectedCandidate>,
) -> SelectionResult {
    let mut dominant_taken: HashSet<Muscle> = HashSet::new();
    let mut selected = Vec::new();
    let mut main_lift_ids = Vec::new();
    let mut accessory_ids = Vec::new();
    let mut minutes = 0.0;
    let mut order = 0u32;

    for id in &input.pinned_exercise_ids {
        let Some(exercise) = library.iter().find(|e| e.id == *id) else {
            continue;
        };
        let is_main = exercise.main_lift_eligible && main_lift_ids.len() < 2;
        let dominant = exercise
            .primary_muscles
            .first()
            .map_or(false, |m| dominant_taken.insert(*m));
        let sets = set_target_for(exercise, ctx, frequency, dominant, config);
        minutes += exercise_minutes(exercise, sets, is_main, input.goal, input.training_age);
        if is_main {
            main_lift_ids.push(exercise.id.clone());
        } else {
            accessory_ids.push(exercise.id.clone());
        }
        selected.push(SelectedExercise {
            exercise_id: exercise.id.clone(),
            role: if is_main { SetRole::Main } else { SetRole::Accessory },
            order_index: order,
            set_target: sets,
            score: None,
            volume_contribution: volume_contribution(exercise, sets),
        });
        order += 1;
    }

    SelectionResult {
        selected,
        main_lift_ids,
        accessory_ids,
        rejected,
        coverage_gaps: Vec::new(),
        estimated_minutes: minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryIndexOptions;
    use crate::models::{
        JointStress, PerformedExercise, PerformedSet, SelectionMode, SplitTag, WorkoutHistoryEntry,
        WorkoutStatus,
    };
    use rust_decimal_macros::dec;

    fn exercise(
        id: &str,
        name: &str,
        patterns: Vec<MovementPattern>,
        primaries: Vec<Muscle>,
        compound: bool,
        main_eligible: bool,
        sfr: u8,
        fatigue: u8,
        equipment: Vec<Equipment>,
    ) -> Exercise {
        Exercise {
            id: id.into(),
            name: name.into(),
            patterns,
            split: SplitTag::Push,
            is_compound: compound,
            main_lift_eligible: main_eligible,
            joint_stress: JointStress::Medium,
            equipment,
            fatigue_cost: fatigue,
            sfr,
            length_position: 3,
            stimulus_bias: vec![],
            contraindications: vec![],
            primary_muscles: primaries,
            secondary_muscles: vec![],
            difficulty: TrainingAge::Intermediate,
            is_unilateral: false,
            rep_range: None,
            seconds_per_set: None,
        }
    }

    fn push_library() -> Vec<Exercise> {
        vec![
            exercise(
                "bench",
                "Barbell Bench Press",
                vec![MovementPattern::HorizontalPush],
                vec![Muscle::Chest],
                true,
                true,
                4,
                4,
                vec![Equipment::Barbell],
            ),
            exercise(
                "db-ohp",
                "Dumbbell Overhead Press",
                vec![MovementPattern::VerticalPush],
                vec![Muscle::FrontDelts, Muscle::SideDelts],
                true,
                true,
                4,
                3,
                vec![Equipment::Dumbbell],
            ),
            exercise(
                "incline-db",
                "Incline Dumbbell Bench",
                vec![MovementPattern::HorizontalPush],
                vec![Muscle::Chest],
                true,
                false,
                4,
                3,
                vec![Equipment::Dumbbell],
            ),
            exercise(
                "cable-fly",
                "Cable Fly",
                vec![MovementPattern::Isolation],
                vec![Muscle::Chest],
                false,
                false,
                4,
                2,
                vec![Equipment::Cable],
            ),
            exercise(
                "lateral-raise",
                "Dumbbell Lateral Raise",
                vec![MovementPattern::Isolation],
                vec![Muscle::SideDelts],
                false,
                false,
                5,
                1,
                vec![Equipment::Dumbbell],
            ),
            exercise(
                "pushdown",
                "Cable Pushdown",
                vec![MovementPattern::Isolation],
                vec![Muscle::Triceps],
                false,
                false,
                4,
                1,
                vec![Equipment::Cable],
            ),
        ]
    }

    fn push_input(minutes: u32) -> SelectionInput {
        SelectionInput {
            mode: PlanningMode::Intent,
            intent: SessionIntent::Push,
            target_muscles: vec![],
            pinned_exercise_ids: vec![],
            session_minutes: minutes,
            training_age: TrainingAge::Intermediate,
            goal: Goal::Hypertrophy,
            constraints: SelectionConstraints {
                available_equipment: vec![
                    Equipment::Barbell,
                    Equipment::Dumbbell,
                    Equipment::Cable,
                    Equipment::Machine,
                ],
                days_per_week: 6,
            },
            favorite_exercise_ids: vec![],
            avoided_exercise_ids: vec![],
            pain_sites: vec![],
        }
    }

    fn week3_ctx() -> SelectionContext {
        SelectionContext {
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            week_in_meso: 3,
            meso_length: 4,
            is_deload: false,
            fatigue_overall: 0.7,
        }
    }

    fn recent_use(date: NaiveDate, ids: &[(&str, Muscle, MovementPattern)]) -> WorkoutHistoryEntry {
        WorkoutHistoryEntry {
            date,
            status: WorkoutStatus::Completed,
            intent: SessionIntent::Push,
            exercises: ids
                .iter()
                .map(|(id, muscle, pattern)| PerformedExercise {
                    exercise_id: id.to_string(),
                    pattern: *pattern,
                    primary_muscles: vec![*muscle],
                    sets: vec![PerformedSet {
                        set_index: 0,
                        reps: 10,
                        load: Some(dec!(50)),
                        rpe: Some(dec!(8)),
                        was_skipped: false,
                    }; 3],
                })
                .collect(),
            phase: None,
            week_in_meso: None,
            selection_mode: SelectionMode::Intent,
        }
    }

    #[test]
    fn test_push_mains_cover_horizontal_and_vertical() {
        let library = push_library();
        let history = HistoryIndex::default();
        let result = select_exercises(
            &library,
            &history,
            &push_input(75),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert_eq!(result.main_lift_ids, vec!["bench", "db-ohp"]);
    }

    #[test]
    fn test_push_accessory_ranking_favors_side_delt_deficit() {
        // Chest gets two presses as mains; the side-delt deficit should
        // rank the lateral raise above both chest accessories.
        let library: Vec<Exercise> = push_library()
            .into_iter()
            .filter(|e| e.id != "pushdown")
            .collect();
        let date = NaiveDate::from_ymd_opt(2025, 6, 12).unwrap();
        let history = HistoryIndex::build(
            &[recent_use(
                date,
                &[
                    ("incline-db", Muscle::Chest, MovementPattern::HorizontalPush),
                    ("cable-fly", Muscle::Chest, MovementPattern::Isolation),
                    ("lateral-raise", Muscle::SideDelts, MovementPattern::Isolation),
                ],
            )],
            &HistoryIndexOptions::default(),
        );
        let result = select_exercises(
            &library,
            &history,
            &push_input(80),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        let raise_pos = result
            .accessory_ids
            .iter()
            .position(|id| id == "lateral-raise");
        let fly_pos = result.accessory_ids.iter().position(|id| id == "cable-fly");
        let incline_pos = result
            .accessory_ids
            .iter()
            .position(|id| id == "incline-db");
        assert!(raise_pos.is_some(), "lateral raise must be selected");
        if let (Some(r), Some(f)) = (raise_pos, fly_pos) {
            assert!(r < f, "lateral raise should outrank cable fly");
        }
        if let (Some(f), Some(i)) = (fly_pos, incline_pos) {
            assert!(f < i, "cable fly should outrank incline bench");
        }
    }

    #[test]
    fn test_selected_exercises_stay_in_intent_scope() {
        let mut library = push_library();
        library.push(exercise(
            "squat",
            "Barbell Back Squat",
            vec![MovementPattern::Squat],
            vec![Muscle::Quads],
            true,
            true,
            4,
            5,
            vec![Equipment::Barbell],
        ));
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &push_input(75),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        let scope = intent_scope(SessionIntent::Push, &[]);
        for picked in &result.selected {
            let ex = library.iter().find(|e| e.id == picked.exercise_id).unwrap();
            assert!(ex.primary_muscles.iter().any(|m| scope.contains(m)));
        }
        assert!(result
            .rejected
            .iter()
            .any(|r| r.exercise_id == "squat" && r.reason == FilterFailure::OutOfScope));
    }

    #[test]
    fn test_equipment_filter_rejects_unavailable() {
        let library = push_library();
        let mut input = push_input(75);
        input.constraints.available_equipment = vec![Equipment::Barbell, Equipment::Dumbbell];
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert!(result
            .rejected
            .iter()
            .any(|r| r.exercise_id == "cable-fly"
                && r.reason == FilterFailure::EquipmentUnavailable));
        assert!(!result.accessory_ids.contains(&"cable-fly".to_string()));
    }

    #[test]
    fn test_contraindication_filter() {
        let mut library = push_library();
        library[0].contraindications = vec!["shoulder".into()];
        let mut input = push_input(75);
        input.pain_sites = vec!["shoulder".into()];
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert!(!result.main_lift_ids.contains(&"bench".to_string()));
        assert!(result
            .rejected
            .iter()
            .any(|r| r.exercise_id == "bench" && r.reason == FilterFailure::Contraindicated));
    }

    #[test]
    fn test_timebox_respected() {
        let library = push_library();
        let input = push_input(25);
        let config = EngineConfig::default();
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &config,
        );
        assert!(result.estimated_minutes <= 25.0 * (1.0 + config.time_epsilon));
        // Mains survive even in a tight session.
        assert!(!result.main_lift_ids.is_empty());
    }

    #[test]
    fn test_no_redundant_accessory_pairs() {
        let mut library = push_library();
        // A near-duplicate of cable fly: same pattern, same primary set.
        library.push(exercise(
            "pec-deck",
            "Pec Deck",
            vec![MovementPattern::Isolation],
            vec![Muscle::Chest],
            false,
            false,
            4,
            1,
            vec![Equipment::Machine],
        ));
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &push_input(90),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        let chest_iso: Vec<_> = result
            .accessory_ids
            .iter()
            .filter(|id| *id == "cable-fly" || *id == "pec-deck")
            .collect();
        assert!(chest_iso.len() <= 1, "redundant chest isolation pair selected");
    }

    #[test]
    fn test_set_targets_clamped() {
        let library = push_library();
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &push_input(75),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        for picked in &result.selected {
            assert!(picked.set_target >= 2 && picked.set_target <= 5);
        }
    }

    #[test]
    fn test_template_mode_uses_pins_verbatim() {
        let library = push_library();
        let mut input = push_input(75);
        input.mode = PlanningMode::Template;
        input.pinned_exercise_ids = vec!["bench".into(), "lateral-raise".into()];
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert_eq!(result.main_lift_ids, vec!["bench"]);
        assert_eq!(result.accessory_ids, vec!["lateral-raise"]);
    }

    #[test]
    fn test_low_readiness_prefers_low_fatigue_candidates() {
        let library = push_library();
        let mut ctx = week3_ctx();
        ctx.fatigue_overall = 0.25;
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &push_input(60),
            &ctx,
            &EngineConfig::default(),
        );
        // Under low readiness every chosen accessory is cheap and efficient.
        for id in &result.accessory_ids {
            let ex = library.iter().find(|e| e.id == *id).unwrap();
            assert!(ex.fatigue_cost <= 2, "{} too costly for low readiness", ex.name);
            assert!(ex.sfr >= 4);
        }
    }

    #[test]
    fn test_determinism_identical_inputs() {
        let library = push_library();
        let history = HistoryIndex::default();
        let a = select_exercises(
            &library,
            &history,
            &push_input(75),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        let b = select_exercises(
            &library,
            &history,
            &push_input(75),
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_body_seeds_three_mains_including_lower() {
        let mut library = push_library();
        library.push(exercise(
            "barbell-row",
            "Barbell Row",
            vec![MovementPattern::HorizontalPull],
            vec![Muscle::Back],
            true,
            true,
            4,
            4,
            vec![Equipment::Barbell],
        ));
        library.push(exercise(
            "squat",
            "Barbell Back Squat",
            vec![MovementPattern::Squat],
            vec![Muscle::Quads],
            true,
            true,
            4,
            5,
            vec![Equipment::Barbell],
        ));
        let mut input = push_input(90);
        input.intent = SessionIntent::FullBody;
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &EngineConfig::default(),
        );
        assert_eq!(result.main_lift_ids.len(), 3);
        assert!(result.main_lift_ids.contains(&"squat".to_string()));
        assert!(result.main_lift_ids.contains(&"bench".to_string()));
        assert!(result.main_lift_ids.contains(&"barbell-row".to_string()));
    }

    #[test]
    fn test_body_part_mode_targets_requested_muscles() {
        let mut library = push_library();
        library.push(exercise(
            "cable-curl",
            "Cable Curl",
            vec![MovementPattern::Isolation],
            vec![Muscle::Biceps],
            false,
            false,
            4,
            1,
            vec![Equipment::Cable],
        ));
        let mut input = push_input(45);
        input.mode = PlanningMode::BodyPart;
        input.intent = SessionIntent::BodyPart;
        input.target_muscles = vec![Muscle::Biceps];
        let result = select_exercises(
            &library,
            &HistoryIndex::default(),
            &input,
            &week3_ctx(),
            &EngineConfig::default(),
        );
        for picked in &result.selected {
            let ex = library.iter().find(|e| e.id == picked.exercise_id).unwrap();
            assert!(ex.primary_muscles.contains(&Muscle::Biceps));
        }
        assert!(result
            .selected
            .iter()
            .any(|p| p.exercise_id == "cable-curl"));
    }

    #[test]
    fn test_scope_map_for_upper_and_full_body() {
        let upper = intent_scope(SessionIntent::Upper, &[]);
        assert!(upper.contains(&Muscle::Chest));
        assert!(upper.contains(&Muscle::Back));
        assert!(!upper.contains(&Muscle::Quads));

        let full = intent_scope(SessionIntent::FullBody, &[]);
        assert_eq!(full.len(), Muscle::COUNT);

        let body_part = intent_scope(SessionIntent::BodyPart, &[Muscle::Biceps]);
        assert_eq!(body_part, vec![Muscle::Biceps]);
    }
}
