//! Volume landmarks and muscle taxonomy
//!
//! This module provides the static per-muscle volume landmark table and the
//! weekly set-target ramp used by exercise selection and volume diagnostics.
//!
//! # Sports Science Background
//!
//! Weekly training volume per muscle is bounded by four landmarks, all in
//! working sets per week:
//!
//! - **MV (Maintenance Volume)**: the volume needed to keep current size.
//! - **MEV (Minimum Effective Volume)**: the least volume that produces
//!   measurable adaptation; accumulation blocks start here.
//! - **MAV (Maximum Adaptive Volume)**: the most volume that still produces
//!   productive adaptation; accumulation blocks end here.
//! - **MRV (Maximum Recoverable Volume)**: the ceiling beyond which recovery
//!   fails; the planner never prescribes past it.
//!
//! Landmarks satisfy `mv <= mev <= mav <= mrv` (zeros are permitted for
//! minor muscles that are covered incidentally by compound work).
//!
//! `sra_hours` is the expected Stimulus-Recovery-Adaptation cycle length for
//! the muscle, used to reason about training frequency.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The 18 canonical muscles tracked by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Muscle {
    Chest,
    Back,
    UpperBack,
    FrontDelts,
    SideDelts,
    RearDelts,
    Quads,
    Hamstrings,
    Glutes,
    Biceps,
    Triceps,
    Calves,
    Core,
    LowerBack,
    Forearms,
    Adductors,
    HipFlexors,
    Abductors,
}

/// Broad training split a muscle belongs to.
///
/// Upper = push + pull; lower = legs; full-body spans all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Push,
    Pull,
    Legs,
}

/// Per-muscle weekly volume landmarks, in working sets per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeLandmarks {
    pub mv: u32,
    pub mev: u32,
    pub mav: u32,
    pub mrv: u32,
    /// Stimulus-Recovery-Adaptation cycle length in hours.
    pub sra_hours: u32,
}

impl Muscle {
    pub const COUNT: usize = 18;

    /// All muscles in canonical order. The order is stable and doubles as the
    /// arena index used by selection and volume accounting.
    pub const ALL: [Muscle; Self::COUNT] = [
        Muscle::Chest,
        Muscle::Back,
        Muscle::UpperBack,
        Muscle::FrontDelts,
        Muscle::SideDelts,
        Muscle::RearDelts,
        Muscle::Quads,
        Muscle::Hamstrings,
        Muscle::Glutes,
        Muscle::Biceps,
        Muscle::Triceps,
        Muscle::Calves,
        Muscle::Core,
        Muscle::LowerBack,
        Muscle::Forearms,
        Muscle::Adductors,
        Muscle::HipFlexors,
        Muscle::Abductors,
    ];

    /// Stable arena index in `[0, COUNT)`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Volume landmark row for this muscle.
    ///
    /// Values are the canonical table; invariant `mv <= mev <= mav <= mrv`
    /// holds for every row.
    pub fn landmarks(self) -> VolumeLandmarks {
        let (mv, mev, mav, mrv, sra_hours) = match self {
            Muscle::Chest => (6, 10, 16, 22, 60),
            Muscle::Back => (6, 10, 18, 25, 60),
            Muscle::UpperBack => (6, 10, 18, 25, 48),
            Muscle::FrontDelts => (0, 0, 7, 12, 48),
            Muscle::SideDelts => (6, 8, 19, 26, 36),
            Muscle::RearDelts => (6, 8, 19, 26, 36),
            Muscle::Quads => (6, 8, 15, 20, 72),
            Muscle::Hamstrings => (6, 6, 13, 20, 72),
            Muscle::Glutes => (0, 0, 8, 16, 72),
            Muscle::Biceps => (6, 8, 17, 26, 36),
            Muscle::Triceps => (4, 6, 12, 18, 36),
            Muscle::Calves => (6, 8, 14, 20, 36),
            Muscle::Core => (0, 0, 12, 20, 36),
            Muscle::LowerBack => (0, 0, 4, 10, 72),
            Muscle::Forearms => (0, 0, 6, 12, 36),
            Muscle::Adductors => (0, 0, 8, 14, 48),
            Muscle::HipFlexors => (0, 0, 4, 8, 36),
            Muscle::Abductors => (0, 0, 6, 12, 48),
        };
        VolumeLandmarks {
            mv,
            mev,
            mav,
            mrv,
            sra_hours,
        }
    }

    /// Which third of a push/pull/legs split trains this muscle.
    ///
    /// The map partitions all 18 muscles: core work rides with leg sessions,
    /// lower back with pull sessions (hinge day).
    pub fn split(self) -> Split {
        match self {
            Muscle::Chest | Muscle::FrontDelts | Muscle::SideDelts | Muscle::Triceps => Split::Push,
            Muscle::Back
            | Muscle::UpperBack
            | Muscle::RearDelts
            | Muscle::Biceps
            | Muscle::Forearms
            | Muscle::LowerBack => Split::Pull,
            Muscle::Quads
            | Muscle::Hamstrings
            | Muscle::Glutes
            | Muscle::Calves
            | Muscle::Core
            | Muscle::Adductors
            | Muscle::HipFlexors
            | Muscle::Abductors => Split::Legs,
        }
    }

    /// All muscles belonging to the given split.
    pub fn in_split(split: Split) -> impl Iterator<Item = Muscle> {
        Muscle::ALL.into_iter().filter(move |m| m.split() == split)
    }
}

impl fmt::Display for Muscle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Muscle::Chest => "Chest",
            Muscle::Back => "Back",
            Muscle::UpperBack => "Upper Back",
            Muscle::FrontDelts => "Front Delts",
            Muscle::SideDelts => "Side Delts",
            Muscle::RearDelts => "Rear Delts",
            Muscle::Quads => "Quads",
            Muscle::Hamstrings => "Hamstrings",
            Muscle::Glutes => "Glutes",
            Muscle::Biceps => "Biceps",
            Muscle::Triceps => "Triceps",
            Muscle::Calves => "Calves",
            Muscle::Core => "Core",
            Muscle::LowerBack => "Lower Back",
            Muscle::Forearms => "Forearms",
            Muscle::Adductors => "Adductors",
            Muscle::HipFlexors => "Hip Flexors",
            Muscle::Abductors => "Abductors",
        };
        write!(f, "{}", name)
    }
}

/// Weekly set target for a muscle at a given week within its mesocycle.
///
/// # Algorithm
///
/// - Deload week: return MV.
/// - Otherwise the accumulation ramp runs over `meso_length - 1` weeks,
///   interpolating linearly from MEV (week 1) to MAV (last accumulation
///   week). Progress is clamped to `[0, 1]` so weeks past the ramp hold MAV.
///
/// The resulting sequence across accumulation weeks is nondecreasing.
pub fn weekly_target(muscle: Muscle, week_in_meso: u32, meso_length: u32, is_deload: bool) -> u32 {
    let lm = muscle.landmarks();
    if is_deload {
        return lm.mv;
    }

    let accum_weeks = meso_length.saturating_sub(1).max(1);
    let denom = accum_weeks.saturating_sub(1).max(1) as f64;
    let progress = ((week_in_meso.saturating_sub(1)) as f64 / denom).clamp(0.0, 1.0);

    let mev = lm.mev as f64;
    let mav = lm.mav as f64;
    (mev + progress * (mav - mev)).round() as u32
}

/// How many sessions per week train a given split's muscles, derived from
/// the split style and training days available.
///
/// Push/pull/legs rotations hit each muscle roughly every third day,
/// upper/lower every second day, full-body every session. Floor 1, cap 3.
pub fn sessions_per_week_for_split(days_per_week: u32, sessions_per_rotation: u32) -> u32 {
    (days_per_week / sessions_per_rotation.max(1)).clamp(1, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_invariant_all_muscles() {
        for muscle in Muscle::ALL {
            let lm = muscle.landmarks();
            assert!(lm.mv <= lm.mev, "{muscle}: mv > mev");
            assert!(lm.mev <= lm.mav, "{muscle}: mev > mav");
            assert!(lm.mav <= lm.mrv, "{muscle}: mav > mrv");
            assert!(lm.sra_hours > 0);
        }
    }

    #[test]
    fn test_split_map_partitions_all_muscles() {
        let push = Muscle::in_split(Split::Push).count();
        let pull = Muscle::in_split(Split::Pull).count();
        let legs = Muscle::in_split(Split::Legs).count();
        assert_eq!(push + pull + legs, Muscle::COUNT);
    }

    #[test]
    fn test_weekly_target_ramp_endpoints() {
        // 4-week meso: 3 accumulation weeks + deload.
        let lm = Muscle::Chest.landmarks();
        assert_eq!(weekly_target(Muscle::Chest, 1, 4, false), lm.mev);
        assert_eq!(weekly_target(Muscle::Chest, 3, 4, false), lm.mav);
    }

    #[test]
    fn test_weekly_target_ramp_nondecreasing() {
        for muscle in Muscle::ALL {
            for meso_length in 4..=6u32 {
                let mut prev = 0;
                for week in 1..meso_length {
                    let target = weekly_target(muscle, week, meso_length, false);
                    assert!(
                        target >= prev,
                        "{muscle} target decreased at week {week} of {meso_length}"
                    );
                    prev = target;
                }
            }
        }
    }

    #[test]
    fn test_weekly_target_deload_returns_mv() {
        for muscle in Muscle::ALL {
            assert_eq!(
                weekly_target(muscle, 4, 4, true),
                muscle.landmarks().mv,
                "{muscle}"
            );
        }
    }

    #[test]
    fn test_weekly_target_midpoint_interpolates() {
        // 5-week meso: 4 accumulation weeks, midpoint lands between MEV and MAV.
        let target = weekly_target(Muscle::Back, 2, 5, false);
        let lm = Muscle::Back.landmarks();
        assert!(target > lm.mev && target < lm.mav);
    }

    #[test]
    fn test_muscle_index_is_stable() {
        for (i, muscle) in Muscle::ALL.into_iter().enumerate() {
            assert_eq!(muscle.index(), i);
        }
    }

    #[test]
    fn test_muscle_serde_vocabulary() {
        let json = serde_json::to_string(&Muscle::SideDelts).unwrap();
        assert_eq!(json, "\"side_delts\"");
        let back: Muscle = serde_json::from_str("\"upper_back\"").unwrap();
        assert_eq!(back, Muscle::UpperBack);
    }

    #[test]
    fn test_sessions_per_week_bounds() {
        assert_eq!(sessions_per_week_for_split(6, 3), 2);
        assert_eq!(sessions_per_week_for_split(4, 2), 2);
        assert_eq!(sessions_per_week_for_split(2, 3), 1);
        assert_eq!(sessions_per_week_for_split(7, 1), 3);
    }
}
