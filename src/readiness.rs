//! Readiness and fatigue scoring
//!
//! Combines wearable recovery metrics, subjective check-ins, and
//! performance-derived signals into a single fatigue score in `[0, 1]`
//! (0 = exhausted, 1 = fully fresh) plus per-muscle freshness.
//!
//! # Signal model
//!
//! Three sub-scores, each already normalized to `[0, 1]`:
//!
//! - **Wearable** (Whoop-style): recovery, strain, HRV, and sleep quality.
//! - **Subjective**: 1-5 readiness and motivation scales.
//! - **Performance**: RPE drift against targets, stall count, and volume
//!   compliance over recent sessions.
//!
//! Sub-score weights depend on which signals are present: wearable data,
//! when available, carries half the weight; otherwise the subjective
//! check-in dominates. Per-muscle soreness folds in as a 20% adjustment
//! through the worst reported muscle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{ReadinessSignal, SubjectiveReadiness, WhoopMetrics};
use crate::volume::Muscle;

/// Whether readiness data was available for a planning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAvailability {
    Present,
    Missing,
}

/// Sub-score weights actually used for a given signal mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub whoop: f64,
    pub subjective: f64,
    pub performance: f64,
}

/// Individual sub-score contributions, preserved for explanation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalComponents {
    pub whoop: Option<f64>,
    pub subjective: Option<f64>,
    pub performance: Option<f64>,
    /// Freshness of the worst reported muscle (1.0 when none reported).
    pub worst_muscle: f64,
}

/// Combined fatigue assessment for one planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueScore {
    /// Overall readiness in `[0, 1]`; 0 means exhausted.
    pub overall: f64,
    /// Per-muscle freshness in `[0, 1]` for muscles with reported soreness.
    pub per_muscle: BTreeMap<Muscle, f64>,
    pub weights: SignalWeights,
    pub components: SignalComponents,
    pub availability: SignalAvailability,
    /// Hours between the signal timestamp and the planning call.
    pub signal_age_hours: f64,
}

impl FatigueScore {
    /// Neutral score used when no readiness data exists. Sits inside the
    /// autoregulator's maintain band so absent data never mutates a plan.
    pub fn default_moderate() -> Self {
        FatigueScore {
            overall: 0.65,
            per_muscle: BTreeMap::new(),
            weights: SignalWeights {
                whoop: 0.0,
                subjective: 0.0,
                performance: 0.0,
            },
            components: SignalComponents {
                whoop: None,
                subjective: None,
                performance: None,
                worst_muscle: 1.0,
            },
            availability: SignalAvailability::Missing,
            signal_age_hours: 0.0,
        }
    }

    /// Freshness of a specific muscle; unreported muscles count as fresh.
    pub fn muscle_freshness(&self, muscle: Muscle) -> f64 {
        self.per_muscle.get(&muscle).copied().unwrap_or(1.0)
    }

    /// Human-readable one-line summary.
    pub fn rationale(&self) -> String {
        let band = if self.overall < 0.3 {
            "severely fatigued"
        } else if self.overall < 0.5 {
            "under-recovered"
        } else if self.overall > 0.85 {
            "very fresh"
        } else {
            "moderately recovered"
        };
        match self.availability {
            SignalAvailability::Missing => {
                "no readiness data; assuming moderate recovery".to_string()
            }
            SignalAvailability::Present => format!(
                "{} (score {:.2}; worst muscle freshness {:.2})",
                band, self.overall, self.components.worst_muscle
            ),
        }
    }
}

fn whoop_score(whoop: &WhoopMetrics) -> f64 {
    let strain_penalty = if whoop.strain > 18.0 { 0.2 } else { 0.0 };
    (whoop.recovery / 100.0) * 0.4
        + (1.0 - strain_penalty) * 0.2
        + (whoop.hrv / 50.0).min(1.0) * 0.2
        + (whoop.sleep_quality / 100.0) * 0.2
}

fn subjective_score(subjective: &SubjectiveReadiness) -> f64 {
    let readiness = f64::from(subjective.readiness.clamp(1, 5) - 1) / 4.0;
    let motivation = f64::from(subjective.motivation.clamp(1, 5) - 1) / 4.0;
    readiness * 0.6 + motivation * 0.4
}

fn performance_score(perf: &crate::models::PerformanceSignals) -> f64 {
    let rpe_score = (0.5 - perf.rpe_deviation / 4.0).clamp(0.0, 1.0);
    let stall_penalty = (f64::from(perf.stall_count) * 0.1).min(0.3);
    rpe_score * 0.5 + (1.0 - stall_penalty) * 0.3 + perf.volume_compliance_rate.clamp(0.0, 1.0) * 0.2
}

/// Per-muscle freshness from the 1-3 soreness scale: 1 maps to fully fresh,
/// 3 to fully fatigued.
fn muscle_freshness_from_soreness(level: u8) -> f64 {
    1.0 - f64::from(level.clamp(1, 3) - 1) / 2.0
}

/// Score a readiness signal. `None` yields [`FatigueScore::default_moderate`].
pub fn score_readiness(signal: Option<&ReadinessSignal>, now: DateTime<Utc>) -> FatigueScore {
    let Some(signal) = signal else {
        debug!("no readiness signal; using default-moderate fatigue score");
        return FatigueScore::default_moderate();
    };

    let whoop = signal.whoop.as_ref().map(whoop_score);
    let subjective = signal.subjective.as_ref().map(subjective_score);
    let performance = signal.performance.as_ref().map(performance_score);

    let weights = if whoop.is_some() {
        SignalWeights {
            whoop: 0.5,
            subjective: 0.3,
            performance: 0.2,
        }
    } else {
        SignalWeights {
            whoop: 0.0,
            subjective: 0.6,
            performance: 0.4,
        }
    };

    // A missing sub-signal contributes a neutral 0.5 at its weight rather
    // than redistributing weight onto the remaining signals.
    let base = weights.whoop * whoop.unwrap_or(0.5)
        + weights.subjective * subjective.unwrap_or(0.5)
        + weights.performance * performance.unwrap_or(0.5);

    let mut per_muscle = BTreeMap::new();
    if let Some(subjective_signal) = &signal.subjective {
        for (muscle, level) in &subjective_signal.soreness {
            per_muscle.insert(*muscle, muscle_freshness_from_soreness(*level));
        }
    }
    let worst_muscle = per_muscle.values().copied().fold(1.0_f64, f64::min);

    let overall = (base * 0.8 + worst_muscle * 0.2).clamp(0.0, 1.0);

    let signal_age_hours = (now - signal.timestamp).num_minutes() as f64 / 60.0;

    FatigueScore {
        overall,
        per_muscle,
        weights,
        components: SignalComponents {
            whoop,
            subjective,
            performance,
            worst_muscle,
        },
        availability: SignalAvailability::Present,
        signal_age_hours: signal_age_hours.max(0.0),
    }
}
