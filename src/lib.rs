// Library interface for the liftrs planning engine
// This allows integration tests and the CLI to access the core functionality

pub mod autoregulation;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod history;
pub mod logging;
pub mod models;
pub mod periodization;
pub mod prescription;
pub mod progression;
pub mod readiness;
pub mod selection;
pub mod stall;
pub mod volume;

// Re-export commonly used types for convenience
pub use autoregulation::{AutoregulationAction, AutoregulationPolicy, ModificationLog};
pub use config::{AppConfig, EngineConfig};
pub use engine::{plan_session, PlanOutcome, PlanRequest};
pub use error::{EngineError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use periodization::{
    derive_block_context, generate_macro_cycle, BlockContext, BlockType, CycleContextSnapshot,
    MacroCycle, MacroParams, PrescriptionModifiers,
};
pub use readiness::{score_readiness, FatigueScore};
pub use selection::{select_exercises, SelectionInput, SelectionResult};
pub use stall::{detect_all_stalls, detect_stall, InterventionLevel, StallReport};
pub use volume::{weekly_target, Muscle, VolumeLandmarks};
