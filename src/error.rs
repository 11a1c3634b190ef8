//! Unified error hierarchy for the planning engine
//!
//! Only schema-level input violations are fatal; behavioral edge cases
//! (empty history, infeasible slots, missing readiness) are encoded in
//! result types so planning always yields a well-formed plan plus
//! diagnostics.

use thiserror::Error;

/// Top-level error type for all engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or inconsistent input rejected at the API boundary
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Cycle generation errors
    #[error("Periodization error: {0}")]
    Periodization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors (config and catalog files, CLI layer only)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors at the boundary
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Schema violations in engine inputs
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// An exercise referenced by history or pins is absent from the catalog
    #[error("Exercise not in catalog: {exercise_id}")]
    UnknownExercise { exercise_id: String },

    /// A history set carries an impossible value
    #[error("Malformed history set in {exercise_id}: {reason}")]
    MalformedSet { exercise_id: String, reason: String },

    /// A catalog entry carries an out-of-range score
    #[error("Malformed catalog entry {exercise_id}: {reason}")]
    MalformedExercise { exercise_id: String, reason: String },

    /// Macro duration cannot fit a single mesocycle
    #[error("Macro duration {duration_weeks}w shorter than mesocycle length {meso_length}w")]
    MacroTooShort { duration_weeks: u32, meso_length: u32 },

    /// Session time budget too small to plan anything
    #[error("Session minutes must be positive, got {minutes}")]
    InvalidSessionMinutes { minutes: i64 },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
}

impl EngineError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::InvalidInput(_) => ErrorSeverity::Warning,
            EngineError::Configuration(_) => ErrorSeverity::Warning,
            EngineError::Periodization(_) => ErrorSeverity::Error,
            EngineError::Io(_) | EngineError::Serialization(_) => ErrorSeverity::Error,
            EngineError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Convert to tracing level for structured logging
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            EngineError::InvalidInput(InvalidInputError::UnknownExercise { exercise_id }) => {
                format!(
                    "Your history references '{}', which is not in the exercise catalog.",
                    exercise_id
                )
            }
            EngineError::InvalidInput(InvalidInputError::MacroTooShort {
                duration_weeks,
                meso_length,
            }) => format!(
                "A {}-week cycle cannot fit a {}-week mesocycle. Extend the cycle or pick a shorter template.",
                duration_weeks, meso_length
            ),
            _ => self.to_string(),
        }
    }
}
