//! Subtrack Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::{Frame, ItemId, TimeSec};
use crate::core::captions::ParseError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Subtitle Errors
    // =========================================================================
    #[error("Subtitle not found: {0}")]
    SubtitleNotFound(ItemId),

    #[error("Invalid time range: {0}~{1} seconds")]
    InvalidTimeRange(TimeSec, TimeSec),

    #[error("A subtitle already starts at {0:.3} seconds")]
    SubtitleConflict(TimeSec),

    #[error("No subtitle starts at {0:.3} seconds")]
    NoSubtitleAt(TimeSec),

    #[error("Subtitle {0} is registered at a start time missing from the store")]
    RegistryDesync(ItemId),

    #[error("No subtitle to cut at frame {0}")]
    NothingToCut(Frame),

    #[error("Invalid resize for subtitle {id}: {reason}")]
    InvalidResize { id: ItemId, reason: String },

    #[error("Subtitle track is locked")]
    TrackLocked,

    // =========================================================================
    // Format Errors
    // =========================================================================
    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    #[error("Subtitle parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No output file attached to the subtitle track")]
    NoOutput,

    // =========================================================================
    // Command Errors
    // =========================================================================
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Command execution failed: {0}")]
    CommandExecutionFailed(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns true for errors caused by the caller's input rather than engine state
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTimeRange(..)
                | CoreError::SubtitleConflict(_)
                | CoreError::SubtitleNotFound(_)
                | CoreError::NoSubtitleAt(_)
                | CoreError::NothingToCut(_)
                | CoreError::InvalidResize { .. }
                | CoreError::TrackLocked
                | CoreError::ValidationError(_)
        )
    }
}
