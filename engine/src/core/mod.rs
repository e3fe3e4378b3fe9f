//! Subtrack Core Engine
//!
//! Core editing engine for a timeline's subtitle track: the ordered subtitle store,
//! undoable edit commands, subtitle file formats and the render output.

pub mod captions;
pub mod commands;
pub mod events;
pub mod fs;
pub mod settings;
pub mod snaps;
pub mod timeline;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
