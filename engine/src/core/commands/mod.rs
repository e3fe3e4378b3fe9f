//! Edit Command System
//!
//! All undoable subtitle edits are performed through Commands in this module.
//! Commands record an [`UndoJournal`] of typed operations when they execute; the
//! [`CommandExecutor`] keeps them on the undo/redo stacks.

mod executor;
mod journal;
mod subtitle;
mod traits;

pub use executor::*;
pub use journal::*;
pub use subtitle::*;
pub use traits::*;
