//! Command Trait Definition
//!
//! Defines the trait that all subtitle edit commands must implement.

use serde::{Deserialize, Serialize};

use crate::core::{captions::SubtitleModel, CoreResult, ItemId, OpId};

/// Command execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Generated Operation ID
    pub op_id: OpId,

    /// List of state changes
    pub changes: Vec<StateChange>,

    /// Newly created subtitle ids
    pub created_ids: Vec<ItemId>,

    /// Deleted subtitle ids
    pub deleted_ids: Vec<ItemId>,
}

impl CommandResult {
    /// Creates a new empty command result with the given operation ID
    pub fn new(op_id: &str) -> Self {
        Self {
            op_id: op_id.to_string(),
            changes: vec![],
            created_ids: vec![],
            deleted_ids: vec![],
        }
    }

    /// Creates an empty result with a fresh operation ID
    pub fn fresh() -> Self {
        Self::new(&ulid::Ulid::new().to_string())
    }

    /// Adds a state change
    pub fn with_change(mut self, change: StateChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Adds a created ID
    pub fn with_created_id(mut self, id: ItemId) -> Self {
        self.created_ids.push(id);
        self
    }

    /// Adds a deleted ID
    pub fn with_deleted_id(mut self, id: ItemId) -> Self {
        self.deleted_ids.push(id);
        self
    }

    /// Same changes under a new operation ID (used when a command is redone)
    pub fn replayed(&self) -> Self {
        Self {
            op_id: ulid::Ulid::new().to_string(),
            ..self.clone()
        }
    }
}

/// State change types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StateChange {
    #[serde(rename_all = "camelCase")]
    SubtitleCreated { subtitle_id: ItemId },
    #[serde(rename_all = "camelCase")]
    SubtitleModified { subtitle_id: ItemId },
    #[serde(rename_all = "camelCase")]
    SubtitleDeleted { subtitle_id: ItemId },
}

/// Trait that all edit commands must implement
///
/// # Core Principles
/// - All undoable subtitle changes go through Commands.
/// - A failed `execute` leaves the model unchanged.
/// - Commands are serializable for logging and debugging.
///
/// # Example
/// ```rust,ignore
/// pub struct ShiftSubtitleCommand {
///     pub id: ItemId,
///     pub frames: Frame,
///     journal: UndoJournal,
/// }
///
/// impl Command for ShiftSubtitleCommand {
///     fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
///         // Record the move in self.journal
///     }
///
///     fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
///         self.journal.revert(model)
///     }
///
///     fn type_name(&self) -> &'static str {
///         "ShiftSubtitle"
///     }
///
///     fn to_json(&self) -> serde_json::Value {
///         serde_json::json!({ "id": self.id, "frames": self.frames })
///     }
/// }
/// ```
pub trait Command: Send + Sync {
    /// Execute the command
    ///
    /// Modifies the model and returns the result.
    /// On failure, the model must remain unchanged.
    /// Uses &mut self to allow storing undo state during execution.
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult>;

    /// Undo the command
    ///
    /// Inverse operation of execute.
    /// Only called after execute succeeds.
    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()>;

    /// Redo the command
    ///
    /// Default implementation is identical to execute.
    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        self.execute(model)
    }

    /// Command type name
    ///
    /// Used for logging and debugging.
    fn type_name(&self) -> &'static str;

    /// Human-readable label shown in undo history
    fn label(&self) -> String {
        self.type_name().to_string()
    }

    /// JSON serialization
    fn to_json(&self) -> serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_change_serialization() {
        let change = StateChange::SubtitleCreated { subtitle_id: 4 };
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("subtitleCreated"));
        assert!(json.contains("\"subtitleId\":4"));
    }

    #[test]
    fn test_command_result_builder() {
        let result = CommandResult::new("op_001")
            .with_change(StateChange::SubtitleCreated { subtitle_id: 1 })
            .with_created_id(1);

        assert_eq!(result.op_id, "op_001");
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.created_ids, vec![1]);

        let replayed = result.replayed();
        assert_ne!(replayed.op_id, result.op_id);
        assert_eq!(replayed.created_ids, vec![1]);
    }
}
