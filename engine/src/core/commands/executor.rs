//! Command Executor Module
//!
//! Handles command execution and undo/redo history for the subtitle track.
//! Every undoable change to a [`SubtitleModel`] goes through here.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::core::{
    captions::SubtitleModel,
    commands::{Command, CommandResult},
    CoreError, CoreResult, OpId,
};

/// Default number of undo steps kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

// =============================================================================
// History Entry
// =============================================================================

/// Entry in the undo/redo history
pub struct HistoryEntry {
    /// Operation ID
    pub op_id: OpId,
    /// Label shown in undo menus ("Add subtitle", "Cut subtitle", ...)
    pub label: String,
    /// Command that was executed (wrapped in Mutex for interior mutability)
    pub command: Arc<Mutex<Box<dyn Command>>>,
    /// Result from command execution
    pub result: CommandResult,
    /// Timestamp when command was executed
    pub timestamp: String,
}

impl std::fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("op_id", &self.op_id)
            .field("label", &self.label)
            .field("result", &self.result)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl HistoryEntry {
    fn new(command: Box<dyn Command>, result: CommandResult) -> Self {
        Self {
            op_id: result.op_id.clone(),
            label: command.label(),
            command: Arc::new(Mutex::new(command)),
            result,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// Command Executor
// =============================================================================

/// Executes commands and manages undo/redo history
pub struct CommandExecutor {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_history_size: usize,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: DEFAULT_MAX_HISTORY,
        }
    }

    /// Sets the maximum history size
    pub fn with_max_history(mut self, size: usize) -> Self {
        self.max_history_size = size.max(1);
        self
    }

    /// Executes a command and adds it to history
    pub fn execute(
        &mut self,
        mut command: Box<dyn Command>,
        model: &mut SubtitleModel,
    ) -> CoreResult<CommandResult> {
        let result = command.execute(model)?;
        debug!(
            op_id = %result.op_id,
            command = command.type_name(),
            payload = %command.to_json(),
            "Executed command"
        );

        // A new edit invalidates the redo branch
        self.redo_stack.clear();

        self.undo_stack
            .push_back(HistoryEntry::new(command, result.clone()));
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.pop_front();
        }

        Ok(result)
    }

    /// Undoes the last command.
    ///
    /// If the undo fails the entry stays on the undo stack.
    pub fn undo(&mut self, model: &mut SubtitleModel) -> CoreResult<()> {
        let entry = self.undo_stack.pop_back().ok_or(CoreError::NothingToUndo)?;

        let outcome = entry
            .command
            .lock()
            .map_err(|_| CoreError::Internal("Failed to lock command for undo".into()))
            .and_then(|command| command.undo(model));
        if let Err(e) = outcome {
            self.undo_stack.push_back(entry);
            return Err(e);
        }

        info!(label = %entry.label, "Undo");
        self.redo_stack.push_back(entry);
        Ok(())
    }

    /// Redoes the last undone command
    pub fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let entry = self.redo_stack.pop_back().ok_or(CoreError::NothingToRedo)?;

        let outcome = entry
            .command
            .lock()
            .map_err(|_| CoreError::Internal("Failed to lock command for redo".into()))
            .and_then(|mut command| command.redo(model));
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.redo_stack.push_back(entry);
                return Err(e);
            }
        };

        info!(label = %entry.label, "Redo");
        self.undo_stack.push_back(HistoryEntry {
            op_id: result.op_id.clone(),
            label: entry.label,
            command: entry.command,
            result: result.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        Ok(result)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clears all history (undo and redo)
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Label of the command the next undo reverts
    pub fn last_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Label of the command the next redo replays
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }

    /// Gets the last executed command type name
    pub fn last_command_type(&self) -> Option<String> {
        self.undo_stack
            .back()
            .and_then(|e| e.command.lock().ok().map(|cmd| cmd.type_name().to_string()))
    }

    /// Undo history, oldest first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo_stack.iter()
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
