//! Undo Journal
//!
//! A journal is an ordered list of reversible subtitle steps. Each step stores its
//! forward operation and the operation that reverses it, both captured by value when the
//! step is recorded, so a journal stays valid whatever happens to the model afterwards.
//!
//! Composite edits (cut = resize + insert, import = many inserts) chain the journals of
//! their parts with [`UndoJournal::extend`] and are undone as one unit.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::captions::{InsertOutcome, SubtitleModel};
use crate::core::{CoreError, CoreResult, GenTime, ItemId};

/// A single typed subtitle mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SubtitleOp {
    /// Insert an entry under a known id
    Add {
        id: ItemId,
        start: GenTime,
        end: GenTime,
        text: String,
    },
    Remove {
        id: ItemId,
    },
    /// Move keeping the duration
    Move {
        id: ItemId,
        to: GenTime,
    },
    /// Set both boundaries (re-keys the entry when `start` changes)
    Resize {
        id: ItemId,
        start: GenTime,
        end: GenTime,
    },
    Edit {
        id: ItemId,
        text: String,
        end: GenTime,
    },
    SetText {
        id: ItemId,
        text: String,
    },
}

impl SubtitleOp {
    /// Applies the operation to `model`
    pub fn apply(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        match self {
            SubtitleOp::Add {
                id,
                start,
                end,
                text,
            } => match model.add_subtitle(*id, *start, *end, text, false, true)? {
                InsertOutcome::Inserted => Ok(()),
                // The journal only records real insertions; a duplicate here means the
                // model no longer matches the recorded history.
                InsertOutcome::Duplicate => Err(CoreError::SubtitleConflict(start.seconds())),
            },
            SubtitleOp::Remove { id } => model.remove_subtitle(*id, false, true).map(|_| ()),
            SubtitleOp::Move { id, to } => model.move_subtitle(*id, *to, true, true),
            SubtitleOp::Resize { id, start, end } => model.set_bounds(*id, *start, *end),
            SubtitleOp::Edit { id, text, end } => {
                let start = model
                    .start_for_id(*id)
                    .ok_or(CoreError::SubtitleNotFound(*id))?;
                model.edit_subtitle(start, text, *end)
            }
            SubtitleOp::SetText { id, text } => model.set_text(*id, text),
        }
    }
}

/// One reversible step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalStep {
    pub redo: SubtitleOp,
    pub undo: SubtitleOp,
}

/// Ordered list of reversible steps
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoJournal {
    steps: Vec<JournalStep>,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a step that has already been applied
    pub fn record(&mut self, redo: SubtitleOp, undo: SubtitleOp) {
        self.steps.push(JournalStep { redo, undo });
    }

    /// Appends every step of `other`, after the steps already recorded
    pub fn extend(&mut self, other: UndoJournal) {
        self.steps.extend(other.steps);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[JournalStep] {
        &self.steps
    }

    /// Replays the forward operations in order.
    ///
    /// If a step fails, the steps already applied are reverted and the error is returned.
    pub fn apply(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        let redo: Vec<&SubtitleOp> = self.steps.iter().map(|s| &s.redo).collect();
        let undo: Vec<&SubtitleOp> = self.steps.iter().map(|s| &s.undo).collect();
        model.batch(|m| run_with_rollback(m, &redo, &undo))
    }

    /// Runs the reverse operations, last step first, with the same rollback guarantee
    pub fn revert(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        let undo: Vec<&SubtitleOp> = self.steps.iter().rev().map(|s| &s.undo).collect();
        let redo: Vec<&SubtitleOp> = self.steps.iter().rev().map(|s| &s.redo).collect();
        model.batch(|m| run_with_rollback(m, &undo, &redo))
    }
}

/// Applies `forward[i]` in order; on failure at `i`, applies `backward[..i]` in reverse
fn run_with_rollback(
    model: &mut SubtitleModel,
    forward: &[&SubtitleOp],
    backward: &[&SubtitleOp],
) -> CoreResult<()> {
    for (index, op) in forward.iter().enumerate() {
        if let Err(e) = op.apply(model) {
            debug!(step = index, error = %e, "Journal step failed, rolling back");
            for done in backward[..index].iter().rev() {
                if let Err(rollback) = done.apply(model) {
                    warn!(error = %rollback, "Rollback step failed");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}
