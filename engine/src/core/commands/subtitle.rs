//! Subtitle Commands Module
//!
//! Implements subtitle editing commands over [`SubtitleModel`]. Each command records the
//! journal of its first execution; undo reverts that journal and redo replays it, so ids
//! allocated during execution are reused on redo.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::journal::{SubtitleOp, UndoJournal};
use crate::core::{
    captions::{ImportOptions, InsertOutcome, SubtitleModel},
    commands::{Command, CommandResult, StateChange},
    CoreError, CoreResult, Frame, GenTime, ItemId,
};

/// Journal and result of a command's first execution
#[derive(Clone, Debug, Default)]
struct Recorded {
    journal: UndoJournal,
    result: Option<CommandResult>,
}

impl Recorded {
    fn store(&mut self, journal: UndoJournal, result: CommandResult) -> CommandResult {
        self.journal = journal;
        self.result = Some(result.clone());
        result
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.journal.revert(model)
    }

    /// Replays the recorded journal. `None` when the command never executed.
    fn replay(&self, model: &mut SubtitleModel) -> Option<CoreResult<CommandResult>> {
        let result = self.result.as_ref()?;
        Some(self.journal.apply(model).map(|()| result.replayed()))
    }
}

// =============================================================================
// AddSubtitleCommand
// =============================================================================

/// Command to add a subtitle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubtitleCommand {
    pub start: GenTime,
    pub end: GenTime,
    pub text: String,
    #[serde(skip)]
    recorded: Recorded,
}

impl AddSubtitleCommand {
    pub fn new(start: GenTime, end: GenTime, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            recorded: Recorded::default(),
        }
    }

    /// Id assigned on execution
    pub fn created_id(&self) -> Option<ItemId> {
        self.recorded
            .result
            .as_ref()
            .and_then(|r| r.created_ids.first().copied())
    }
}

impl Command for AddSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let id = model.allocate_id();
        let mut journal = UndoJournal::new();
        match model.request_subtitle_insertion(id, self.start, self.end, &self.text, &mut journal)? {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate => {
                return Err(CoreError::ValidationError(format!(
                    "An identical subtitle already starts at {}",
                    self.start
                )));
            }
        }

        let result = CommandResult::fresh()
            .with_change(StateChange::SubtitleCreated { subtitle_id: id })
            .with_created_id(id);
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "AddSubtitle"
    }

    fn label(&self) -> String {
        "Add subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({}))
    }
}

// =============================================================================
// DeleteSubtitleCommand
// =============================================================================

/// Command to delete a subtitle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubtitleCommand {
    pub id: ItemId,
    #[serde(skip)]
    recorded: Recorded,
}

impl DeleteSubtitleCommand {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            recorded: Recorded::default(),
        }
    }
}

impl Command for DeleteSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        model.request_subtitle_deletion(self.id, &mut journal)?;

        let result = CommandResult::fresh()
            .with_change(StateChange::SubtitleDeleted {
                subtitle_id: self.id,
            })
            .with_deleted_id(self.id);
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "DeleteSubtitle"
    }

    fn label(&self) -> String {
        "Delete subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id })
    }
}

// =============================================================================
// MoveSubtitleCommand
// =============================================================================

/// Command to move a subtitle to a frame position
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSubtitleCommand {
    pub id: ItemId,
    pub position: Frame,
    #[serde(skip)]
    recorded: Recorded,
}

impl MoveSubtitleCommand {
    pub fn new(id: ItemId, position: Frame) -> Self {
        Self {
            id,
            position,
            recorded: Recorded::default(),
        }
    }
}

impl Command for MoveSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        model.request_subtitle_move(self.id, self.position, &mut journal)?;

        let result = CommandResult::fresh().with_change(StateChange::SubtitleModified {
            subtitle_id: self.id,
        });
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "MoveSubtitle"
    }

    fn label(&self) -> String {
        "Move subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({}))
    }
}

// =============================================================================
// ResizeSubtitleCommand
// =============================================================================

/// Command to resize a subtitle from one of its edges
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeSubtitleCommand {
    pub id: ItemId,
    /// New duration in frames
    pub size: Frame,
    pub from_right: bool,
    #[serde(skip)]
    recorded: Recorded,
}

impl ResizeSubtitleCommand {
    pub fn new(id: ItemId, size: Frame, from_right: bool) -> Self {
        Self {
            id,
            size,
            from_right,
            recorded: Recorded::default(),
        }
    }
}

impl Command for ResizeSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        model.request_resize(self.id, self.size, self.from_right, &mut journal)?;

        let result = CommandResult::fresh().with_change(StateChange::SubtitleModified {
            subtitle_id: self.id,
        });
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "ResizeSubtitle"
    }

    fn label(&self) -> String {
        "Resize subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({}))
    }
}

// =============================================================================
// EditSubtitleCommand
// =============================================================================

/// Command to change the text and end of a subtitle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSubtitleCommand {
    pub id: ItemId,
    pub text: String,
    pub end: GenTime,
    #[serde(skip)]
    recorded: Recorded,
}

impl EditSubtitleCommand {
    pub fn new(id: ItemId, text: impl Into<String>, end: GenTime) -> Self {
        Self {
            id,
            text: text.into(),
            end,
            recorded: Recorded::default(),
        }
    }
}

impl Command for EditSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        model.request_edit(self.id, &self.text, self.end, &mut journal)?;

        let result = CommandResult::fresh().with_change(StateChange::SubtitleModified {
            subtitle_id: self.id,
        });
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "EditSubtitle"
    }

    fn label(&self) -> String {
        "Edit subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({}))
    }
}

// =============================================================================
// CutSubtitleCommand
// =============================================================================

/// Command to split the subtitle under a frame position
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutSubtitleCommand {
    pub position: Frame,
    #[serde(skip)]
    recorded: Recorded,
}

impl CutSubtitleCommand {
    pub fn new(position: Frame) -> Self {
        Self {
            position,
            recorded: Recorded::default(),
        }
    }
}

impl Command for CutSubtitleCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let cut_id = model.subtitle_at(self.position);
        let mut journal = UndoJournal::new();
        let new_id = model.cut_subtitle(self.position, &mut journal)?;

        let mut result = CommandResult::fresh()
            .with_change(StateChange::SubtitleCreated {
                subtitle_id: new_id,
            })
            .with_created_id(new_id);
        if let Some(id) = cut_id {
            result = result.with_change(StateChange::SubtitleModified { subtitle_id: id });
        }
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "CutSubtitle"
    }

    fn label(&self) -> String {
        "Cut subtitle".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "position": self.position })
    }
}

// =============================================================================
// ImportSubtitlesCommand
// =============================================================================

/// Where imported subtitles come from
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImportSource {
    /// A subtitle file; the parser follows the extension
    File {
        path: PathBuf,
        options: ImportOptions,
    },
    /// The interchange JSON form
    Interchange { json: String },
}

/// Command to import subtitles as one undoable edit
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSubtitlesCommand {
    pub source: ImportSource,
    #[serde(skip)]
    recorded: Recorded,
}

impl ImportSubtitlesCommand {
    pub fn from_file(path: impl Into<PathBuf>, options: ImportOptions) -> Self {
        Self {
            source: ImportSource::File {
                path: path.into(),
                options,
            },
            recorded: Recorded::default(),
        }
    }

    pub fn from_interchange(json: impl Into<String>) -> Self {
        Self {
            source: ImportSource::Interchange { json: json.into() },
            recorded: Recorded::default(),
        }
    }
}

impl Command for ImportSubtitlesCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        match &self.source {
            ImportSource::File { path, options } => {
                model.import_file(path, options, &mut journal)?;
            }
            ImportSource::Interchange { json } => {
                model.import_interchange(json, &mut journal)?;
            }
        }

        let mut result = CommandResult::fresh();
        for step in journal.steps() {
            if let SubtitleOp::Add { id, .. } = &step.redo {
                result = result
                    .with_change(StateChange::SubtitleCreated { subtitle_id: *id })
                    .with_created_id(*id);
            }
        }
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "ImportSubtitles"
    }

    fn label(&self) -> String {
        "Import subtitles".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({}))
    }
}

// =============================================================================
// ClearSubtitlesCommand
// =============================================================================

/// Command to remove every subtitle of the track
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClearSubtitlesCommand {
    #[serde(skip)]
    recorded: Recorded,
}

impl ClearSubtitlesCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for ClearSubtitlesCommand {
    fn execute(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        let mut journal = UndoJournal::new();
        model.request_clear(&mut journal)?;

        let mut result = CommandResult::fresh();
        for step in journal.steps() {
            if let SubtitleOp::Remove { id } = &step.redo {
                result = result
                    .with_change(StateChange::SubtitleDeleted { subtitle_id: *id })
                    .with_deleted_id(*id);
            }
        }
        Ok(self.recorded.store(journal, result))
    }

    fn undo(&self, model: &mut SubtitleModel) -> CoreResult<()> {
        self.recorded.undo(model)
    }

    fn redo(&mut self, model: &mut SubtitleModel) -> CoreResult<CommandResult> {
        match self.recorded.replay(model) {
            Some(result) => result,
            None => self.execute(model),
        }
    }

    fn type_name(&self) -> &'static str {
        "ClearSubtitles"
    }

    fn label(&self) -> String {
        "Clear subtitles".to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

// =============================================================================
// Tests
// =============================================================================
