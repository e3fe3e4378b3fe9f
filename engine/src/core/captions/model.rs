//! Subtitle Model
//!
//! The interval store of a subtitle track: entries keyed by start time, each holding its
//! text and end time. Identity lives in the timeline's [`SubtitleRegistry`]; the store is
//! a secondary index by time.
//!
//! Every mutation keeps three things in step with the store: the registry mapping, the
//! snap points of every registered observer, and the event stream. Structural changes
//! also regenerate the render output when auto export is on.
//!
//! Plain mutations (`add_subtitle`, `move_subtitle`...) apply immediately. The `request_*`
//! family additionally records each step in an [`UndoJournal`] so the caller can undo the
//! whole edit as one unit.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::import::{load_subtitle_file, ImportOptions};
use super::interchange::{parse_interchange, to_json, InterchangeEntry};
use super::output::{SubtitleOutput, WriteOutcome};
use super::{InsertOutcome, SubtitleEntry, SubtitledTime};
use crate::core::commands::{SubtitleOp, UndoJournal};
use crate::core::events::{EventBus, SubtitleEvent, SubtitleRole};
use crate::core::settings::SubtitleSettings;
use crate::core::snaps::{SnapObserver, SnapRegistry};
use crate::core::timeline::SubtitleRegistry;
use crate::core::{CoreError, CoreResult, Frame, GenTime, ItemId, Ratio, Size2D};

const ALL_POSITION_ROLES: [SubtitleRole; 4] = [
    SubtitleRole::StartPos,
    SubtitleRole::EndPos,
    SubtitleRole::StartFrame,
    SubtitleRole::EndFrame,
];

/// Ordered subtitle store of one track
pub struct SubtitleModel {
    subtitles: BTreeMap<GenTime, SubtitleEntry>,
    registry: Arc<dyn SubtitleRegistry>,
    snaps: SnapRegistry,
    fps: Ratio,
    frame_size: Size2D,
    events: EventBus,
    locked: bool,
    output: Option<SubtitleOutput>,
    auto_export: bool,
    batch_depth: usize,
    pending_change: bool,
}

impl std::fmt::Debug for SubtitleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitleModel")
            .field("subtitles", &self.subtitles.len())
            .field("fps", &self.fps)
            .field("locked", &self.locked)
            .field("snaps", &self.snaps)
            .field("output", &self.output.as_ref().map(|o| o.path().to_path_buf()))
            .finish()
    }
}

impl SubtitleModel {
    pub fn new(registry: Arc<dyn SubtitleRegistry>, fps: Ratio) -> Self {
        Self {
            subtitles: BTreeMap::new(),
            registry,
            snaps: SnapRegistry::new(),
            fps,
            frame_size: Size2D::default(),
            events: EventBus::new(),
            locked: false,
            output: None,
            auto_export: true,
            batch_depth: 0,
            pending_change: false,
        }
    }

    /// Builds a model from settings, attaching the configured output when there is one
    pub fn with_settings(registry: Arc<dyn SubtitleRegistry>, settings: &SubtitleSettings) -> Self {
        let mut model = Self::new(registry, settings.frame_rate);
        model.frame_size = settings.frame_size;
        model.auto_export = settings.output.auto_export;
        match SubtitleOutput::from_settings(settings) {
            Ok(output) => model.output = Some(output),
            Err(CoreError::NoOutput) => {}
            Err(e) => warn!(error = %e, "Ignoring subtitle output from settings"),
        }
        model
    }

    pub fn fps(&self) -> Ratio {
        self.fps
    }

    pub fn frame_size(&self) -> Size2D {
        self.frame_size
    }

    pub fn set_auto_export(&mut self, enabled: bool) {
        self.auto_export = enabled;
    }

    /// Attaches a render output, replacing any previous one
    pub fn attach_output(&mut self, output: SubtitleOutput) {
        self.output = Some(output);
    }

    pub fn output(&self) -> Option<&SubtitleOutput> {
        self.output.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubtitleEvent> {
        self.events.subscribe()
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Allocates a fresh id from the registry
    pub fn allocate_id(&self) -> ItemId {
        self.registry.next_id()
    }

    /// Registers a snap observer and pushes the boundaries of every existing entry to it.
    ///
    /// Returns false if the observer is already gone.
    pub fn register_snap(&mut self, observer: Weak<dyn SnapObserver>) -> bool {
        let Some(live) = observer.upgrade() else {
            return false;
        };
        for (start, entry) in &self.subtitles {
            live.add_point(start.frames(self.fps));
            live.add_point(entry.end.frames(self.fps));
        }
        self.snaps.register(observer)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn frame(&self, time: GenTime) -> Frame {
        time.frames(self.fps)
    }

    fn row_of(&self, start: GenTime) -> usize {
        self.subtitles.range(..start).count()
    }

    /// Start of `id`, checked against the store
    fn locate(&self, id: ItemId) -> CoreResult<GenTime> {
        let start = self
            .registry
            .start_for_id(id)
            .ok_or(CoreError::SubtitleNotFound(id))?;
        if !self.subtitles.contains_key(&start) {
            return Err(CoreError::RegistryDesync(id));
        }
        Ok(start)
    }

    fn check_range(start: GenTime, end: GenTime) -> CoreResult<()> {
        if start.is_negative() || end.is_negative() || start > end {
            return Err(CoreError::InvalidTimeRange(start.seconds(), end.seconds()));
        }
        Ok(())
    }

    fn check_unlocked(&self) -> CoreResult<()> {
        if self.locked {
            return Err(CoreError::TrackLocked);
        }
        Ok(())
    }

    fn refresh_view(&self, id: ItemId, start: GenTime, end: GenTime) {
        self.events.emit(SubtitleEvent::ViewRefresh {
            id,
            start_frame: self.frame(start),
            end_frame: self.frame(end),
        });
    }

    /// Signals a persisted change; coalesced while a batch is running
    fn model_changed(&mut self) {
        if self.batch_depth > 0 {
            self.pending_change = true;
            return;
        }
        self.events.emit(SubtitleEvent::ModelChanged);
        if self.auto_export && self.output.is_some() {
            if let Err(e) = self.write_output() {
                warn!(error = %e, "Failed to write subtitle output");
            }
        }
    }

    fn write_output(&self) -> CoreResult<WriteOutcome> {
        let output = self.output.as_ref().ok_or(CoreError::NoOutput)?;
        let was_attached = output.is_attached();
        let outcome = output.write(&self.to_interchange())?;
        let attached = output.is_attached();
        if attached != was_attached {
            self.events
                .emit(SubtitleEvent::AttachmentChanged { attached });
        }
        Ok(outcome)
    }

    /// Runs `f` with change notifications coalesced into one `ModelChanged`
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && std::mem::take(&mut self.pending_change) {
            self.model_changed();
        }
        result
    }

    // =========================================================================
    // Store mutations
    // =========================================================================

    /// Inserts an entry under `id`.
    ///
    /// An entry with the same start and text already present is a duplicate submission
    /// and leaves the model untouched. The same start with different text is rejected.
    pub fn add_subtitle(
        &mut self,
        id: ItemId,
        start: GenTime,
        end: GenTime,
        text: &str,
        temporary: bool,
        update_view: bool,
    ) -> CoreResult<InsertOutcome> {
        Self::check_range(start, end)?;
        if let Some(existing) = self.subtitles.get(&start) {
            if existing.text == text {
                debug!(id, start = %start, "Ignoring duplicate subtitle");
                return Ok(InsertOutcome::Duplicate);
            }
            return Err(CoreError::SubtitleConflict(start.seconds()));
        }
        if self.registry.start_for_id(id).is_some() {
            return Err(CoreError::ValidationError(format!(
                "Subtitle id {} is already registered",
                id
            )));
        }

        let row = self.row_of(start);
        self.subtitles.insert(
            start,
            SubtitleEntry {
                text: text.to_string(),
                end,
            },
        );
        self.registry.register_subtitle(id, start, temporary);
        let (start_frame, end_frame) = (self.frame(start), self.frame(end));
        self.snaps.add_point(start_frame);
        self.snaps.add_point(end_frame);

        self.events.emit(SubtitleEvent::Inserted { id, row });
        if update_view {
            self.refresh_view(id, start, end);
        }
        if !temporary {
            self.model_changed();
        }
        Ok(InsertOutcome::Inserted)
    }

    /// Removes `id` and returns the removed entry
    pub fn remove_subtitle(
        &mut self,
        id: ItemId,
        temporary: bool,
        update_view: bool,
    ) -> CoreResult<SubtitledTime> {
        let start = self.locate(id)?;
        let row = self.row_of(start);
        let entry = self
            .subtitles
            .remove(&start)
            .ok_or(CoreError::RegistryDesync(id))?;
        self.registry.deregister_subtitle(id, temporary);
        let (start_frame, end_frame) = (self.frame(start), self.frame(entry.end));
        self.snaps.remove_point(start_frame);
        self.snaps.remove_point(end_frame);

        self.events.emit(SubtitleEvent::Removed { id, row });
        if update_view {
            self.refresh_view(id, start, entry.end);
        }
        if !temporary {
            self.model_changed();
        }
        Ok(SubtitledTime::new(start, entry.end, entry.text))
    }

    /// Replaces text and end of the entry starting at `start`. Never changes the key.
    pub fn edit_subtitle(&mut self, start: GenTime, text: &str, end: GenTime) -> CoreResult<()> {
        Self::check_range(start, end)?;
        let entry = self
            .subtitles
            .get_mut(&start)
            .ok_or(CoreError::NoSubtitleAt(start.seconds()))?;
        let old_end = std::mem::replace(&mut entry.end, end);
        entry.text = text.to_string();

        if old_end != end {
            let (old_frame, new_frame) = (self.frame(old_end), self.frame(end));
            self.snaps.move_point(old_frame, new_frame);
        }
        if let Some(id) = self.registry.id_for_start(start) {
            self.events.emit(SubtitleEvent::DataChanged {
                id,
                row: self.row_of(start),
                roles: vec![
                    SubtitleRole::Text,
                    SubtitleRole::EndPos,
                    SubtitleRole::EndFrame,
                ],
            });
            self.refresh_view(id, start, old_end.max(end));
        }
        self.model_changed();
        Ok(())
    }

    /// Replaces the text of `id` only. Text edits do not regenerate the output.
    pub fn set_text(&mut self, id: ItemId, text: &str) -> CoreResult<()> {
        let start = self.locate(id)?;
        if let Some(entry) = self.subtitles.get_mut(&start) {
            entry.text = text.to_string();
        }
        self.events.emit(SubtitleEvent::DataChanged {
            id,
            row: self.row_of(start),
            roles: vec![SubtitleRole::Text],
        });
        Ok(())
    }

    /// Moves `id` to `new_start`, keeping its duration
    pub fn move_subtitle(
        &mut self,
        id: ItemId,
        new_start: GenTime,
        update_model: bool,
        update_view: bool,
    ) -> CoreResult<()> {
        if new_start.is_negative() {
            return Err(CoreError::InvalidTimeRange(
                new_start.seconds(),
                new_start.seconds(),
            ));
        }
        let old_start = self.locate(id)?;
        if new_start == old_start {
            return Ok(());
        }
        if self.subtitles.contains_key(&new_start) {
            return Err(CoreError::SubtitleConflict(new_start.seconds()));
        }

        let entry = self
            .subtitles
            .remove(&old_start)
            .ok_or(CoreError::RegistryDesync(id))?;
        let old_end = entry.end;
        let new_end = old_end + (new_start - old_start);
        self.subtitles.insert(
            new_start,
            SubtitleEntry {
                text: entry.text,
                end: new_end,
            },
        );
        let temporary = self.registry.is_temporary(id);
        self.registry.register_subtitle(id, new_start, temporary);
        let (old_start_frame, new_start_frame) = (self.frame(old_start), self.frame(new_start));
        let (old_end_frame, new_end_frame) = (self.frame(old_end), self.frame(new_end));
        self.snaps.move_point(old_start_frame, new_start_frame);
        self.snaps.move_point(old_end_frame, new_end_frame);

        self.events.emit(SubtitleEvent::DataChanged {
            id,
            row: self.row_of(new_start),
            roles: ALL_POSITION_ROLES.to_vec(),
        });
        if update_view {
            self.refresh_view(id, old_start.min(new_start), old_end.max(new_end));
        }
        if update_model {
            self.model_changed();
        }
        Ok(())
    }

    /// Sets both boundaries of `id`. A new start re-keys the entry.
    ///
    /// The end snap point is always swapped, even when unchanged.
    pub fn set_bounds(&mut self, id: ItemId, new_start: GenTime, new_end: GenTime) -> CoreResult<()> {
        Self::check_range(new_start, new_end)?;
        let old_start = self.locate(id)?;
        if new_start != old_start && self.subtitles.contains_key(&new_start) {
            return Err(CoreError::SubtitleConflict(new_start.seconds()));
        }

        let entry = self
            .subtitles
            .remove(&old_start)
            .ok_or(CoreError::RegistryDesync(id))?;
        let old_end = entry.end;
        self.subtitles.insert(
            new_start,
            SubtitleEntry {
                text: entry.text,
                end: new_end,
            },
        );

        let mut roles = Vec::new();
        if new_start != old_start {
            let temporary = self.registry.is_temporary(id);
            self.registry.register_subtitle(id, new_start, temporary);
            let (old_frame, new_frame) = (self.frame(old_start), self.frame(new_start));
            self.snaps.move_point(old_frame, new_frame);
            roles.extend([SubtitleRole::StartPos, SubtitleRole::StartFrame]);
        }
        let (old_end_frame, new_end_frame) = (self.frame(old_end), self.frame(new_end));
        self.snaps.move_point(old_end_frame, new_end_frame);
        if new_end != old_end {
            roles.extend([SubtitleRole::EndPos, SubtitleRole::EndFrame]);
        }

        if !roles.is_empty() {
            self.events.emit(SubtitleEvent::DataChanged {
                id,
                row: self.row_of(new_start),
                roles,
            });
        }
        self.refresh_view(id, old_start.min(new_start), old_end.max(new_end));
        self.model_changed();
        Ok(())
    }

    /// Removes every entry. Returns how many were removed.
    pub fn remove_all_subtitles(&mut self) -> CoreResult<usize> {
        let ids: Vec<ItemId> = self
            .subtitles
            .keys()
            .filter_map(|start| self.registry.id_for_start(*start))
            .collect();
        self.batch(|model| {
            for id in &ids {
                model.remove_subtitle(*id, false, false)?;
            }
            Ok(ids.len())
        })
    }

    // =========================================================================
    // Journaled requests
    // =========================================================================

    fn commit(
        &mut self,
        redo: SubtitleOp,
        undo: SubtitleOp,
        journal: &mut UndoJournal,
    ) -> CoreResult<()> {
        redo.apply(self)?;
        journal.record(redo, undo);
        Ok(())
    }

    /// Inserts an entry and records the insertion. Duplicates record nothing.
    pub fn request_subtitle_insertion(
        &mut self,
        id: ItemId,
        start: GenTime,
        end: GenTime,
        text: &str,
        journal: &mut UndoJournal,
    ) -> CoreResult<InsertOutcome> {
        self.check_unlocked()?;
        let outcome = self.add_subtitle(id, start, end, text, false, true)?;
        if outcome == InsertOutcome::Inserted {
            journal.record(
                SubtitleOp::Add {
                    id,
                    start,
                    end,
                    text: text.to_string(),
                },
                SubtitleOp::Remove { id },
            );
        }
        Ok(outcome)
    }

    pub fn request_subtitle_deletion(
        &mut self,
        id: ItemId,
        journal: &mut UndoJournal,
    ) -> CoreResult<SubtitledTime> {
        self.check_unlocked()?;
        let removed = self.remove_subtitle(id, false, true)?;
        journal.record(
            SubtitleOp::Remove { id },
            SubtitleOp::Add {
                id,
                start: removed.start,
                end: removed.end,
                text: removed.text.clone(),
            },
        );
        Ok(removed)
    }

    /// Moves `id` so that it starts at frame `position`
    pub fn request_subtitle_move(
        &mut self,
        id: ItemId,
        position: Frame,
        journal: &mut UndoJournal,
    ) -> CoreResult<()> {
        self.check_unlocked()?;
        let old_start = self.locate(id)?;
        let new_start = GenTime::from_frames(position, self.fps);
        self.commit(
            SubtitleOp::Move { id, to: new_start },
            SubtitleOp::Move { id, to: old_start },
            journal,
        )
    }

    /// Resizes `id` to `size` frames.
    ///
    /// From the right edge the start stays and the end becomes `start + size`; from the
    /// left edge the end stays and the start becomes `end - size`.
    pub fn request_resize(
        &mut self,
        id: ItemId,
        size: Frame,
        from_right: bool,
        journal: &mut UndoJournal,
    ) -> CoreResult<()> {
        self.check_unlocked()?;
        if size < 0 {
            return Err(CoreError::InvalidResize {
                id,
                reason: format!("negative size {}", size),
            });
        }
        let start = self.locate(id)?;
        let end = self
            .subtitles
            .get(&start)
            .map(|e| e.end)
            .ok_or(CoreError::RegistryDesync(id))?;
        let delta = GenTime::from_frames(size, self.fps);

        let (new_start, new_end) = if from_right {
            (start, start + delta)
        } else {
            let new_start = end - delta;
            if new_start.is_negative() {
                return Err(CoreError::InvalidResize {
                    id,
                    reason: "start would be negative".to_string(),
                });
            }
            (new_start, end)
        };
        if new_start != start && self.subtitles.contains_key(&new_start) {
            return Err(CoreError::InvalidResize {
                id,
                reason: format!("a subtitle already starts at {}", new_start),
            });
        }

        self.commit(
            SubtitleOp::Resize {
                id,
                start: new_start,
                end: new_end,
            },
            SubtitleOp::Resize { id, start, end },
            journal,
        )
    }

    pub fn request_edit(
        &mut self,
        id: ItemId,
        text: &str,
        end: GenTime,
        journal: &mut UndoJournal,
    ) -> CoreResult<()> {
        self.check_unlocked()?;
        let start = self.locate(id)?;
        let (old_text, old_end) = self
            .subtitles
            .get(&start)
            .map(|e| (e.text.clone(), e.end))
            .ok_or(CoreError::RegistryDesync(id))?;
        self.commit(
            SubtitleOp::Edit {
                id,
                text: text.to_string(),
                end,
            },
            SubtitleOp::Edit {
                id,
                text: old_text,
                end: old_end,
            },
            journal,
        )
    }

    /// Splits the entry containing frame `position` into two entries with the same text.
    ///
    /// The original keeps its id and ends at the cut; the second part gets a new id,
    /// which is returned. Requires `start < position < end`.
    pub fn cut_subtitle(&mut self, position: Frame, journal: &mut UndoJournal) -> CoreResult<ItemId> {
        self.check_unlocked()?;
        let at = GenTime::from_frames(position, self.fps);
        let (start, end, text) = self
            .subtitles
            .range(..at)
            .rev()
            .find(|(_, entry)| entry.end > at)
            .map(|(start, entry)| (*start, entry.end, entry.text.clone()))
            .ok_or(CoreError::NothingToCut(position))?;
        if self.subtitles.contains_key(&at) {
            return Err(CoreError::SubtitleConflict(at.seconds()));
        }
        let id = self
            .registry
            .id_for_start(start)
            .ok_or_else(|| CoreError::Internal(format!("No id registered for subtitle at {}", start)))?;
        let new_id = self.allocate_id();

        let mut steps = UndoJournal::new();
        steps.record(
            SubtitleOp::Resize { id, start, end: at },
            SubtitleOp::Resize { id, start, end },
        );
        steps.record(
            SubtitleOp::Add {
                id: new_id,
                start: at,
                end,
                text,
            },
            SubtitleOp::Remove { id: new_id },
        );
        steps.apply(self)?;
        journal.extend(steps);

        info!(id, new_id, position, "Cut subtitle");
        Ok(new_id)
    }

    /// Removes every entry as one journaled edit
    pub fn request_clear(&mut self, journal: &mut UndoJournal) -> CoreResult<usize> {
        self.check_unlocked()?;
        let mut steps = UndoJournal::new();
        for (start, entry) in &self.subtitles {
            if let Some(id) = self.registry.id_for_start(*start) {
                steps.record(
                    SubtitleOp::Remove { id },
                    SubtitleOp::Add {
                        id,
                        start: *start,
                        end: entry.end,
                        text: entry.text.clone(),
                    },
                );
            }
        }
        steps.apply(self)?;
        let removed = steps.len();
        journal.extend(steps);
        Ok(removed)
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Inserts parsed entries under fresh ids.
    ///
    /// Entries with an invalid range or colliding with an existing start are skipped. Any
    /// other failure reverts what was imported so far. Returns the number imported.
    pub fn import_entries(
        &mut self,
        entries: Vec<SubtitledTime>,
        journal: &mut UndoJournal,
    ) -> CoreResult<usize> {
        self.check_unlocked()?;
        let mut steps = UndoJournal::new();
        let result = self.batch(|model| {
            let mut skipped = 0usize;
            for sub in entries {
                let id = model.allocate_id();
                match model.request_subtitle_insertion(id, sub.start, sub.end, &sub.text, &mut steps)
                {
                    Ok(InsertOutcome::Inserted) => {}
                    Ok(InsertOutcome::Duplicate) => skipped += 1,
                    Err(e) if e.is_rejection() => {
                        debug!(start = %sub.start, error = %e, "Skipping imported subtitle");
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(skipped)
        });

        match result {
            Ok(skipped) => {
                let imported = steps.len();
                info!(imported, skipped, "Imported subtitles");
                journal.extend(steps);
                Ok(imported)
            }
            Err(e) => {
                if let Err(revert) = steps.revert(self) {
                    warn!(error = %revert, "Failed to revert partial import");
                }
                Err(e)
            }
        }
    }

    /// Imports a subtitle file (format chosen by extension)
    pub fn import_file(
        &mut self,
        path: &Path,
        options: &ImportOptions,
        journal: &mut UndoJournal,
    ) -> CoreResult<usize> {
        let parsed = match load_subtitle_file(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Subtitle import failed");
                return Err(e);
            }
        };
        let entries = options.apply(parsed, self.fps);
        self.import_entries(entries, journal)
    }

    /// Imports the interchange JSON form
    pub fn import_interchange(&mut self, json: &str, journal: &mut UndoJournal) -> CoreResult<usize> {
        let entries = parse_interchange(json)?
            .iter()
            .map(InterchangeEntry::to_subtitle)
            .collect();
        self.import_entries(entries, journal)
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Entries in store order as interchange records
    pub fn to_interchange(&self) -> Vec<InterchangeEntry> {
        self.subtitles
            .iter()
            .map(|(start, entry)| InterchangeEntry {
                start_pos: start.seconds(),
                dialogue: entry.text.clone(),
                end_pos: entry.end.seconds(),
            })
            .collect()
    }

    pub fn to_json(&self) -> CoreResult<String> {
        to_json(&self.to_interchange())
    }

    /// Writes the attached output now, propagating failures
    pub fn export_now(&self) -> CoreResult<WriteOutcome> {
        self.write_output()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ids of entries that reach `start_frame` and begin no later than `end_frame`
    /// (`None` means no upper bound), in store order.
    pub fn items_in_range(&self, start_frame: Frame, end_frame: Option<Frame>) -> Vec<ItemId> {
        self.subtitles
            .iter()
            .filter(|(start, entry)| {
                let s = self.frame(**start);
                let e = self.frame(entry.end);
                (s >= start_frame || e >= start_frame) && end_frame.map_or(true, |limit| s <= limit)
            })
            .filter_map(|(start, _)| self.registry.id_for_start(*start))
            .collect()
    }

    pub fn id_for_start(&self, start: GenTime) -> Option<ItemId> {
        if !self.subtitles.contains_key(&start) {
            return None;
        }
        self.registry.id_for_start(start)
    }

    pub fn start_for_id(&self, id: ItemId) -> Option<GenTime> {
        self.locate(id).ok()
    }

    /// Ordinal position of `id` in the store
    pub fn row_for_id(&self, id: ItemId) -> Option<usize> {
        self.start_for_id(id).map(|start| self.row_of(start))
    }

    pub fn previous_id(&self, id: ItemId) -> Option<ItemId> {
        let start = self.start_for_id(id)?;
        let (previous, _) = self.subtitles.range(..start).next_back()?;
        self.registry.id_for_start(*previous)
    }

    pub fn next_id(&self, id: ItemId) -> Option<ItemId> {
        let start = self.start_for_id(id)?;
        let (next, _) = self
            .subtitles
            .range((Bound::Excluded(start), Bound::Unbounded))
            .next()?;
        self.registry.id_for_start(*next)
    }

    pub fn get_subtitle(&self, start: GenTime) -> Option<SubtitledTime> {
        self.subtitles
            .get(&start)
            .map(|entry| SubtitledTime::new(start, entry.end, entry.text.clone()))
    }

    pub fn subtitle_by_id(&self, id: ItemId) -> Option<SubtitledTime> {
        self.start_for_id(id).and_then(|start| self.get_subtitle(start))
    }

    /// Id of the entry displayed at frame `position`
    pub fn subtitle_at(&self, position: Frame) -> Option<ItemId> {
        let at = GenTime::from_frames(position, self.fps);
        self.subtitles
            .range(..=at)
            .rev()
            .find(|(_, entry)| entry.end > at)
            .and_then(|(start, _)| self.registry.id_for_start(*start))
    }

    pub fn all_subtitles(&self) -> Vec<SubtitledTime> {
        self.subtitles
            .iter()
            .map(|(start, entry)| SubtitledTime::new(*start, entry.end, entry.text.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subtitles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::{AssHeader, SubtitleStyle};
    use crate::core::snaps::SnapModel;
    use crate::core::timeline::TimelineRegistry;
    use tempfile::TempDir;

    const FPS: Ratio = Ratio { num: 25, den: 1 };

    struct Fixture {
        model: SubtitleModel,
        registry: Arc<TimelineRegistry>,
        snaps: Arc<SnapModel>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(TimelineRegistry::new());
        let mut model = SubtitleModel::new(registry.clone(), FPS);
        let snaps = Arc::new(SnapModel::new());
        let observer: Arc<dyn SnapObserver> = snaps.clone();
        assert!(model.register_snap(Arc::downgrade(&observer)));
        Fixture {
            model,
            registry,
            snaps,
        }
    }

    fn secs(s: f64) -> GenTime {
        GenTime::from_seconds(s)
    }

    fn add(model: &mut SubtitleModel, id: ItemId, start: f64, end: f64, text: &str) {
        let outcome = model
            .add_subtitle(id, secs(start), secs(end), text, false, true)
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
    }

    fn drain(rx: &mut broadcast::Receiver<SubtitleEvent>) -> Vec<SubtitleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn imports_srt_example() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two.srt");
        std::fs::write(
            &path,
            "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n",
        )
        .unwrap();

        let mut f = fixture();
        let mut journal = UndoJournal::new();
        let imported = f
            .model
            .import_file(&path, &ImportOptions::default(), &mut journal)
            .unwrap();
        assert_eq!(imported, 2);

        let subs = f.model.all_subtitles();
        assert_eq!(subs[0].start, secs(1.0));
        assert_eq!(subs[0].end, secs(2.0));
        assert_eq!(subs[0].text, "Hello");
        assert_eq!(subs[1].start, secs(3.0));
        assert_eq!(subs[1].end, secs(4.0));
        assert_eq!(subs[1].text, "World");

        let ids = f.model.items_in_range(0, Some(100));
        assert_eq!(ids.len(), 2);
        assert_eq!(f.snaps.points(), vec![25, 50, 75, 100]);

        // The whole import undoes as one unit
        journal.revert(&mut f.model).unwrap();
        assert!(f.model.is_empty());
        assert!(f.snaps.points().is_empty());
        assert!(f.registry.is_empty());
    }

    #[test]
    fn import_with_offset_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.ass");
        std::fs::write(
            &path,
            "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hi, there\n",
        )
        .unwrap();

        let mut f = fixture();
        let mut journal = UndoJournal::new();
        f.model
            .import_file(&path, &ImportOptions::with_offset(25), &mut journal)
            .unwrap();
        let sub = &f.model.all_subtitles()[0];
        assert_eq!((sub.start, sub.end), (secs(2.0), secs(3.0)));
        assert_eq!(sub.text, "Hi, there");

        let missing = f.model.import_file(
            &dir.path().join("missing.srt"),
            &ImportOptions::default(),
            &mut journal,
        );
        assert!(matches!(missing, Err(CoreError::FileNotFound(_))));
        assert_eq!(f.model.len(), 1);
    }

    #[test]
    fn store_is_ordered_by_start() {
        let mut f = fixture();
        add(&mut f.model, 1, 5.0, 6.0, "c");
        add(&mut f.model, 2, 1.0, 2.0, "a");
        add(&mut f.model, 3, 3.0, 4.0, "b");

        let starts: Vec<GenTime> = f.model.all_subtitles().iter().map(|s| s.start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(f.model.row_for_id(1), Some(2));
        assert_eq!(f.model.previous_id(3), Some(2));
        assert_eq!(f.model.next_id(3), Some(1));
        assert_eq!(f.model.next_id(1), None);
        assert_eq!(f.model.previous_id(2), None);
    }

    #[test]
    fn duplicate_and_conflicting_starts() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "Same");

        let dup = f
            .model
            .add_subtitle(2, secs(1.0), secs(3.0), "Same", false, true)
            .unwrap();
        assert_eq!(dup, InsertOutcome::Duplicate);
        assert_eq!(f.model.len(), 1);
        assert_eq!(f.model.start_for_id(2), None);

        let conflict = f
            .model
            .add_subtitle(3, secs(1.0), secs(3.0), "Other", false, true);
        assert!(matches!(conflict, Err(CoreError::SubtitleConflict(_))));
        assert_eq!(f.model.all_subtitles()[0].text, "Same");
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let mut f = fixture();
        for (start, end) in [(-1.0, 2.0), (1.0, -2.0), (3.0, 2.0)] {
            let result = f
                .model
                .add_subtitle(1, secs(start), secs(end), "x", false, true);
            assert!(matches!(result, Err(CoreError::InvalidTimeRange(..))));
        }
        assert!(f.model.is_empty());
        assert!(f.snaps.points().is_empty());

        // Zero length is allowed
        add(&mut f.model, 1, 2.0, 2.0, "x");
        assert_eq!(f.snaps.count(50), 2);
    }

    #[test]
    fn remove_keeps_registry_and_snaps_in_step() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 2.0, 3.0, "b");
        assert_eq!(f.snaps.count(50), 2);

        let removed = f.model.remove_subtitle(1, false, true).unwrap();
        assert_eq!(removed.text, "a");
        assert_eq!(f.snaps.points(), vec![50, 75]);
        assert_eq!(f.registry.start_for_id(1), None);

        assert!(matches!(
            f.model.remove_subtitle(1, false, true),
            Err(CoreError::SubtitleNotFound(1))
        ));
    }

    #[test]
    fn remove_detects_registry_desync() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        f.registry.register_subtitle(1, secs(9.0), false);
        assert!(matches!(
            f.model.remove_subtitle(1, false, true),
            Err(CoreError::RegistryDesync(1))
        ));
        assert_eq!(f.model.len(), 1);
    }

    #[test]
    fn edit_and_set_text() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        let mut rx = f.model.subscribe();

        f.model.set_text(1, "b").unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![SubtitleEvent::DataChanged {
                id: 1,
                row: 0,
                roles: vec![SubtitleRole::Text]
            }]
        );

        f.model.edit_subtitle(secs(1.0), "c", secs(4.0)).unwrap();
        let sub = f.model.subtitle_by_id(1).unwrap();
        assert_eq!((sub.text.as_str(), sub.end), ("c", secs(4.0)));
        assert_eq!(f.snaps.points(), vec![25, 100]);
        assert!(drain(&mut rx).contains(&SubtitleEvent::ModelChanged));

        assert!(matches!(
            f.model.edit_subtitle(secs(7.0), "x", secs(8.0)),
            Err(CoreError::NoSubtitleAt(_))
        ));
        assert!(matches!(
            f.model.edit_subtitle(secs(1.0), "x", secs(0.5)),
            Err(CoreError::InvalidTimeRange(..))
        ));
    }

    #[test]
    fn move_keeps_duration_and_rejects_collisions() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 5.0, 6.0, "b");

        f.model.move_subtitle(1, secs(3.0), true, true).unwrap();
        let sub = f.model.subtitle_by_id(1).unwrap();
        assert_eq!((sub.start, sub.end), (secs(3.0), secs(4.0)));
        assert_eq!(f.registry.start_for_id(1), Some(secs(3.0)));
        assert_eq!(f.snaps.points(), vec![75, 100, 125, 150]);

        assert!(matches!(
            f.model.move_subtitle(1, secs(5.0), true, true),
            Err(CoreError::SubtitleConflict(_))
        ));
        assert!(matches!(
            f.model.move_subtitle(1, secs(-1.0), true, true),
            Err(CoreError::InvalidTimeRange(..))
        ));
    }

    #[test]
    fn right_resize_with_current_duration_is_noop() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        let before = f.model.all_subtitles();
        let points = f.snaps.points();

        let mut journal = UndoJournal::new();
        f.model.request_resize(1, 25, true, &mut journal).unwrap();

        assert_eq!(f.model.all_subtitles(), before);
        assert_eq!(f.snaps.points(), points);
        assert_eq!(f.snaps.count(50), 1);
    }

    #[test]
    fn resize_undo_redo_symmetry() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 3.0, "a");
        let before = f.model.all_subtitles();
        let points_before = f.snaps.points();

        let mut right = UndoJournal::new();
        f.model.request_resize(1, 10, true, &mut right).unwrap();
        assert_eq!(f.model.subtitle_by_id(1).unwrap().end.frames(FPS), 35);

        let mut left = UndoJournal::new();
        f.model.request_resize(1, 5, false, &mut left).unwrap();
        let resized = f.model.subtitle_by_id(1).unwrap();
        assert_eq!(resized.start.frames(FPS), 30);
        assert_eq!(f.registry.start_for_id(1), Some(resized.start));
        let after = f.model.all_subtitles();
        let points_after = f.snaps.points();
        assert_eq!(points_after, vec![30, 35]);

        left.revert(&mut f.model).unwrap();
        right.revert(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), before);
        assert_eq!(f.snaps.points(), points_before);

        right.apply(&mut f.model).unwrap();
        left.apply(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), after);
        assert_eq!(f.snaps.points(), points_after);
    }

    #[test]
    fn invalid_resizes() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 0.0, 0.5, "b");
        let mut journal = UndoJournal::new();

        assert!(matches!(
            f.model.request_resize(1, -1, true, &mut journal),
            Err(CoreError::InvalidResize { .. })
        ));
        // Start would land before zero
        assert!(matches!(
            f.model.request_resize(1, 75, false, &mut journal),
            Err(CoreError::InvalidResize { .. })
        ));
        // Start would land on entry 2
        assert!(matches!(
            f.model.request_resize(1, 50, false, &mut journal),
            Err(CoreError::InvalidResize { .. })
        ));
        assert!(journal.is_empty());
    }

    #[test]
    fn move_undo_redo_symmetry() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        let before = f.model.all_subtitles();
        let points_before = f.snaps.points();

        let mut journal = UndoJournal::new();
        f.model.request_subtitle_move(1, 100, &mut journal).unwrap();
        let after = f.model.all_subtitles();
        assert_eq!(after[0].start, secs(4.0));
        assert_eq!(after[0].end, secs(5.0));

        journal.revert(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), before);
        assert_eq!(f.snaps.points(), points_before);

        journal.apply(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), after);
    }

    #[test]
    fn cut_splits_entry() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 3.0, "Split me");
        let before = f.model.all_subtitles();

        let mut journal = UndoJournal::new();
        let new_id = f.model.cut_subtitle(50, &mut journal).unwrap();

        let subs = f.model.all_subtitles();
        assert_eq!(subs.len(), 2);
        assert_eq!((subs[0].start, subs[0].end), (secs(1.0), secs(2.0)));
        assert_eq!((subs[1].start, subs[1].end), (secs(2.0), secs(3.0)));
        assert!(subs.iter().all(|s| s.text == "Split me"));
        assert_eq!(
            f.model.subtitle_by_id(1).unwrap().duration(),
            GenTime::from_frames(25, FPS)
        );
        assert_eq!(f.model.start_for_id(new_id), Some(secs(2.0)));
        assert_eq!(f.snaps.count(50), 2);

        journal.revert(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), before);
        assert_eq!(f.snaps.points(), vec![25, 75]);
        assert_eq!(f.model.start_for_id(new_id), None);
    }

    #[test]
    fn cut_outside_any_entry_fails() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 3.0, "a");
        let mut journal = UndoJournal::new();
        for position in [10, 25, 75, 200] {
            assert!(matches!(
                f.model.cut_subtitle(position, &mut journal),
                Err(CoreError::NothingToCut(_))
            ));
        }
        assert_eq!(f.model.len(), 1);
    }

    #[test]
    fn interchange_round_trip() {
        let mut f = fixture();
        add(&mut f.model, 1, 0.04, 1.5, "First");
        add(&mut f.model, 2, 2.0, 3.25, "Second\nline");
        let json = f.model.to_json().unwrap();

        let mut other = fixture();
        let mut journal = UndoJournal::new();
        assert_eq!(other.model.import_interchange(&json, &mut journal).unwrap(), 2);
        assert_eq!(other.model.all_subtitles(), f.model.all_subtitles());
    }

    #[test]
    fn import_skips_colliding_entries() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "Existing");
        let entries = vec![
            SubtitledTime::new(secs(1.0), secs(2.0), "Different"),
            SubtitledTime::new(secs(1.0), secs(2.0), "Existing"),
            SubtitledTime::new(secs(4.0), secs(3.0), "Backwards"),
            SubtitledTime::new(secs(5.0), secs(6.0), "New"),
        ];
        let mut journal = UndoJournal::new();
        assert_eq!(f.model.import_entries(entries, &mut journal).unwrap(), 1);
        assert_eq!(f.model.len(), 2);
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn items_in_range_queries() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 3.0, 4.0, "b");
        add(&mut f.model, 3, 10.0, 11.0, "c");

        assert_eq!(f.model.items_in_range(0, Some(100)), vec![1, 2]);
        assert_eq!(f.model.items_in_range(60, None), vec![2, 3]);
        assert_eq!(f.model.items_in_range(50, Some(50)), vec![1]);
        assert!(f.model.items_in_range(300, None).is_empty());

        assert_eq!(f.model.subtitle_at(30), Some(1));
        assert_eq!(f.model.subtitle_at(50), None);
        assert_eq!(f.model.subtitle_at(80), Some(2));
    }

    #[test]
    fn register_snap_pushes_existing_points() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");

        let late = Arc::new(SnapModel::new());
        let observer: Arc<dyn SnapObserver> = late.clone();
        assert!(f.model.register_snap(Arc::downgrade(&observer)));
        assert_eq!(late.points(), vec![25, 50]);

        drop(observer);
        drop(late);
        add(&mut f.model, 2, 3.0, 4.0, "b");
        assert_eq!(f.snaps.points(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn add_emits_events_in_order() {
        let mut f = fixture();
        let mut rx = f.model.subscribe();
        add(&mut f.model, 7, 1.0, 2.0, "a");
        assert_eq!(
            drain(&mut rx),
            vec![
                SubtitleEvent::Inserted { id: 7, row: 0 },
                SubtitleEvent::ViewRefresh {
                    id: 7,
                    start_frame: 25,
                    end_frame: 50
                },
                SubtitleEvent::ModelChanged,
            ]
        );

        // Temporary entries do not dirty the model
        f.model
            .add_subtitle(8, secs(3.0), secs(4.0), "t", true, false)
            .unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![SubtitleEvent::Inserted { id: 8, row: 1 }]
        );
    }

    #[test]
    fn locked_track_rejects_requests() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        f.model.set_locked(true);
        let mut journal = UndoJournal::new();

        assert!(matches!(
            f.model.request_subtitle_move(1, 100, &mut journal),
            Err(CoreError::TrackLocked)
        ));
        assert!(matches!(
            f.model.cut_subtitle(30, &mut journal),
            Err(CoreError::TrackLocked)
        ));
        assert!(matches!(
            f.model.request_clear(&mut journal),
            Err(CoreError::TrackLocked)
        ));
        assert!(f.model.is_locked());
        assert_eq!(f.model.len(), 1);
    }

    #[test]
    fn clear_and_restore() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 3.0, 4.0, "b");
        let before = f.model.all_subtitles();

        let mut journal = UndoJournal::new();
        assert_eq!(f.model.request_clear(&mut journal).unwrap(), 2);
        assert!(f.model.is_empty());
        assert!(f.snaps.points().is_empty());

        journal.revert(&mut f.model).unwrap();
        assert_eq!(f.model.all_subtitles(), before);
        assert_eq!(f.model.start_for_id(2), Some(secs(3.0)));

        assert_eq!(f.model.remove_all_subtitles().unwrap(), 2);
        assert!(f.model.is_empty());
    }

    #[test]
    fn auto_export_writes_and_detaches() {
        let dir = TempDir::new().unwrap();
        let mut f = fixture();
        let header = AssHeader::from_frame_size(Size2D::default(), &SubtitleStyle::default());
        f.model
            .attach_output(SubtitleOutput::new(dir.path().join("track.srt"), header).unwrap());
        let mut rx = f.model.subscribe();

        add(&mut f.model, 1, 1.0, 2.0, "Hello");
        let written = std::fs::read_to_string(dir.path().join("track.srt")).unwrap();
        assert_eq!(written, "1\n00:00:01,000 --> 00:00:02,000\nHello\n");
        assert!(drain(&mut rx).contains(&SubtitleEvent::AttachmentChanged { attached: true }));

        // Text edits alone do not rewrite the file
        f.model.set_text(1, "Changed").unwrap();
        let unchanged = std::fs::read_to_string(dir.path().join("track.srt")).unwrap();
        assert!(unchanged.contains("Hello"));

        f.model.remove_subtitle(1, false, true).unwrap();
        assert!(drain(&mut rx).contains(&SubtitleEvent::AttachmentChanged { attached: false }));
        assert!(!f.model.output().unwrap().is_attached());
    }

    #[test]
    fn batch_coalesces_model_changes() {
        let mut f = fixture();
        add(&mut f.model, 1, 1.0, 2.0, "a");
        add(&mut f.model, 2, 3.0, 4.0, "b");
        let mut rx = f.model.subscribe();

        f.model.remove_all_subtitles().unwrap();
        let changes = drain(&mut rx)
            .into_iter()
            .filter(|e| *e == SubtitleEvent::ModelChanged)
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn temporary_entry_stays_temporary_when_rekeyed() {
        let mut f = fixture();
        f.model
            .add_subtitle(1, secs(1.0), secs(2.0), "drag", true, false)
            .unwrap();

        f.model.move_subtitle(1, secs(3.0), false, false).unwrap();
        assert!(f.registry.is_temporary(1));
        f.model.set_bounds(1, secs(2.5), secs(4.0)).unwrap();
        assert!(f.registry.is_temporary(1));
        assert_eq!(f.registry.start_for_id(1), Some(secs(2.5)));
        assert_eq!(f.registry.len(), 0);
    }

    #[test]
    fn max_item_id_does_not_overflow_allocator() {
        let mut f = fixture();
        f.model
            .add_subtitle(ItemId::MAX, secs(1.0), secs(2.0), "x", false, false)
            .unwrap();

        let id = f.model.allocate_id();
        assert_eq!(id, ItemId::MAX);
        assert!(matches!(
            f.model.add_subtitle(id, secs(3.0), secs(4.0), "y", false, false),
            Err(CoreError::ValidationError(_))
        ));
        assert_eq!(f.model.len(), 1);
    }

    #[test]
    fn export_now_without_output() {
        let f = fixture();
        assert!(matches!(f.model.export_now(), Err(CoreError::NoOutput)));
    }
}
