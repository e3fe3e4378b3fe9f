//! Interchange Form
//!
//! The JSON array of `{startPos, dialogue, endPos}` objects the model exports, in store
//! order. On-disk formats are always generated from this form, never from the store.

use serde::{Deserialize, Serialize};

use super::ass::{export_ass, AssHeader};
use super::formats::{export_sbv, export_srt, export_vtt, SubtitleFormat};
use super::SubtitledTime;
use crate::core::{CoreResult, GenTime, TimeSec};

/// One exported subtitle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterchangeEntry {
    /// Start in seconds
    pub start_pos: TimeSec,
    pub dialogue: String,
    /// End in seconds
    pub end_pos: TimeSec,
}

impl InterchangeEntry {
    pub fn new(start_pos: TimeSec, dialogue: &str, end_pos: TimeSec) -> Self {
        Self {
            start_pos,
            dialogue: dialogue.to_string(),
            end_pos,
        }
    }

    pub fn to_subtitle(&self) -> SubtitledTime {
        SubtitledTime::new(
            GenTime::from_seconds(self.start_pos),
            GenTime::from_seconds(self.end_pos),
            self.dialogue.clone(),
        )
    }
}

impl From<&SubtitledTime> for InterchangeEntry {
    fn from(sub: &SubtitledTime) -> Self {
        Self {
            start_pos: sub.start.seconds(),
            dialogue: sub.text.clone(),
            end_pos: sub.end.seconds(),
        }
    }
}

/// Serializes entries as the interchange JSON array
pub fn to_json(entries: &[InterchangeEntry]) -> CoreResult<String> {
    Ok(serde_json::to_string(entries)?)
}

pub fn parse_interchange(json: &str) -> CoreResult<Vec<InterchangeEntry>> {
    Ok(serde_json::from_str(json)?)
}

/// Generates file content for `format`. Returns `None` when there is nothing to write.
pub fn render(
    entries: &[InterchangeEntry],
    format: SubtitleFormat,
    header: &AssHeader,
) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let content = match format {
        SubtitleFormat::Srt => export_srt(entries),
        SubtitleFormat::Ass => export_ass(entries, header),
        SubtitleFormat::Vtt => export_vtt(entries),
        SubtitleFormat::Sbv => export_sbv(entries),
    };
    Some(content)
}
