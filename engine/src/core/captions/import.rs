//! Subtitle File Import
//!
//! Reads a subtitle file, parses it by format and shifts the result onto the timeline.
//! Insertion into the model happens in `SubtitleModel::import_file`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::formats::{parse_subtitles, SubtitleFormat};
use super::ParsedSubtitle;
use crate::core::fs::read_text_file;
use crate::core::{CoreResult, Frame, GenTime, Ratio};

/// Placement applied to every imported entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Timeline offset in frames at the project frame rate
    #[serde(default)]
    pub offset: Frame,
    /// Frame rate the file was timed for; with `target_fps`, rescales times
    #[serde(default)]
    pub source_fps: Option<f64>,
    #[serde(default)]
    pub target_fps: Option<f64>,
}

impl ImportOptions {
    pub fn with_offset(offset: Frame) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Scale factor `source / target`, or `None` when no retiming applies
    fn retime_factor(&self) -> Option<(f64, f64)> {
        match (self.source_fps, self.target_fps) {
            (Some(source), Some(target))
                if source > 0.0 && target > 0.0 && (source - target).abs() > f64::EPSILON =>
            {
                Some((source, target))
            }
            _ => None,
        }
    }

    /// Retimes then offsets parsed entries
    pub fn apply(&self, parsed: Vec<ParsedSubtitle>, fps: Ratio) -> Vec<ParsedSubtitle> {
        let offset = GenTime::from_frames(self.offset, fps);
        let factor = self.retime_factor();
        parsed
            .into_iter()
            .map(|mut sub| {
                if let Some((source, target)) = factor {
                    sub.start = sub.start.scaled(source, target);
                    sub.end = sub.end.scaled(source, target);
                }
                sub.start = sub.start + offset;
                sub.end = sub.end + offset;
                sub
            })
            .collect()
    }
}

/// Reads and parses a subtitle file, choosing the parser by extension
pub fn load_subtitle_file(path: &Path) -> CoreResult<Vec<ParsedSubtitle>> {
    let format = SubtitleFormat::from_path(path)?;
    let content = read_text_file(path)?;
    let parsed = parse_subtitles(&content, format)?;
    info!(
        path = %path.display(),
        format = format.extension(),
        entries = parsed.len(),
        "Parsed subtitle file"
    );
    if parsed.is_empty() {
        debug!(path = %path.display(), "Subtitle file contains no entries");
    }
    Ok(parsed)
}
