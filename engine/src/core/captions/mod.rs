//! Subtitle Track Module
//!
//! Provides the subtitle track of a timeline:
//! - The ordered subtitle store and its mutations (`SubtitleModel`)
//! - SRT, ASS/SSA, WebVTT and SBV parsing
//! - The interchange JSON form and the file exporters built on it
//! - The render output the track is written to
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Subtitle Track                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs       - Entries, snapshots and ASS style             │
//! │  model.rs        - Interval store, registry and snap sync       │
//! │  formats.rs      - SRT/VTT/SBV parsing and export               │
//! │  ass.rs          - ASS/SSA parsing and export                   │
//! │  interchange.rs  - {startPos, dialogue, endPos} JSON form       │
//! │  import.rs       - File loading, offset and retiming            │
//! │  output.rs       - Render attachment (atomic file writes)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use subtrack_lib::core::captions::{ImportOptions, SubtitleModel};
//! use subtrack_lib::core::commands::UndoJournal;
//! use subtrack_lib::core::timeline::TimelineRegistry;
//! use subtrack_lib::core::Ratio;
//!
//! let mut model = SubtitleModel::new(Arc::new(TimelineRegistry::new()), Ratio::new(25, 1));
//! let mut journal = UndoJournal::new();
//! model.import_file(Path::new("subtitles.srt"), &ImportOptions::default(), &mut journal)?;
//! println!("{}", model.to_json()?);
//! ```

mod ass;
mod formats;
mod import;
mod interchange;
mod model;
mod models;
mod output;

pub use models::{
    Color, InsertOutcome, ParsedSubtitle, SubtitleEntry, SubtitleStyle, SubtitledTime,
    TextAlignment,
};

pub use ass::{export_ass, parse_ass, AssHeader};
pub use formats::{
    export_sbv, export_srt, export_vtt, format_ass_timestamp, format_srt_timestamp,
    format_vtt_timestamp, parse_sbv, parse_srt, parse_subtitles, parse_timestamp, parse_vtt,
    ParseError, SubtitleFormat,
};
pub use import::{load_subtitle_file, ImportOptions};
pub use interchange::{parse_interchange, render, to_json, InterchangeEntry};
pub use model::SubtitleModel;
pub use output::{SubtitleOutput, WriteOutcome};
