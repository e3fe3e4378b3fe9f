//! Subtitle Format Parsers and Exporters
//!
//! Supports parsing and exporting subtitles in line-oriented formats:
//! - SRT (SubRip)
//! - VTT (WebVTT)
//! - SBV (YouTube)
//!
//! ASS/SSA lives in its own module. Parsers are lenient: a malformed block is skipped and
//! the rest of the file is still read.
//!
//! # Example
//!
//! ```rust,ignore
//! use subtrack_lib::core::captions::{parse_subtitles, SubtitleFormat};
//!
//! let content = std::fs::read_to_string("subtitles.srt")?;
//! let parsed = parse_subtitles(&content, SubtitleFormat::Srt)?;
//! ```

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ass::parse_ass;
use super::interchange::InterchangeEntry;
use super::ParsedSubtitle;
use crate::core::{CoreError, CoreResult, GenTime};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during subtitle parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid timestamp format
    InvalidTimestamp(String),
    /// Invalid subtitle format
    InvalidFormat(String),
    /// Missing required data
    MissingData(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimestamp(s) => write!(f, "Invalid timestamp: {}", s),
            Self::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            Self::MissingData(s) => write!(f, "Missing data: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

// =============================================================================
// Format Selection
// =============================================================================

/// Supported subtitle file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Ass,
    Vtt,
    Sbv,
}

impl SubtitleFormat {
    /// Selects a format from a file extension (`ssa` is read as ASS)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "ass" | "ssa" => Some(Self::Ass),
            "vtt" => Some(Self::Vtt),
            "sbv" => Some(Self::Sbv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> CoreResult<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| CoreError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Vtt => "vtt",
            Self::Sbv => "sbv",
        }
    }
}

/// Parses subtitle content in the given format
pub fn parse_subtitles(
    content: &str,
    format: SubtitleFormat,
) -> Result<Vec<ParsedSubtitle>, ParseError> {
    let parsed = match format {
        SubtitleFormat::Srt => parse_srt(content),
        SubtitleFormat::Ass => parse_ass(content),
        SubtitleFormat::Vtt => parse_vtt(content)?,
        SubtitleFormat::Sbv => parse_sbv(content),
    };
    Ok(parsed)
}

// =============================================================================
// Timestamps
// =============================================================================

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP.get_or_init(|| {
        Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{1,2})(?:[.,](\d{1,9}))?$")
            .expect("timestamp pattern is valid")
    })
}

/// Parses `H:MM:SS.fff`, `HH:MM:SS,mmm` or `MM:SS.mmm` into a time.
///
/// Fraction digits are decimal, so ASS centiseconds (`.25`) and SRT milliseconds
/// (`,250`) both mean a quarter second.
pub fn parse_timestamp(ts: &str) -> Result<GenTime, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());
    let caps = timestamp_regex().captures(ts.trim()).ok_or_else(invalid)?;

    let number = |idx: usize| -> Result<i64, ParseError> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };
    let hours = number(1)?;
    let minutes = number(2)?;
    let seconds = number(3)?;
    let fraction_nanos = match caps.get(4) {
        Some(m) => {
            let digits = m.as_str();
            let value: i64 = digits.parse().map_err(|_| invalid())?;
            value * 10_i64.pow(9 - digits.len() as u32)
        }
        None => 0,
    };

    let total = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .and_then(|s| s.checked_mul(1_000_000_000))
        .and_then(|whole| whole.checked_add(fraction_nanos))
        .ok_or_else(invalid)?;
    Ok(GenTime::from_nanos(total))
}

struct Clock {
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

/// Integer millisecond decomposition of a seconds value (negative clamps to zero)
fn decompose(seconds: f64) -> Clock {
    let total_ms = GenTime::from_seconds(seconds).millis().max(0);
    let total_secs = total_ms / 1000;
    Clock {
        hours: total_secs / 3600,
        minutes: (total_secs / 60) % 60,
        seconds: total_secs % 60,
        millis: total_ms % 1000,
    }
}

/// Formats seconds as SRT timestamp (00:00:00,000)
pub fn format_srt_timestamp(seconds: f64) -> String {
    let c = decompose(seconds);
    format!(
        "{:02}:{:02}:{:02},{:03}",
        c.hours, c.minutes, c.seconds, c.millis
    )
}

/// Formats seconds as VTT timestamp (00:00:00.000)
pub fn format_vtt_timestamp(seconds: f64) -> String {
    let c = decompose(seconds);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        c.hours, c.minutes, c.seconds, c.millis
    )
}

/// Formats seconds as ASS timestamp (0:00:00.00)
pub fn format_ass_timestamp(seconds: f64) -> String {
    let c = decompose(seconds);
    format!(
        "{}:{:02}:{:02}.{:02}",
        c.hours,
        c.minutes,
        c.seconds,
        c.millis / 10
    )
}

/// Parses a `start --> end` line. Anything after the end timestamp (VTT cue settings,
/// SRT coordinates) is ignored.
fn parse_arrow_range(line: &str) -> Result<(GenTime, GenTime), ParseError> {
    let (left, right) = line
        .split_once("-->")
        .ok_or_else(|| ParseError::InvalidFormat(format!("Expected 'start --> end': {}", line)))?;
    let start = left.trim();
    let end = right.split_whitespace().next().unwrap_or("");
    if start.is_empty() || end.is_empty() {
        return Err(ParseError::MissingData(format!("Time range: {}", line)));
    }
    Ok((parse_timestamp(start)?, parse_timestamp(end)?))
}

// =============================================================================
// SRT Format
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SrtState {
    ExpectIndex,
    ExpectTimeRange,
    AccumulateText,
}

/// Parses SRT (SubRip) content
///
/// ```text
/// 1
/// 00:00:01,000 --> 00:00:04,000
/// First caption text
///
/// 2
/// 00:00:05,500 --> 00:00:08,000
/// Second caption text
/// with multiple lines
/// ```
///
/// A block is committed on the blank line that ends it (or at end of input). Blocks whose
/// time range is missing or malformed are dropped.
pub fn parse_srt(content: &str) -> Vec<ParsedSubtitle> {
    let mut parsed = Vec::new();
    let mut state = SrtState::ExpectIndex;
    let mut range: Option<(GenTime, GenTime)> = None;
    let mut text_lines: Vec<&str> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            commit_srt_block(&mut parsed, &mut range, &mut text_lines);
            state = SrtState::ExpectIndex;
            continue;
        }

        if state != SrtState::AccumulateText && line.contains("-->") {
            match parse_arrow_range(line) {
                Ok(r) => {
                    range = Some(r);
                    state = SrtState::AccumulateText;
                }
                Err(e) => debug!("Skipping malformed SRT time range: {}", e),
            }
            continue;
        }

        match state {
            SrtState::ExpectIndex => state = SrtState::ExpectTimeRange,
            SrtState::ExpectTimeRange => {
                debug!("Skipping SRT line outside a block: {}", line);
            }
            SrtState::AccumulateText => text_lines.push(line),
        }
    }
    commit_srt_block(&mut parsed, &mut range, &mut text_lines);

    parsed
}

fn commit_srt_block(
    parsed: &mut Vec<ParsedSubtitle>,
    range: &mut Option<(GenTime, GenTime)>,
    text_lines: &mut Vec<&str>,
) {
    if let Some((start, end)) = range.take() {
        parsed.push(ParsedSubtitle::new(start, end, text_lines.join("\n")));
    } else if !text_lines.is_empty() {
        debug!(lines = text_lines.len(), "Dropping SRT block without time range");
    }
    text_lines.clear();
}

/// Exports interchange entries to SRT format
pub fn export_srt(entries: &[InterchangeEntry]) -> String {
    let mut output = String::new();

    for (index, entry) in entries.iter().enumerate() {
        output.push_str(&format!("{}\n", index + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(entry.start_pos),
            format_srt_timestamp(entry.end_pos)
        ));
        output.push_str(&entry.dialogue);
        output.push_str("\n\n");
    }

    let mut output = output.trim_end().to_string();
    output.push('\n');
    output
}

// =============================================================================
// VTT Format
// =============================================================================

fn vtt_tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"))
}

/// Parses WebVTT content
///
/// ```text
/// WEBVTT
///
/// cue-1
/// 00:00:01.000 --> 00:00:04.000 align:start
/// <v Speaker>First caption text</v>
/// ```
pub fn parse_vtt(content: &str) -> Result<Vec<ParsedSubtitle>, ParseError> {
    let normalized = content.trim_start_matches('\u{FEFF}').replace("\r\n", "\n");
    let mut blocks = normalized.split("\n\n");

    let header = blocks.next().unwrap_or("");
    if !header.trim_start().starts_with("WEBVTT") {
        return Err(ParseError::InvalidFormat(
            "VTT file must start with WEBVTT".to_string(),
        ));
    }

    let mut parsed = Vec::new();
    for block in blocks {
        let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let Some(first) = lines.next() else {
            continue;
        };
        if first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
            continue;
        }
        let timing = if first.contains("-->") {
            first
        } else {
            match lines.next() {
                Some(next) => next,
                None => continue,
            }
        };
        let (start, end) = match parse_arrow_range(timing) {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping malformed VTT cue: {}", e);
                continue;
            }
        };
        let text = lines
            .map(|l| vtt_tag_regex().replace_all(l, "").into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        parsed.push(ParsedSubtitle::new(start, end, text));
    }

    Ok(parsed)
}

/// Exports interchange entries to WebVTT format
pub fn export_vtt(entries: &[InterchangeEntry]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for entry in entries {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_timestamp(entry.start_pos),
            format_vtt_timestamp(entry.end_pos)
        ));
        output.push_str(&entry.dialogue);
        output.push_str("\n\n");
    }

    let mut output = output.trim_end().to_string();
    output.push('\n');
    output
}

// =============================================================================
// SBV Format
// =============================================================================

/// Parses YouTube SBV content
///
/// ```text
/// 0:00:01.000,0:00:04.000
/// First caption text
/// ```
pub fn parse_sbv(content: &str) -> Vec<ParsedSubtitle> {
    let mut parsed = Vec::new();
    let mut current: Option<ParsedSubtitle> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            parsed.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(sub) => {
                if !sub.text.is_empty() {
                    sub.text.push('\n');
                }
                sub.text.push_str(line);
            }
            None => {
                let range = line
                    .split_once(',')
                    .ok_or_else(|| ParseError::InvalidFormat(line.to_string()))
                    .and_then(|(s, e)| Ok((parse_timestamp(s)?, parse_timestamp(e)?)));
                match range {
                    Ok((start, end)) => current = Some(ParsedSubtitle::new(start, end, "")),
                    Err(e) => debug!("Skipping SBV line: {}", e),
                }
            }
        }
    }
    parsed.extend(current.take());

    parsed
}

/// Exports interchange entries to SBV format
pub fn export_sbv(entries: &[InterchangeEntry]) -> String {
    let blocks: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "{},{}\n{}",
                format_sbv_timestamp(entry.start_pos),
                format_sbv_timestamp(entry.end_pos),
                entry.dialogue
            )
        })
        .collect();
    let mut output = blocks.join("\n\n");
    output.push('\n');
    output
}

fn format_sbv_timestamp(seconds: f64) -> String {
    let c = decompose(seconds);
    format!(
        "{}:{:02}:{:02}.{:03}",
        c.hours, c.minutes, c.seconds, c.millis
    )
}

// =============================================================================
// Tests
// =============================================================================
