//! ASS/SSA (Advanced SubStation Alpha) reader and writer
//!
//! Only the dialogue timing and text are imported; styles are regenerated from
//! [`SubtitleStyle`] when writing.

use tracing::debug;

use super::interchange::InterchangeEntry;
use super::{format_ass_timestamp, parse_timestamp, ParsedSubtitle, SubtitleStyle};
use crate::core::Size2D;

/// Event fields assumed when a file has no `Format:` line in `[Events]`
const DEFAULT_EVENT_FORMAT: [&str; 10] = [
    "Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect", "Text",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssSection {
    ScriptInfo,
    Styles,
    Events,
    Other,
}

impl AssSection {
    /// Classifies a `[Section]` header by substring on the space-stripped line
    fn from_header(line: &str) -> Self {
        let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if stripped.contains("ScriptInfo") {
            AssSection::ScriptInfo
        } else if stripped.contains("Styles") {
            AssSection::Styles
        } else if stripped.contains("Events") {
            AssSection::Events
        } else {
            AssSection::Other
        }
    }
}

/// Field layout of `Dialogue:` lines, taken from the `Format:` line
#[derive(Debug, Clone)]
struct EventFormat {
    field_count: usize,
    start: usize,
    end: usize,
    text: usize,
}

impl EventFormat {
    fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let position = |name: &str, fallback: usize| {
            fields
                .iter()
                .position(|f| f.as_ref().trim().eq_ignore_ascii_case(name))
                .unwrap_or(fallback)
        };
        Self {
            field_count: fields.len().max(1),
            start: position("Start", 1),
            end: position("End", 2),
            text: position("Text", fields.len().saturating_sub(1)),
        }
    }
}

impl Default for EventFormat {
    fn default() -> Self {
        Self::from_fields(&DEFAULT_EVENT_FORMAT)
    }
}

/// Parses ASS/SSA content
///
/// Dialogue text may itself contain commas: the line is split into at most as many
/// fields as the `Format:` line declares, so the last field keeps the remainder intact.
pub fn parse_ass(content: &str) -> Vec<ParsedSubtitle> {
    let mut parsed = Vec::new();
    let mut section = AssSection::Other;
    let mut format = EventFormat::default();

    for raw in content.lines() {
        let line = raw.trim().trim_start_matches('\u{FEFF}');
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            section = AssSection::from_header(line);
            continue;
        }
        if section != AssSection::Events {
            continue;
        }

        let Some((kind, rest)) = line.split_once(':') else {
            continue;
        };
        match kind.trim() {
            "Format" => {
                let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
                format = EventFormat::from_fields(&fields);
            }
            "Dialogue" => match parse_dialogue(rest.trim_start(), &format) {
                Some(sub) => parsed.push(sub),
                None => debug!("Skipping malformed ASS dialogue: {}", line),
            },
            _ => {}
        }
    }

    parsed
}

fn parse_dialogue(rest: &str, format: &EventFormat) -> Option<ParsedSubtitle> {
    let fields: Vec<&str> = rest.splitn(format.field_count, ',').collect();
    let start = parse_timestamp(fields.get(format.start)?).ok()?;
    let end = parse_timestamp(fields.get(format.end)?).ok()?;
    if format.text >= fields.len() {
        return None;
    }
    let text = fields[format.text..].join(",");
    Some(ParsedSubtitle::new(start, end, decode_ass_text(&text)))
}

/// Converts ASS hard line breaks to `\n`
fn decode_ass_text(text: &str) -> String {
    text.replace("\\N", "\n").replace("\\n", "\n")
}

fn encode_ass_text(text: &str) -> String {
    text.replace("\r\n", "\\N").replace('\n', "\\N")
}

// =============================================================================
// Writer
// =============================================================================

/// Header values for a generated ASS file
#[derive(Debug, Clone, PartialEq)]
pub struct AssHeader {
    pub play_res: Size2D,
    pub font_size: u32,
    pub margin_h: u32,
    pub margin_v: u32,
    pub style: SubtitleStyle,
}

impl AssHeader {
    /// Derives font size and margins from the frame display size
    pub fn from_frame_size(size: Size2D, style: &SubtitleStyle) -> Self {
        let font_size = if style.font_size > 0 {
            style.font_size
        } else {
            ((size.height as f64 * 0.05).round() as u32).max(8)
        };
        Self {
            play_res: size,
            font_size,
            margin_h: (size.width / 64).max(10),
            margin_v: (size.height / 36).max(10),
            style: style.clone(),
        }
    }

    fn render(&self) -> String {
        let s = &self.style;
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("; Script generated by subtrack\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str(&format!("PlayResX: {}\n", self.play_res.width));
        out.push_str(&format!("PlayResY: {}\n", self.play_res.height));
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str("Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n");
        out.push_str(&format!(
            "Style: Default,{},{},{},&H000000FF,{},{},{},{},0,0,100,100,0,0,1,{},{},{},{},{},{},1\n\n",
            s.font_family,
            self.font_size,
            s.color.to_ass_color(),
            s.outline_color.to_ass_color(),
            s.shadow_color.to_ass_color(),
            if s.bold { -1 } else { 0 },
            if s.italic { -1 } else { 0 },
            s.outline_width,
            s.shadow_offset,
            s.alignment.ass_bottom_alignment(),
            self.margin_h,
            self.margin_h,
            self.margin_v,
        ));

        out.push_str("[Events]\n");
        out.push_str(&format!("Format: {}\n", DEFAULT_EVENT_FORMAT.join(", ")));
        out
    }
}

/// Exports interchange entries to ASS format
pub fn export_ass(entries: &[InterchangeEntry], header: &AssHeader) -> String {
    let mut output = header.render();
    for entry in entries {
        output.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_timestamp(entry.start_pos),
            format_ass_timestamp(entry.end_pos),
            encode_ass_text(&entry.dialogue)
        ));
    }
    output
}
