//! Subtitle Data Models
//!
//! Defines the stored entry, the public snapshot of an entry, and the styling used when
//! rendering ASS headers.

use serde::{Deserialize, Serialize};

use crate::core::{Frame, GenTime, Ratio, TimeSec};

// =============================================================================
// Entries
// =============================================================================

/// Value stored in the interval store, keyed by start time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// Caption text (may contain line breaks)
    pub text: String,
    /// End time, never before the key
    pub end: GenTime,
}

/// A complete subtitle snapshot: start, end and text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitledTime {
    pub start: GenTime,
    pub end: GenTime,
    pub text: String,
}

impl SubtitledTime {
    pub fn new(start: GenTime, end: GenTime, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> GenTime {
        self.end - self.start
    }

    pub fn start_frame(&self, fps: Ratio) -> Frame {
        self.start.frames(fps)
    }

    pub fn end_frame(&self, fps: Ratio) -> Frame {
        self.end.frames(fps)
    }

    /// Returns true if the subtitle is visible at the given time
    pub fn is_visible_at(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start.seconds() && time_sec < self.end.seconds()
    }
}

/// Entry produced by a format parser before offsets are applied
pub type ParsedSubtitle = SubtitledTime;

/// Outcome of a store insertion that did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was added
    Inserted,
    /// An identical entry (same start and text) already exists; nothing changed
    Duplicate,
}

// =============================================================================
// Styling
// =============================================================================

/// RGBA color value (0-255 for each component)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    /// Converts to ASS/SSA color format (&HAABBGGRR)
    pub fn to_ass_color(&self) -> String {
        format!(
            "&H{:02X}{:02X}{:02X}{:02X}",
            255 - self.a,
            self.b,
            self.g,
            self.r
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::white()
    }
}

/// Horizontal alignment of subtitle text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
}

impl TextAlignment {
    /// ASS numpad alignment for bottom-anchored text
    pub fn ass_bottom_alignment(&self) -> u8 {
        match self {
            TextAlignment::Left => 1,
            TextAlignment::Center => 2,
            TextAlignment::Right => 3,
        }
    }
}

/// Default subtitle style written to the ASS `[V4 Styles]` section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleStyle {
    /// Font family name
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Font size in points; 0 derives it from the frame height
    #[serde(default)]
    pub font_size: u32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default = "Color::white")]
    pub color: Color,
    #[serde(default = "Color::black")]
    pub outline_color: Color,
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,
    #[serde(default = "default_shadow_color")]
    pub shadow_color: Color,
    #[serde(default = "default_shadow_offset")]
    pub shadow_offset: f32,
    #[serde(default)]
    pub alignment: TextAlignment,
}

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_outline_width() -> f32 {
    1.0
}

fn default_shadow_color() -> Color {
    Color::rgba(0, 0, 0, 128)
}

fn default_shadow_offset() -> f32 {
    1.0
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: 0,
            bold: false,
            italic: false,
            color: Color::white(),
            outline_color: Color::black(),
            outline_width: default_outline_width(),
            shadow_color: default_shadow_color(),
            shadow_offset: default_shadow_offset(),
            alignment: TextAlignment::Center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_ass_format() {
        // White, fully opaque: &H00FFFFFF
        assert_eq!(Color::white().to_ass_color(), "&H00FFFFFF");
        // Red with 50% alpha: BGR order, inverted alpha
        assert_eq!(Color::rgba(255, 0, 0, 128).to_ass_color(), "&H7F0000FF");
    }

    #[test]
    fn test_subtitled_time_visibility() {
        let sub = SubtitledTime::new(GenTime::from_seconds(1.0), GenTime::from_seconds(2.0), "Hi");
        assert!(sub.is_visible_at(1.0));
        assert!(sub.is_visible_at(1.99));
        assert!(!sub.is_visible_at(2.0));
        assert_eq!(sub.duration().millis(), 1000);
        assert_eq!(sub.end_frame(Ratio::new(25, 1)), 50);
    }

    #[test]
    fn test_style_deserializes_with_defaults() {
        let style: SubtitleStyle = serde_json::from_str(r#"{"fontSize": 40}"#).unwrap();
        assert_eq!(style.font_size, 40);
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.alignment, TextAlignment::Center);
    }
}
