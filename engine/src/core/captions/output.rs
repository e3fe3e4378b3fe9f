//! Render Output Attachment
//!
//! The file a subtitle track is rendered to. Writes are serialized by a lock held for
//! the whole serialize-and-write step.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracing::{debug, info};

use super::ass::AssHeader;
use super::formats::SubtitleFormat;
use super::interchange::{render, InterchangeEntry};
use crate::core::fs::atomic_write_bytes;
use crate::core::settings::SubtitleSettings;
use crate::core::{CoreError, CoreResult};

/// Result of a write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was written
    Written,
    /// There were no entries; the attachment was detached
    Detached,
}

/// Subtitle render output
#[derive(Debug)]
pub struct SubtitleOutput {
    path: PathBuf,
    format: SubtitleFormat,
    header: AssHeader,
    write_lock: RwLock<()>,
    attached: AtomicBool,
}

impl SubtitleOutput {
    /// Output at an explicit path; the format follows the extension
    pub fn new(path: impl Into<PathBuf>, header: AssHeader) -> CoreResult<Self> {
        let path = path.into();
        let format = SubtitleFormat::from_path(&path)?;
        Ok(Self::with_format(path, format, header))
    }

    pub fn with_format(path: PathBuf, format: SubtitleFormat, header: AssHeader) -> Self {
        Self {
            path,
            format,
            header,
            write_lock: RwLock::new(()),
            attached: AtomicBool::new(false),
        }
    }

    /// Output derived from settings (directory + file stem + format extension)
    pub fn from_settings(settings: &SubtitleSettings) -> CoreResult<Self> {
        let path = settings.output_path().ok_or(CoreError::NoOutput)?;
        let header = AssHeader::from_frame_size(settings.frame_size, &settings.style);
        Ok(Self::with_format(path, settings.output.format, header))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SubtitleFormat {
        self.format
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Renders `entries` and atomically replaces the output file.
    ///
    /// With no entries nothing is written and the output detaches.
    pub fn write(&self, entries: &[InterchangeEntry]) -> CoreResult<WriteOutcome> {
        let _guard = self
            .write_lock
            .write()
            .map_err(|_| CoreError::Internal("Subtitle output lock poisoned".to_string()))?;

        let Some(content) = render(entries, self.format, &self.header) else {
            self.attached.store(false, Ordering::SeqCst);
            debug!(path = %self.path.display(), "No subtitles, output detached");
            return Ok(WriteOutcome::Detached);
        };

        atomic_write_bytes(&self.path, content.as_bytes())?;
        self.attached.store(true, Ordering::SeqCst);
        info!(
            path = %self.path.display(),
            entries = entries.len(),
            "Subtitle file written"
        );
        Ok(WriteOutcome::Written)
    }

    /// Reads back the current output file
    pub fn read(&self) -> CoreResult<String> {
        let _guard = self
            .write_lock
            .read()
            .map_err(|_| CoreError::Internal("Subtitle output lock poisoned".to_string()))?;
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::SubtitleStyle;
    use crate::core::Size2D;
    use tempfile::TempDir;

    fn header() -> AssHeader {
        AssHeader::from_frame_size(Size2D::default(), &SubtitleStyle::default())
    }

    #[test]
    fn test_write_and_detach() {
        let dir = TempDir::new().unwrap();
        let output = SubtitleOutput::new(dir.path().join("track.srt"), header()).unwrap();
        assert!(!output.is_attached());

        let outcome = output
            .write(&[InterchangeEntry::new(1.0, "Hello", 2.0)])
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert!(output.is_attached());
        assert!(output.read().unwrap().contains("Hello"));

        assert_eq!(output.write(&[]).unwrap(), WriteOutcome::Detached);
        assert!(!output.is_attached());
    }

    #[test]
    fn test_from_settings() {
        let dir = TempDir::new().unwrap();
        let mut settings = SubtitleSettings::default();
        assert!(matches!(
            SubtitleOutput::from_settings(&settings),
            Err(CoreError::NoOutput)
        ));

        settings.output.directory = Some(dir.path().to_path_buf());
        settings.output.format = SubtitleFormat::Ass;
        let output = SubtitleOutput::from_settings(&settings).unwrap();
        assert_eq!(output.path(), dir.path().join("subtitles.ass"));
        assert_eq!(output.format(), SubtitleFormat::Ass);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = SubtitleOutput::new("/tmp/track.doc", header());
        assert!(matches!(result, Err(CoreError::UnsupportedFormat(_))));
    }
}
