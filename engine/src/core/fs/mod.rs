//! Filesystem utilities.
//!
//! Subtitle files and settings are replaced atomically: a crash mid-write leaves either
//! the previous file or the new one, never a truncated mix. Windows cannot always rename
//! over an existing file, so replacement goes through a `.bak` swap.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Reading
// =============================================================================

/// Checks that `path` names an existing regular file.
pub fn validate_input_file(path: &Path) -> CoreResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(CoreError::ValidationError("Input path is empty".to_string()));
    }
    if !path.exists() {
        return Err(CoreError::FileNotFound(path.display().to_string()));
    }
    if !path.is_file() {
        return Err(CoreError::ValidationError(format!(
            "Input path is not a file: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// Reads a text file, stripping a UTF-8 byte order mark.
///
/// Files that are not valid UTF-8 are decoded as ISO-8859-1, which maps every byte to
/// the code point of the same value.
pub fn read_text_file(path: &Path) -> CoreResult<String> {
    let path = validate_input_file(path)?;
    let bytes = std::fs::read(&path)?;
    Ok(decode_text(&bytes, &path))
}

fn decode_text(bytes: &[u8], path: &Path) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(
                path = %path.display(),
                valid_up_to = e.valid_up_to(),
                "File is not UTF-8, decoding as Latin-1"
            );
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes to `path` using an atomic replace pattern.
///
/// The content goes to a sibling `.tmp` file which is flushed, synced, then renamed
/// into place. Missing parent directories are created.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = sibling_path(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    sibling.set_file_name(format!("{file_name}.{suffix}"));
    sibling
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    let bak = sibling_path(dest, "bak");
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            // Put the previous file back.
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}
