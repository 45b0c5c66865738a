//! Append-only ledger of uploaded originals.
//!
//! One absolute source path per line, UTF-8, no header and no escaping.
//! Subtitle discovery reads the newest entries later to find subtitles for
//! recently archived videos.
//!
//! There is no locking: two uploaders appending at once can interleave
//! partial lines, so runs must be serialized by whoever schedules them.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Entries returned by [`Ledger::recent`] unless told otherwise.
pub const DEFAULT_RECENT_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("path contains a newline and cannot be recorded: {0:?}")]
    EmbeddedNewline(PathBuf),
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `original` as one line, creating the ledger if needed.
    pub fn record(&self, original: &Path) -> Result<(), LedgerError> {
        let line = original
            .to_str()
            .ok_or_else(|| LedgerError::NonUtf8(original.to_path_buf()))?;
        if line.contains(['\n', '\r']) {
            return Err(LedgerError::EmbeddedNewline(original.to_path_buf()));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // Single write so the line is appended in one piece.
        file.write_all(format!("{line}\n").as_bytes())?;
        log::debug!("recorded {line} in {}", self.path.display());
        Ok(())
    }

    /// The newest `limit` entries, oldest first. A missing ledger is empty.
    pub fn recent(&self, limit: usize) -> Result<Vec<String>, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let skip = lines.len().saturating_sub(limit);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }
}
