//! Sound catalog entry.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A playable sound: the command name and the file it plays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoundEntry {
    /// Command name (file name with its final extension removed).
    pub name: String,
    /// Location of the audio file.
    pub path: PathBuf,
}

impl SoundEntry {
    /// Build an entry from a file path, deriving the name from the file name.
    ///
    /// Returns `None` for paths without a usable UTF-8 file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_stem()?.to_str()?.to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self { name, path })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
