//! Sound catalog built from the sound directory.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{Error, Result, SoundEntry};

/// Mapping from command name to sound file.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SoundCatalog {
    root: PathBuf,
    sounds: HashMap<String, SoundEntry>,
}

impl SoundCatalog {
    /// Scan a directory and index every regular file in it.
    ///
    /// Entries are visited in file-name order; when two files share a name
    /// once their extension is removed (`ding.mp3`, `ding.wav`), the one
    /// visited last wins. An empty directory yields an empty catalog; the
    /// caller decides whether that is fatal.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut sounds = HashMap::new();

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Scan {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(sound) = SoundEntry::from_path(entry.path()) else {
                warn!("Skipping sound with unusable name: {}", entry.path().display());
                continue;
            };

            if let Some(previous) = sounds.insert(sound.name.clone(), sound) {
                debug!(
                    "Sound `{}` overrides {}",
                    previous.name,
                    previous.path.display()
                );
            }
        }

        info!("Found {} sounds in {}", sounds.len(), root.display());

        Ok(Self {
            root: root.to_path_buf(),
            sounds,
        })
    }

    /// Fail with [`Error::EmptyCatalog`] if no sounds were found.
    pub fn require_sounds(self) -> Result<Self> {
        if self.sounds.is_empty() {
            return Err(Error::EmptyCatalog(self.root));
        }
        Ok(self)
    }

    /// Look up a sound by command name.
    pub fn get(&self, name: &str) -> Option<&SoundEntry> {
        self.sounds.get(name)
    }

    /// Check if a sound exists.
    pub fn contains(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    /// Iterate over command names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sounds.keys().map(String::as_str)
    }

    /// Get the directory the catalog was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}
