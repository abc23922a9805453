//! Error types for clink.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using clink's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clink.
#[derive(Error, Debug)]
pub enum Error {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot walk into {}: {reason}", path.display())]
    Scan { path: PathBuf, reason: String },

    #[error("No sound files found in {}", .0.display())]
    EmptyCatalog(PathBuf),

    #[error("Startup sound `{0}` is missing from the catalog")]
    StartupSoundMissing(String),

    // Audio errors
    #[error("Cannot initialize audio device: {0}")]
    DeviceInit(String),

    #[error("Audio device is already playing a sound")]
    DeviceBusy,

    #[error("Cannot decode {}: {reason}", path.display())]
    AudioDecode { path: PathBuf, reason: String },

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Resample failed: {0}")]
    Resample(String),

    // Chat errors
    #[error("Cannot connect to chat: {0}")]
    Connect(String),

    #[error("Chat connection error: {0}")]
    Chat(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a decode error for the given file.
    pub fn decode(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::AudioDecode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error must abort startup.
    ///
    /// Everything else only affects a single playback request.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::AudioDecode { .. }
                | Self::AudioOutput(_)
                | Self::Resample(_)
                | Self::DeviceBusy
                | Self::Chat(_)
        )
    }
}
