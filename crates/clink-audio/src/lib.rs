//! # clink-audio
//!
//! Sound playback pipeline for clink.
//!
//! Features:
//! - Extension-dispatched symphonia decoding (FLAC, WAV, MP3, Ogg/Vorbis)
//! - Lazy rubato resampling to the device rate
//! - A single cpal output device playing one sound at a time

pub mod decode;
pub mod engine;
pub mod job;
pub mod output;
pub mod resample;
pub mod source;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use decode::{SoundDecoder, SoundFormat};
pub use engine::{PlaybackReport, PlaybackState, Player};
pub use job::PlaybackJob;
pub use output::{AudioOutput, OutputDevice, TARGET_SAMPLE_RATE};
pub use resample::{ResampledSource, RESAMPLE_QUALITY};
pub use source::SampleSource;
