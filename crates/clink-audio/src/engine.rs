//! Playback engine coordinating decode, resample, and output.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};

use clink_core::{Error, Result};
use crossbeam_channel::bounded;
use tracing::{debug, info, trace};

use crate::decode::SoundDecoder;
use crate::job::PlaybackJob;
use crate::output::OutputDevice;
use crate::resample::{ResampledSource, RESAMPLE_QUALITY};
use crate::source::SampleSource;

/// Playback state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Decoding,
    Resampling,
    Playing,
}

/// Summary of a finished playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub path: PathBuf,
    /// Native rate of the file.
    pub source_rate: u32,
    /// Rate the device rendered at.
    pub target_rate: u32,
    pub channels: u16,
    /// Whether the stream went through the resampler.
    pub resampled: bool,
    /// Frames delivered to the device.
    pub frames: u64,
}

/// Plays sound files on an output device, one at a time.
///
/// [`Player::play`] blocks until the sound has finished, and takes
/// `&mut self`, so a player never has two sounds in flight.
pub struct Player<D> {
    device: D,
    state: PlaybackState,
    resample_quality: usize,
}

impl<D: OutputDevice> Player<D> {
    /// Create a player on an already opened device.
    pub const fn new(device: D) -> Self {
        Self {
            device,
            state: PlaybackState::Idle,
            resample_quality: RESAMPLE_QUALITY,
        }
    }

    /// Get the current playback state.
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Get the output device.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Decode `path`, resample it if needed, and play it to completion.
    ///
    /// On any failure the engine is back to [`PlaybackState::Idle`] and
    /// ready for the next request.
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<PlaybackReport> {
        let path = path.as_ref();
        let result = self.play_inner(path);
        self.set_state(PlaybackState::Idle);
        result
    }

    fn play_inner(&mut self, path: &Path) -> Result<PlaybackReport> {
        self.set_state(PlaybackState::Decoding);
        let decoder = SoundDecoder::open(path)?;

        let source_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let target_rate = self.device.sample_rate();
        let resampled = source_rate != target_rate;

        if let Some(duration) = decoder.duration() {
            debug!("{} lasts {:.2} seconds", path.display(), duration);
        }

        let source: Box<dyn SampleSource> = if resampled {
            self.set_state(PlaybackState::Resampling);
            trace!(
                "Resampling sound: device rate [{}], file rate [{}]",
                target_rate,
                source_rate
            );
            Box::new(ResampledSource::new(
                decoder,
                target_rate,
                self.resample_quality,
            )?)
        } else {
            Box::new(decoder)
        };

        let (done_tx, done_rx) = bounded(1);
        let job = PlaybackJob::new(source, move |outcome| {
            let _ = done_tx.send(outcome);
        });

        self.set_state(PlaybackState::Playing);
        info!("Playing [{}] with sample rate [{}]", path.display(), source_rate);
        self.device.submit(job)?;

        // Wait for this sound to be played
        let frames = done_rx.recv().map_err(|_| {
            Error::AudioOutput("Device dropped the sound before it finished".to_string())
        })??;

        Ok(PlaybackReport {
            path: path.to_path_buf(),
            source_rate,
            target_rate,
            channels,
            resampled,
            frames,
        })
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        if self.state != new_state {
            debug!("State changed: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }
}
