//! Test doubles for the playback pipeline.
//!
//! Only compiled for tests or with the `test-util` feature.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::f32::consts::TAU;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clink_core::{Error, Result};
use parking_lot::Mutex;

use crate::job::PlaybackJob;
use crate::output::OutputDevice;
use crate::source::SampleSource;

const TONE_HZ: f32 = 440.0;

/// Value of the test tone at `frame`, as written by [`ToneSource`] and
/// [`write_wav`].
#[allow(clippy::cast_precision_loss)]
pub fn tone_sample(sample_rate: u32, frame: usize) -> f32 {
    let t = frame as f32 / sample_rate as f32;
    (TAU * TONE_HZ * t).sin() * 0.5
}

/// A sine tone with a fixed number of frames.
pub struct ToneSource {
    sample_rate: u32,
    channels: u16,
    remaining: usize,
    position: usize,
}

impl ToneSource {
    pub const fn new(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            remaining: frames,
            position: 0,
        }
    }
}

impl SampleSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let frames = self.remaining.min(256);
        let mut chunk = Vec::with_capacity(frames * usize::from(self.channels));
        for i in 0..frames {
            let value = tone_sample(self.sample_rate, self.position + i);
            for _ in 0..self.channels {
                chunk.push(value);
            }
        }

        self.position += frames;
        self.remaining -= frames;
        Ok(Some(chunk))
    }
}

/// What a [`RecordingDevice`] received for one job.
#[derive(Debug, Clone)]
pub struct RenderedPlayback {
    /// Rate of the stream handed to the device.
    pub sample_rate: u32,
    pub frames: u64,
    /// Interleaved samples as mapped onto the device channels.
    pub samples: Vec<f32>,
}

/// An [`OutputDevice`] that renders jobs on a helper thread and records them.
///
/// Jobs whose rate differs from the device rate are rejected, like a real
/// device opened at a fixed rate would mangle them.
#[derive(Clone)]
pub struct RecordingDevice {
    sample_rate: u32,
    channels: u16,
    rendered: Arc<Mutex<Vec<RenderedPlayback>>>,
    active: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
}

impl RecordingDevice {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            rendered: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Everything rendered so far, in completion order.
    pub fn rendered(&self) -> Vec<RenderedPlayback> {
        self.rendered.lock().clone()
    }

    /// Highest number of jobs that were active at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

impl OutputDevice for RecordingDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn submit(&self, mut job: PlaybackJob) -> Result<()> {
        if job.sample_rate() != self.sample_rate {
            return Err(Error::AudioOutput(format!(
                "Stream at {} Hz submitted to {} Hz device",
                job.sample_rate(),
                self.sample_rate
            )));
        }

        if self
            .active
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::DeviceBusy);
        }
        self.max_concurrent.fetch_max(1, Ordering::SeqCst);

        let channels = usize::from(self.channels);
        let sample_rate = self.sample_rate;
        let rendered = Arc::clone(&self.rendered);
        let active = Arc::clone(&self.active);

        std::thread::spawn(move || {
            let mut buffer = vec![0.0f32; 512 * channels];
            let mut samples = Vec::new();

            while !job.is_finished() {
                let frames = job.fill(&mut buffer, channels);
                samples.extend_from_slice(&buffer[..frames * channels]);
            }

            rendered.lock().push(RenderedPlayback {
                sample_rate,
                frames: job.frames(),
                samples,
            });
            active.store(0, Ordering::SeqCst);
            job.complete();
        });

        Ok(())
    }
}

/// Write a 16-bit PCM WAV file holding a sine tone.
#[allow(clippy::cast_possible_truncation)]
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
    let block_align = u32::from(channels) * 2;
    let data_len = frames as u32 * block_align;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align).to_le_bytes());
    bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let value = (tone_sample(sample_rate, i) * f32::from(i16::MAX)) as i16;
        for _ in 0..channels {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    std::fs::write(path, bytes).unwrap();
}
