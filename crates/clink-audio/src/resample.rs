//! Sample rate conversion using rubato.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use clink_core::{Error, Result};
use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::source::SampleSource;

/// Interpolation quality used for every resampled sound.
pub const RESAMPLE_QUALITY: usize = 4;

/// Input frames handed to rubato per call.
const CHUNK_FRAMES: usize = 1024;

fn interpolation_parameters(quality: usize) -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: quality.clamp(1, 16) * 32,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Converts a source stream to a new sample rate as it is pulled.
///
/// Only the frames needed for the next rubato call are buffered. The
/// resampler's own delay is trimmed from the head and the tail is flushed
/// with silence, so the output holds exactly `input * output_rate /
/// input_rate` frames, time-aligned with the input.
pub struct ResampledSource<S> {
    inner: S,
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Deinterleaved input waiting for a full chunk.
    input_buffer: Vec<Vec<f32>>,
    /// Leading output frames still to drop.
    delay: usize,
    frames_in: u64,
    frames_out: u64,
    /// Total output length, known once the inner source is exhausted.
    expected_frames: Option<u64>,
}

impl<S: SampleSource> ResampledSource<S> {
    /// Wrap `inner`, converting it to `output_rate`.
    pub fn new(inner: S, output_rate: u32, quality: usize) -> Result<Self> {
        let input_rate = inner.sample_rate();
        let channels = usize::from(inner.channels().max(1));

        let resampler = SincFixedIn::<f32>::new(
            f64::from(output_rate) / f64::from(input_rate),
            1.0,
            interpolation_parameters(quality),
            CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {e}")))?;

        let delay = resampler.output_delay();
        debug!(
            "Resampler created: {}Hz -> {}Hz, {} channels, quality {}, delay {} frames",
            input_rate, output_rate, channels, quality, delay
        );

        Ok(Self {
            inner,
            resampler,
            input_rate,
            output_rate,
            channels,
            input_buffer: vec![Vec::new(); channels],
            delay,
            frames_in: 0,
            frames_out: 0,
            expected_frames: None,
        })
    }

    /// Get the input sample rate.
    pub const fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get the output sample rate.
    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Deinterleave input samples into channel buffers.
    fn deinterleave(&mut self, input: &[f32]) {
        for frame in input.chunks_exact(self.channels) {
            for (buffer, sample) in self.input_buffer.iter_mut().zip(frame) {
                buffer.push(*sample);
            }
            self.frames_in += 1;
        }
    }

    /// Interleave `frames` frames of rubato's output starting at `skip`.
    fn interleave(&self, channels: &[Vec<f32>], skip: usize, frames: usize) -> Vec<f32> {
        let mut output = Vec::with_capacity(frames * self.channels);

        for frame in skip..skip + frames {
            for ch in channels {
                output.push(ch[frame]);
            }
        }

        output
    }

    fn buffered_frames(&self) -> usize {
        self.input_buffer.first().map_or(0, Vec::len)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn converted_length(&self, frames: u64) -> u64 {
        (frames as f64 * f64::from(self.output_rate) / f64::from(self.input_rate)).round() as u64
    }

    /// Run one rubato call on the next chunk of buffered input.
    ///
    /// Once the inner source is exhausted the chunk is padded with silence.
    fn process_chunk(&mut self) -> Result<Vec<f32>> {
        let needed = self.resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = self
            .input_buffer
            .iter_mut()
            .map(|ch| {
                let mut data: Vec<f32> = ch.drain(..needed.min(ch.len())).collect();
                data.resize(needed, 0.0);
                data
            })
            .collect();

        let resampled = self
            .resampler
            .process(&chunk, None)
            .map_err(|e| Error::Resample(e.to_string()))?;

        let produced = resampled.first().map_or(0, Vec::len);
        let skip = self.delay.min(produced);
        self.delay -= skip;

        let mut frames = produced - skip;
        if let Some(expected) = self.expected_frames {
            let left = usize::try_from(expected.saturating_sub(self.frames_out)).unwrap_or(usize::MAX);
            frames = frames.min(left);
        }
        self.frames_out += frames as u64;

        Ok(self.interleave(&resampled, skip, frames))
    }
}

impl<S: SampleSource> SampleSource for ResampledSource<S> {
    fn sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let output = match self.expected_frames {
                Some(expected) if self.frames_out >= expected => return Ok(None),
                // Flushing: pad whatever is left until the tail is out
                Some(_) => self.process_chunk()?,
                None if self.buffered_frames() >= self.resampler.input_frames_next() => {
                    self.process_chunk()?
                }
                None => {
                    match self.inner.next_chunk()? {
                        Some(samples) => self.deinterleave(&samples),
                        None => self.expected_frames = Some(self.converted_length(self.frames_in)),
                    }
                    continue;
                }
            };

            // The head of the stream may be all resampler delay
            if !output.is_empty() {
                return Ok(Some(output));
            }
        }
    }
}
