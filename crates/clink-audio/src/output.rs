//! Audio output using cpal.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clink_core::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig,
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::job::PlaybackJob;

/// Sample rate the output device is opened at.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// A sink that renders one playback job at a time.
pub trait OutputDevice {
    /// Fixed rate the device renders at.
    fn sample_rate(&self) -> u32;

    /// Number of output channels.
    fn channels(&self) -> u16;

    /// Start rendering `job`.
    ///
    /// Returns immediately; the job's completion callback fires once its
    /// stream is exhausted. Fails with [`Error::DeviceBusy`] while another
    /// job is still active.
    fn submit(&self, job: PlaybackJob) -> Result<()>;
}

/// Frames per block handed from the feeder thread to the render callback.
const BLOCK_FRAMES: usize = 1024;

/// Blocks decoded ahead of the render callback.
const BLOCKS_AHEAD: usize = 8;

/// The block queue currently read by the render callback.
type ActiveFeed = Arc<Mutex<Option<BlockReader>>>;

enum Block {
    Samples(Vec<f32>),
    End,
}

/// Render-side end of a playback feed.
///
/// Only copies samples; decoding and resampling happen on the feeder
/// thread.
pub(crate) struct BlockReader {
    blocks: Receiver<Block>,
    recycle: Sender<Vec<f32>>,
    drained: Sender<()>,
    current: Vec<f32>,
    cursor: usize,
}

impl BlockReader {
    /// Copy queued samples into `out`. Returns true once the end of the
    /// stream has been reached; an empty queue leaves the rest untouched.
    fn read(&mut self, out: &mut [f32]) -> bool {
        let mut written = 0;

        while written < out.len() {
            if self.cursor == self.current.len() {
                match self.blocks.try_recv() {
                    Ok(Block::Samples(block)) => {
                        let spent = std::mem::replace(&mut self.current, block);
                        self.cursor = 0;
                        let _ = self.recycle.try_send(spent);
                    }
                    Ok(Block::End) => {
                        let spent = std::mem::take(&mut self.current);
                        let _ = self.recycle.try_send(spent);
                        let _ = self.drained.try_send(());
                        return true;
                    }
                    // Underrun
                    Err(_) => return false,
                }
                continue;
            }

            let count = (self.current.len() - self.cursor).min(out.len() - written);
            out[written..written + count]
                .copy_from_slice(&self.current[self.cursor..self.cursor + count]);
            self.cursor += count;
            written += count;
        }

        false
    }
}

/// Start pulling `job` on a feeder thread.
///
/// The feeder fills blocks for a device with `channels` channels, waits
/// for the render side to reach the end marker, clears `busy`, then
/// completes the job.
pub(crate) fn start_feed(
    mut job: PlaybackJob,
    channels: usize,
    busy: Arc<AtomicBool>,
) -> Result<BlockReader> {
    let (block_tx, block_rx) = bounded(BLOCKS_AHEAD);
    let (recycle_tx, recycle_rx) = bounded::<Vec<f32>>(BLOCKS_AHEAD + 2);
    let (drained_tx, drained_rx) = bounded(1);

    thread::Builder::new()
        .name("clink-feeder".to_string())
        .spawn(move || {
            while !job.is_finished() {
                let mut block = recycle_rx.try_recv().unwrap_or_default();
                block.resize(BLOCK_FRAMES * channels, 0.0);
                let frames = job.fill(&mut block, channels);
                if frames == 0 {
                    continue;
                }
                block.truncate(frames * channels);
                if block_tx.send(Block::Samples(block)).is_err() {
                    break;
                }
            }

            // Wait until the last block has been handed to the device
            if block_tx.send(Block::End).is_ok() {
                let _ = drained_rx.recv();
            }

            busy.store(false, Ordering::Release);
            job.complete();
        })?;

    Ok(BlockReader {
        blocks: block_rx,
        recycle: recycle_tx,
        drained: drained_tx,
        current: Vec::new(),
        cursor: 0,
    })
}

/// Audio output stream wrapper.
///
/// Opened once at startup and kept for the lifetime of the process.
pub struct AudioOutput {
    _stream: Stream,
    active: ActiveFeed,
    busy: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl AudioOutput {
    /// Open the default output device at `sample_rate`.
    pub fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceInit("No output device found".to_string()))?;

        Self::with_device(&device, sample_rate)
    }

    /// Open a specific device at `sample_rate`.
    pub fn with_device(device: &Device, sample_rate: u32) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let supported = Self::find_config(device, sample_rate)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        debug!(
            "Output config: {}Hz, {} channels, {:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let active: ActiveFeed = Arc::new(Mutex::new(None));

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(device, &config, active.clone())?,
            SampleFormat::I16 => Self::build_stream::<i16>(device, &config, active.clone())?,
            SampleFormat::U16 => Self::build_stream::<u16>(device, &config, active.clone())?,
            _ => {
                return Err(Error::DeviceInit(format!(
                    "Unsupported sample format: {sample_format:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceInit(format!("Failed to start stream: {e}")))?;

        Ok(Self {
            _stream: stream,
            active,
            busy: Arc::new(AtomicBool::new(false)),
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            device_name,
        })
    }

    /// Pick a supported configuration covering `sample_rate`, preferring
    /// stereo `f32`.
    fn find_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig> {
        let ranges = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceInit(format!("Failed to query output configs: {e}")))?;

        let rank = |format: SampleFormat, channels: u16| {
            let format_rank = match format {
                SampleFormat::F32 => 0,
                SampleFormat::I16 => 1,
                SampleFormat::U16 => 2,
                _ => 3,
            };
            (format_rank, channels != 2)
        };

        ranges
            .filter(|range| {
                range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            })
            .min_by_key(|range| rank(range.sample_format(), range.channels()))
            .map(|range| range.with_sample_rate(SampleRate(sample_rate)))
            .ok_or_else(|| {
                Error::DeviceInit(format!("Device does not support {sample_rate} Hz output"))
            })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &Device,
        config: &StreamConfig,
        active: ActiveFeed,
    ) -> Result<Stream> {
        let mut buffer: Vec<f32> = Vec::new();

        let err_fn = |err| {
            error!("Audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    buffer.resize(data.len(), 0.0);
                    render(&active, &mut buffer);

                    for (sample, value) in data.iter_mut().zip(&buffer) {
                        *sample = T::from_sample(*value);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::DeviceInit(format!("Failed to build stream: {e}")))?;

        Ok(stream)
    }

    /// Get the device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl OutputDevice for AudioOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn submit(&self, job: PlaybackJob) -> Result<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::DeviceBusy);
        }

        match start_feed(job, usize::from(self.channels), Arc::clone(&self.busy)) {
            Ok(reader) => {
                *self.active.lock() = Some(reader);
                Ok(())
            }
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                Err(e)
            }
        }
    }
}

/// Copy the active feed into `buffer`, leaving silence where it has no
/// samples, and release the feed once its end marker is reached.
pub(crate) fn render(active: &Mutex<Option<BlockReader>>, buffer: &mut [f32]) {
    buffer.fill(0.0);

    // Never wait on the audio thread; a contended slot renders silence
    let Some(mut slot) = active.try_lock() else {
        return;
    };
    if slot.as_mut().is_some_and(|reader| reader.read(buffer)) {
        *slot = None;
    }
}
