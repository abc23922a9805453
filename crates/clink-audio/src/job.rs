//! A sound submitted to the output device.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use clink_core::Result;

use crate::source::SampleSource;

type Completion = Box<dyn FnOnce(Result<u64>) + Send>;

/// A sample stream followed by a completion callback.
///
/// The device pulls frames with [`PlaybackJob::fill`] until the job reports
/// it is finished, then calls [`PlaybackJob::complete`], which runs the
/// callback with the number of frames rendered (or the stream's error).
pub struct PlaybackJob {
    source: Box<dyn SampleSource>,
    on_complete: Completion,
    source_channels: usize,
    pending: Vec<f32>,
    cursor: usize,
    frames: u64,
    outcome: Option<Result<()>>,
}

impl PlaybackJob {
    pub fn new(
        source: Box<dyn SampleSource>,
        on_complete: impl FnOnce(Result<u64>) + Send + 'static,
    ) -> Self {
        let source_channels = usize::from(source.channels().max(1));
        Self {
            source,
            on_complete: Box::new(on_complete),
            source_channels,
            pending: Vec::new(),
            cursor: 0,
            frames: 0,
            outcome: None,
        }
    }

    /// Sample rate of the frames this job produces.
    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Channel count of the underlying stream.
    pub const fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Frames rendered so far.
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// True once the stream has ended or failed.
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Fill `out` with interleaved frames for a device with `out_channels`.
    ///
    /// Source channels are mapped onto device channels: a mono source is
    /// copied to every channel, surplus source channels are dropped.
    /// Returns the number of frames written; the rest of `out` is untouched.
    pub fn fill(&mut self, out: &mut [f32], out_channels: usize) -> usize {
        let out_channels = out_channels.max(1);
        let mut written = 0;

        for frame in out.chunks_exact_mut(out_channels) {
            if !self.ensure_pending() {
                break;
            }

            let input = &self.pending[self.cursor..self.cursor + self.source_channels];
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = input[map_channel(ch, self.source_channels)];
            }

            self.cursor += self.source_channels;
            written += 1;
        }

        self.frames += written as u64;
        written
    }

    /// Make sure a full frame is pending, pulling from the source if needed.
    fn ensure_pending(&mut self) -> bool {
        while self.cursor + self.source_channels > self.pending.len() {
            if self.outcome.is_some() {
                return false;
            }

            match self.source.next_chunk() {
                Ok(Some(chunk)) => {
                    self.pending = chunk;
                    self.cursor = 0;
                }
                Ok(None) => self.outcome = Some(Ok(())),
                Err(e) => self.outcome = Some(Err(e)),
            }
        }
        true
    }

    /// Run the completion callback, releasing the stream.
    pub fn complete(self) {
        let Self {
            source,
            on_complete,
            frames,
            outcome,
            ..
        } = self;

        // Close the stream before signalling
        drop(source);

        on_complete(outcome.unwrap_or(Ok(())).map(|()| frames));
    }
}

/// Pick the source channel feeding output channel `ch`.
pub const fn map_channel(ch: usize, source_channels: usize) -> usize {
    if ch < source_channels {
        ch
    } else if source_channels == 1 {
        0
    } else {
        ch % source_channels
    }
}
