//! Pull-based sample streams.

use clink_core::Result;

/// A finite, forward-only stream of interleaved `f32` frames.
pub trait SampleSource: Send {
    /// Sample rate of the produced frames.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels.
    fn channels(&self) -> u16;

    /// Pull the next chunk of interleaved samples.
    ///
    /// Chunks always hold whole frames and may be empty. `Ok(None)` marks
    /// the end of the stream.
    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        (**self).next_chunk()
    }
}
