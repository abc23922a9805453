//! Sound file decoding using symphonia.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fs::File;
use std::path::{Path, PathBuf};

use clink_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
};
use symphonia::default::formats::{FlacReader, MpaReader, OggReader, WavReader};
use tracing::{debug, error};

use crate::source::SampleSource;

/// Container format, chosen from the file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFormat {
    Flac,
    Wav,
    Mp3,
    /// Anything else is read as Ogg/Vorbis.
    Fallback,
}

impl SoundFormat {
    /// Classify a path by its suffix (case-sensitive).
    pub fn from_path(path: &Path) -> Self {
        let name = path.as_os_str().to_string_lossy();
        if name.ends_with(".flac") {
            Self::Flac
        } else if name.ends_with(".wav") {
            Self::Wav
        } else if name.ends_with(".mp3") {
            Self::Mp3
        } else {
            Self::Fallback
        }
    }

    fn open_reader(
        self,
        mss: MediaSourceStream,
        options: &FormatOptions,
    ) -> symphonia::core::errors::Result<Box<dyn FormatReader>> {
        Ok(match self {
            Self::Flac => Box::new(FlacReader::try_new(mss, options)?),
            Self::Wav => Box::new(WavReader::try_new(mss, options)?),
            Self::Mp3 => Box::new(MpaReader::try_new(mss, options)?),
            Self::Fallback => Box::new(OggReader::try_new(mss, options)?),
        })
    }
}

/// Decoder for a single sound file.
///
/// Holds the file open until dropped.
pub struct SoundDecoder {
    path: PathBuf,
    format: SoundFormat,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    finished: bool,
}

impl SoundDecoder {
    /// Open a sound file and prepare its decoder.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::decode(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let format = SoundFormat::from_path(path);
        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let reader = format
            .open_reader(mss, &format_opts)
            .map_err(|e| Error::decode(path, format!("{format:?} reader rejected stream: {e}")))?;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::decode(path, "no audio tracks found"))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::decode(path, "unknown sample rate"))?;
        #[allow(clippy::cast_possible_truncation)]
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::decode(path, format!("failed to create decoder: {e}")))?;

        debug!(
            "Opened {} as {:?}: {} Hz, {} channels",
            path.display(),
            format,
            sample_rate,
            channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            format,
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            finished: false,
        })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the container format used.
    pub const fn format(&self) -> SoundFormat {
        self.format
    }

    /// Get the total duration in seconds (if known).
    pub fn duration(&self) -> Option<f64> {
        let track = self
            .reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)?;

        let time_base = track.codec_params.time_base?;
        let n_frames = track.codec_params.n_frames?;
        let time = time_base.calc_time(n_frames);

        #[allow(clippy::cast_precision_loss)]
        Some(time.seconds as f64 + time.frac)
    }
}

impl SampleSource for SoundDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::decode(&self.path, format!("failed to read packet: {e}")));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let mut samples =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    samples.copy_interleaved_ref(decoded);
                    return Ok(Some(samples.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Log and skip corrupt frames
                    error!("Decode error in {} (skipping): {e}", self.path.display());
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::decode(&self.path, format!("decode failed: {e}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_wav;

    #[test]
    fn test_format_from_suffix() {
        assert_eq!(SoundFormat::from_path(Path::new("a/ding.flac")), SoundFormat::Flac);
        assert_eq!(SoundFormat::from_path(Path::new("a/ding.wav")), SoundFormat::Wav);
        assert_eq!(SoundFormat::from_path(Path::new("a/ding.mp3")), SoundFormat::Mp3);
        assert_eq!(SoundFormat::from_path(Path::new("a/ding.ogg")), SoundFormat::Fallback);
        assert_eq!(SoundFormat::from_path(Path::new("a/ding")), SoundFormat::Fallback);
    }

    #[test]
    fn test_format_suffix_is_case_sensitive() {
        assert_eq!(SoundFormat::from_path(Path::new("DING.WAV")), SoundFormat::Fallback);
        assert_eq!(SoundFormat::from_path(Path::new("ding.Mp3")), SoundFormat::Fallback);
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ding.wav");
        write_wav(&path, 22_050, 2, 2_205);

        let mut decoder = SoundDecoder::open(&path).unwrap();
        assert_eq!(decoder.format(), SoundFormat::Wav);
        assert_eq!(decoder.sample_rate(), 22_050);
        assert_eq!(decoder.channels(), 2);

        let mut samples = 0;
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            assert_eq!(chunk.len() % 2, 0);
            samples += chunk.len();
        }
        assert_eq!(samples, 2_205 * 2);

        // Stays exhausted
        assert!(decoder.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SoundDecoder::open(dir.path().join("missing.wav"));
        assert!(matches!(result, Err(Error::AudioDecode { .. })));
    }

    #[test]
    fn test_corrupt_header_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let result = SoundDecoder::open(&path);
        assert!(matches!(result, Err(Error::AudioDecode { .. })));
    }

    #[test]
    fn test_wav_data_under_fallback_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ding");
        write_wav(&path, 44_100, 1, 100);

        // Unsuffixed files go to the Ogg reader, which rejects RIFF data
        let result = SoundDecoder::open(&path);
        assert!(matches!(result, Err(Error::AudioDecode { .. })));
    }
}
