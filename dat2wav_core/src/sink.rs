use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;

use crate::Dat2WavError;

/// Format descriptor handed to an [`AudioSink`] together with the samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second.
    pub sample_rate: u32,
    /// Total frames in the block.
    pub frame_count: u32,
    /// Channels per frame; this format only ever produces mono.
    pub channel_count: u8,
    /// Bits per sample.
    pub bit_depth: u8,
}

/// Destination for a decoded record.
///
/// The container encoder is a collaborator of the pipeline rather than a
/// part of it; anything able to accept a format descriptor and a block
/// of signed samples can stand in, which the tests use to observe the
/// pipeline without touching the filesystem.
pub trait AudioSink {
    /// Write `samples` in the described format.
    ///
    /// Returns the number of frames actually written; the pipeline treats
    /// any difference from the handed frame count as a hard error.
    fn write(&mut self, format: &AudioFormat, samples: &[i16]) -> Result<u64, Dat2WavError>;
}

/// [`AudioSink`] producing a PCM WAV file.
#[derive(Debug)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSink for WavFileSink {
    fn write(&mut self, format: &AudioFormat, samples: &[i16]) -> Result<u64, Dat2WavError> {
        let spec = WavSpec {
            channels: u16::from(format.channel_count),
            sample_rate: format.sample_rate,
            bits_per_sample: u16::from(format.bit_depth),
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(&self.path, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        let frames = u64::from(writer.len()) / u64::from(spec.channels.max(1));
        writer.finalize()?;

        info!("written {}", self.path.display());
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use hound::WavReader;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn wav_sink_writes_a_readable_mono_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let format = AudioFormat {
            sample_rate: 8_000,
            frame_count: 4,
            channel_count: 1,
            bit_depth: 16,
        };
        let samples = [i16::MIN, -1, 0, i16::MAX];

        let mut sink = WavFileSink::new(&path);
        let written = sink.write(&format, &samples).unwrap();
        assert_eq!(written, 4);

        let mut reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);

        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }
}
