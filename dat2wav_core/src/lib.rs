//! Decode IMOS acoustic data-logger `.DAT` records into signed PCM audio.
//!
//! A record is a fixed count of text header lines, a block of big-endian
//! unsigned 16-bit samples sized by the header metadata, and a variable
//! count of trailing marker lines. [`run`] converts one record into a
//! mono 16-bit WAV file next to it; [`inspect`] reads a record without
//! producing audio. The individual parsing stages are public so callers
//! that frame records with their own I/O can use them directly.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info};
use thiserror::Error;

pub mod record;
pub mod samples;
pub mod sink;

pub use record::{RecordHeader, RecordLayout, RecordMetadata};
pub use sink::{AudioFormat, AudioSink, WavFileSink};

/// A WAV data chunk is capped at `u32::MAX` bytes, two per sample.
const MAX_WAV_SAMPLES: u64 = (u32::MAX / 2) as u64;

/// Errors that can occur while decoding a logger record.
#[derive(Debug, Error)]
pub enum Dat2WavError {
    /// The input file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Wrapper around IO errors encountered while reading the record.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Wrapper around errors produced by the WAV writer.
    #[error(transparent)]
    Wav(#[from] hound::Error),

    /// The stream ended before the fixed count of header lines was read.
    #[error("record header ended after {read} of {expected} lines")]
    TruncatedHeader { expected: usize, read: usize },

    /// A text line overran the size cap without a terminator.
    #[error("text line exceeds {max} bytes without a terminator")]
    UnterminatedLine { max: usize },

    /// The stream ended before the minimum count of footer lines was read.
    #[error("record footer has {read} lines, at least {min} required")]
    TruncatedFooter { min: usize, read: usize },

    /// The sample block holds fewer samples than the header declares.
    #[error("sample block ended after {read} of {expected} samples")]
    IncompleteSampleData { expected: u64, read: u64 },

    /// The header metadata derives a sample count of zero.
    #[error("header declares zero samples (sample rate {sample_rate}, duration {duration_secs} s)")]
    ZeroSampleCount { sample_rate: u32, duration_secs: u32 },

    /// The header declares more samples than a WAV data chunk can hold.
    #[error("record declares {samples} samples, more than a WAV file can hold")]
    RecordTooLarge { samples: u64 },

    /// The header flags a channel layout other than single-channel.
    #[error("unsupported channel layout: {channels} active channels")]
    UnsupportedChannelCount { channels: u32 },

    /// The audio sink reported a different frame count than it was handed.
    #[error("audio sink wrote {written} of {expected} frames")]
    SinkWriteMismatch { expected: u64, written: u64 },

    /// The output file exists and overwriting was not requested.
    #[error("output file {} already exists", path.display())]
    OutputExists { path: PathBuf },
}

/// Configuration for decoding one record file.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path of the `.DAT` record to decode.
    pub input_path: PathBuf,
    /// Directory receiving the WAV file; next to the input when absent.
    pub output_dir: Option<PathBuf>,
    /// Layout parameters of the record format.
    pub layout: RecordLayout,
    /// Allow replacing an existing output file.
    pub overwrite: bool,
}

impl Config {
    /// Configuration with the default layout, writing next to the input.
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        Self::builder(input).build()
    }

    /// Start building a configuration for `input`.
    pub fn builder<P: AsRef<Path>>(input: P) -> ConfigBuilder {
        ConfigBuilder {
            input_path: input.as_ref().to_path_buf(),
            output_dir: None,
            layout: RecordLayout::default(),
            overwrite: false,
        }
    }

    /// Path the WAV file will be written to.
    pub fn output_path(&self) -> PathBuf {
        let target = self.input_path.with_extension("wav");
        match (&self.output_dir, target.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => target,
        }
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input_path: PathBuf,
    output_dir: Option<PathBuf>,
    layout: RecordLayout,
    overwrite: bool,
}

impl ConfigBuilder {
    /// Write the WAV file into `dir` instead of next to the input.
    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Use a non-default record layout.
    pub fn layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Allow replacing an existing output file.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn build(self) -> Config {
        Config {
            input_path: self.input_path,
            output_dir: self.output_dir,
            layout: self.layout,
            overwrite: self.overwrite,
        }
    }
}

/// One fully framed record: header lines, raw samples, footer lines.
#[derive(Clone, Debug)]
pub struct DatRecord {
    pub header: RecordHeader,
    pub samples: Vec<u16>,
    pub footer: Vec<String>,
}

/// Summary of a completed conversion.
#[derive(Clone, Copy, Debug)]
pub struct Report {
    /// Format descriptor handed to the audio sink.
    pub format: AudioFormat,
    /// Frames the sink reported written.
    pub frames_written: u64,
}

/// Metadata of a record, gathered without producing audio.
#[derive(Clone, Debug)]
pub struct RecordInfo {
    pub sample_rate: u32,
    pub duration_secs: u32,
    pub sample_count: u64,
    /// Channel count flagged by the header, when the filter lines parse.
    pub channel_count: Option<u32>,
    pub footer_lines: usize,
    /// Wall-clock stamp of the first sample, when the footer carries one.
    pub first_data: Option<NaiveDateTime>,
    /// Wall-clock stamp of record finalisation, when the footer carries one.
    pub finalised: Option<NaiveDateTime>,
}

/// Frame one record from disk: header, sample block, footer.
///
/// Phases run strictly in file order and the first failure aborts the
/// whole read. The input handle is released before this returns, on
/// success and on every error path.
pub fn read_record(config: &Config) -> Result<DatRecord, Dat2WavError> {
    let file = File::open(&config.input_path).map_err(|source| Dat2WavError::FileOpen {
        path: config.input_path.clone(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let header = record::read_header(&mut reader, &config.layout)?;
    if let Some(channels) = header.channel_count() {
        if channels != 1 {
            return Err(Dat2WavError::UnsupportedChannelCount { channels });
        }
    }

    let metadata = header.metadata();
    let sample_count = metadata.sample_count();
    if sample_count == 0 {
        return Err(Dat2WavError::ZeroSampleCount {
            sample_rate: metadata.sample_rate,
            duration_secs: metadata.duration_secs,
        });
    }
    if sample_count > MAX_WAV_SAMPLES {
        return Err(Dat2WavError::RecordTooLarge {
            samples: sample_count,
        });
    }
    debug!(
        "expecting {sample_count} samples at {} Hz",
        metadata.sample_rate
    );

    let samples = samples::read_sample_block(&mut reader, sample_count)?;
    let footer = record::read_footer(&mut reader, &config.layout)?;

    Ok(DatRecord {
        header,
        samples,
        footer,
    })
}

/// Decode the configured record and hand the signed samples to `sink`.
pub fn convert_with_sink(
    config: &Config,
    sink: &mut dyn AudioSink,
) -> Result<Report, Dat2WavError> {
    let record = read_record(config)?;
    let metadata = record.header.metadata();
    let signed = samples::to_signed(&record.samples);

    let format = AudioFormat {
        sample_rate: metadata.sample_rate,
        frame_count: signed.len() as u32,
        channel_count: 1,
        bit_depth: 16,
    };
    let expected = signed.len() as u64;
    let written = sink.write(&format, &signed)?;
    if written != expected {
        return Err(Dat2WavError::SinkWriteMismatch { expected, written });
    }

    info!(
        "converted {expected} samples at {} Hz from {}",
        metadata.sample_rate,
        config.input_path.display()
    );
    Ok(Report {
        format,
        frames_written: written,
    })
}

/// Decode the configured record into a WAV file.
pub fn run(config: &Config) -> Result<Report, Dat2WavError> {
    let output_path = config.output_path();
    if output_path.exists() && !config.overwrite {
        return Err(Dat2WavError::OutputExists { path: output_path });
    }

    let mut sink = WavFileSink::new(&output_path);
    convert_with_sink(config, &mut sink)
}

/// Read a record and report its metadata without producing audio.
pub fn inspect(config: &Config) -> Result<RecordInfo, Dat2WavError> {
    let record = read_record(config)?;
    let metadata = record.header.metadata();
    let (first_data, finalised) = record::footer_times(&record.footer);

    Ok(RecordInfo {
        sample_rate: metadata.sample_rate,
        duration_secs: metadata.duration_secs,
        sample_count: metadata.sample_count(),
        channel_count: record.header.channel_count(),
        footer_lines: record.footer.len(),
        first_data,
        finalised,
    })
}
