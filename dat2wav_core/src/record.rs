use std::io::{BufRead, Read};

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::Dat2WavError;

/// Layout parameters of a logger record.
///
/// The reference instance of the format uses five header lines, four to
/// six footer lines and a 64 byte cap per line; format variants can
/// adjust the counts without touching the parsing logic.
#[derive(Clone, Debug)]
pub struct RecordLayout {
    /// Fixed count of leading text lines.
    pub header_lines: usize,
    /// Index of the header line carrying sample rate and duration.
    pub metadata_line: usize,
    /// Fewer trailing lines than this is a format violation.
    pub min_footer_lines: usize,
    /// Trailing lines are read greedily up to this count.
    pub max_footer_lines: usize,
    /// Maximum size of one text line in bytes, terminator included.
    pub max_line_len: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            header_lines: 5,
            metadata_line: 2,
            min_footer_lines: 4,
            max_footer_lines: 6,
            max_line_len: 64,
        }
    }
}

/// Sample rate and duration declared by the metadata header line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Samples per second.
    pub sample_rate: u32,
    /// Recording length in whole seconds.
    pub duration_secs: u32,
}

impl RecordMetadata {
    /// Number of samples the record declares to hold.
    pub fn sample_count(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.duration_secs)
    }
}

/// The fixed-count leading text lines of a record.
#[derive(Clone, Debug)]
pub struct RecordHeader {
    lines: Vec<String>,
    metadata: RecordMetadata,
}

impl RecordHeader {
    /// The header lines in file order, terminators stripped.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Values extracted from the metadata line.
    pub fn metadata(&self) -> RecordMetadata {
        self.metadata
    }

    /// Active channel count summed from the filter flag lines.
    ///
    /// The logger writes `Filter 0 C0=<n> C1=<n> ...` and
    /// `Filter 1 C2=<n> C3=<n> ...` on lines 3 and 4; the four flags sum
    /// to the channel count. Files whose filter lines do not match the
    /// pattern read as `None` and are assumed single-channel.
    pub fn channel_count(&self) -> Option<u32> {
        let (c0, c1) = channel_flags(self.lines.get(3)?)?;
        let (c2, c3) = channel_flags(self.lines.get(4)?)?;
        Some(c0 + c1 + c2 + c3)
    }
}

/// Read the fixed count of header lines from the start of a record.
///
/// Fails without a partial result if the stream ends early. Metadata
/// extraction is tolerant (see [`extract_metadata`]); the caller is
/// responsible for rejecting a derived sample count of zero.
pub fn read_header<R: BufRead>(
    reader: &mut R,
    layout: &RecordLayout,
) -> Result<RecordHeader, Dat2WavError> {
    let mut lines = Vec::with_capacity(layout.header_lines);
    for index in 0..layout.header_lines {
        match read_line(reader, layout.max_line_len)? {
            Some(line) => {
                debug!("header[{index}] {line:?}");
                lines.push(line);
            }
            None => {
                return Err(Dat2WavError::TruncatedHeader {
                    expected: layout.header_lines,
                    read: index,
                })
            }
        }
    }

    let metadata = lines
        .get(layout.metadata_line)
        .map(|line| extract_metadata(line))
        .unwrap_or_default();

    Ok(RecordHeader { lines, metadata })
}

/// Read the trailing marker lines of a record.
///
/// Lines are consumed greedily until end of stream or the layout maximum,
/// whichever comes first; their content is opaque. Fewer lines than the
/// layout minimum is a format violation.
pub fn read_footer<R: BufRead>(
    reader: &mut R,
    layout: &RecordLayout,
) -> Result<Vec<String>, Dat2WavError> {
    let mut lines = Vec::new();
    while lines.len() < layout.max_footer_lines {
        match read_line(reader, layout.max_line_len)? {
            Some(line) => {
                debug!("footer[{}] {line:?}", lines.len());
                lines.push(line);
            }
            None => break,
        }
    }

    if lines.len() < layout.min_footer_lines {
        return Err(Dat2WavError::TruncatedFooter {
            min: layout.min_footer_lines,
            read: lines.len(),
        });
    }

    Ok(lines)
}

/// Read one text line of at most `max_len` bytes, terminator included.
///
/// Returns `None` at end of stream. A final line terminated by the end of
/// the stream instead of a newline is returned as-is; a line that hits
/// the cap without a terminator is an error, never a silent truncation.
fn read_line<R: BufRead>(reader: &mut R, max_len: usize) -> Result<Option<String>, Dat2WavError> {
    let mut buf = Vec::with_capacity(max_len);
    let read = reader
        .by_ref()
        .take(max_len as u64)
        .read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read == max_len {
        return Err(Dat2WavError::UnterminatedLine { max: max_len });
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Extract `Sample Rate <uint> Duration <uint>` from a header line.
///
/// Extraction is tolerant: each field keeps the value zero when its part
/// of the pattern does not match, including a digit run too large for
/// the field. Callers must reject a derived sample count of zero before
/// using the result.
pub fn extract_metadata(line: &str) -> RecordMetadata {
    let mut metadata = RecordMetadata::default();

    let Some(rest) = line.strip_prefix("Sample Rate ") else {
        return metadata;
    };
    let Some((sample_rate, rest)) = leading_uint(rest) else {
        return metadata;
    };
    metadata.sample_rate = sample_rate;

    if let Some(rest) = rest.strip_prefix(" Duration ") {
        if let Some((duration_secs, _)) = leading_uint(rest) {
            metadata.duration_secs = duration_secs;
        }
    }

    metadata
}

/// Start and end wall-clock stamps extracted from a record footer.
///
/// The logger writes `First Data` and `Finalised` lines carrying a
/// `YYYY/MM/DD HH:MM:SS` stamp followed by a trailing sub-second counter
/// in 1/65536 second units. Footers without the stamps yield `None`.
pub fn footer_times(footer: &[String]) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    (
        footer.get(1).and_then(|line| line_timestamp(line)),
        footer.get(2).and_then(|line| line_timestamp(line)),
    )
}

fn line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let stamp = find_datetime(line)?;
    match trailing_subseconds(line) {
        Some(ticks) => {
            let micros = i64::from(ticks) * 1_000_000 / 65_536;
            stamp.checked_add_signed(Duration::microseconds(micros))
        }
        None => Some(stamp),
    }
}

/// Locate a `YYYY/MM/DD HH:MM:SS` stamp anywhere in `line`.
fn find_datetime(line: &str) -> Option<NaiveDateTime> {
    const SHAPE: &[u8] = b"NNNN/NN/NN NN:NN:NN";

    let bytes = line.as_bytes();
    for start in 0..bytes.len().saturating_sub(SHAPE.len() - 1) {
        let window = &bytes[start..start + SHAPE.len()];
        let matches = SHAPE.iter().zip(window).all(|(&shape, &byte)| match shape {
            b'N' => byte.is_ascii_digit(),
            _ => byte == shape,
        });
        if !matches {
            continue;
        }
        let text = std::str::from_utf8(window).ok()?;
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, "%Y/%m/%d %H:%M:%S") {
            return Some(stamp);
        }
    }
    None
}

/// The 5-digit sub-second counter the logger appends to timestamp lines.
fn trailing_subseconds(line: &str) -> Option<u32> {
    let bytes = line.trim_end().as_bytes();
    if bytes.len() < 5 {
        return None;
    }
    let tail = &bytes[bytes.len() - 5..];
    if !tail.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(tail).ok()?.parse().ok()
}

/// Extract the two channel flags from a `Filter <n> C<a>=<v> C<b>=<v>` line.
fn channel_flags(line: &str) -> Option<(u32, u32)> {
    let rest = line.strip_prefix("Filter ")?;
    let (_, rest) = leading_uint(rest)?;
    let (first, rest) = flag_value(rest)?;
    let (second, _) = flag_value(rest)?;
    Some((first, second))
}

fn flag_value(input: &str) -> Option<(u32, &str)> {
    let rest = input.strip_prefix(" C")?;
    let (_, rest) = leading_uint(rest)?;
    let rest = rest.strip_prefix('=')?;
    leading_uint(rest)
}

/// Split a leading run of ASCII digits off `input` and parse it.
fn leading_uint(input: &str) -> Option<(u32, &str)> {
    let end = input
        .bytes()
        .position(|byte| !byte.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let (run, rest) = input.split_at(end);
    Some((run.parse().ok()?, rest))
}
