use std::io::Read;

use log::debug;

use crate::Dat2WavError;

/// Read exactly `sample_count` big-endian 16-bit samples from `reader`.
///
/// The block is consumed with one bulk read of `sample_count * 2` bytes;
/// a short read fails without returning a partial block. Conversion from
/// big-endian to host order is unconditional, the on-disk format is not
/// a negotiated property of the stream. On success the reader is
/// positioned on the byte immediately after the block.
pub fn read_sample_block<R: Read>(
    reader: &mut R,
    sample_count: u64,
) -> Result<Vec<u16>, Dat2WavError> {
    let byte_len = sample_count.saturating_mul(2);
    let mut bytes = Vec::with_capacity(byte_len as usize);
    let read = reader.by_ref().take(byte_len).read_to_end(&mut bytes)? as u64;

    if read < byte_len {
        return Err(Dat2WavError::IncompleteSampleData {
            expected: sample_count,
            read: read / 2,
        });
    }

    debug!("read sample block of {sample_count} samples ({byte_len} bytes)");
    Ok(decode_big_endian(&bytes))
}

/// Decode a buffer of big-endian sample bytes into host-order values.
pub fn decode_big_endian(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode host-order samples back into big-endian bytes.
pub fn encode_big_endian(samples: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_be_bytes());
    }
    bytes
}

/// Map unsigned 16-bit PCM onto the signed range by midpoint subtraction.
///
/// Element order is preserved. The function is total: 0..=65535 lands
/// exactly on -32768..=32767, so the narrowing never wraps.
pub fn to_signed(raw: &[u16]) -> Vec<i16> {
    raw.iter()
        .map(|&sample| (i32::from(sample) - 32_768) as i16)
        .collect()
}
