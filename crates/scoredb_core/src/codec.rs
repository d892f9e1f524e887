//! Binary layout of every on-disk record.
//!
//! All integers are big-endian.
//!
//! ## Data block (`<name>.data`)
//!
//! ```text
//! | block_size (4) | score (S) | payload (block_size - S) |
//! ```
//!
//! `block_size = S + len(payload)`. An [`Addr`] points at the payload only.
//!
//! ## Index record (`<name>.idx`), fixed width `8 + S`
//!
//! ```text
//! | pos (4) | size (4) | score (S) |
//! ```
//!
//! ## Key record (`<name>.keys`), fixed width `16 + S`
//!
//! ```text
//! | key (16) | score (S) |
//! ```

use crate::error::{CoreError, CoreResult};
use crate::keys::{Key, KEY_SIZE};
use crate::score::Score;

/// Size of the length prefix that opens every data block.
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Size of the `pos` and `size` fields of an index record.
const INDEX_FIXED_SIZE: usize = 8;

/// Location of a payload inside the data log.
///
/// `position` is the offset of the first payload byte, past the length
/// prefix and the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addr {
    /// Offset of the payload within the data log.
    pub position: u64,
    /// Payload length in bytes.
    pub size: u64,
}

impl Addr {
    /// Creates an address.
    #[must_use]
    pub const fn new(position: u64, size: u64) -> Self {
        Self { position, size }
    }

    /// Offset one past the last payload byte.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.position + self.size
    }

    /// Fails unless both fields fit the 32-bit index record.
    pub fn check_indexable(&self) -> CoreResult<()> {
        if self.position > u64::from(u32::MAX) {
            return Err(CoreError::AddressOverflow {
                position: self.position,
            });
        }
        if self.size > u64::from(u32::MAX) {
            return Err(CoreError::AddressOverflow {
                position: self.end(),
            });
        }
        Ok(())
    }
}

/// Total on-disk length of a block holding `payload_len` bytes.
#[must_use]
pub const fn block_len(score_size: usize, payload_len: u64) -> u64 {
    (BLOCK_HEADER_SIZE + score_size) as u64 + payload_len
}

/// Address of the payload of a block that starts at `block_start`.
#[must_use]
pub const fn payload_addr(block_start: u64, score_size: usize, payload_len: u64) -> Addr {
    Addr::new(
        block_start + (BLOCK_HEADER_SIZE + score_size) as u64,
        payload_len,
    )
}

/// Encodes a data block.
///
/// # Errors
///
/// Returns [`CoreError::AddressOverflow`] if the block is too large for the
/// 32-bit length prefix.
pub fn encode_block(score: &Score, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let block_size = u32::try_from(score.len() + payload.len()).map_err(|_| {
        CoreError::AddressOverflow {
            position: payload.len() as u64,
        }
    })?;

    let mut buf = Vec::with_capacity(BLOCK_HEADER_SIZE + block_size as usize);
    buf.extend_from_slice(&block_size.to_be_bytes());
    buf.extend_from_slice(score.as_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes the length prefix of a block into its payload length.
///
/// # Errors
///
/// Returns a corruption error if the prefix is shorter than the score
/// width, which no writer can produce.
pub fn decode_block_header(header: [u8; BLOCK_HEADER_SIZE], score_size: usize) -> CoreResult<u64> {
    let block_size = u64::from(u32::from_be_bytes(header));
    if block_size < score_size as u64 {
        return Err(CoreError::corruption(format!(
            "block size {block_size} is smaller than the {score_size}-byte score"
        )));
    }
    Ok(block_size - score_size as u64)
}

/// Width of an index record for the given score width.
#[must_use]
pub const fn index_record_len(score_size: usize) -> usize {
    INDEX_FIXED_SIZE + score_size
}

/// Encodes an index record.
///
/// # Errors
///
/// Returns [`CoreError::AddressOverflow`] if the address does not fit.
pub fn encode_index_record(score: &Score, addr: Addr) -> CoreResult<Vec<u8>> {
    addr.check_indexable()?;

    let mut buf = Vec::with_capacity(index_record_len(score.len()));
    buf.extend_from_slice(&(addr.position as u32).to_be_bytes());
    buf.extend_from_slice(&(addr.size as u32).to_be_bytes());
    buf.extend_from_slice(score.as_bytes());
    Ok(buf)
}

/// Decodes an index record.
///
/// # Errors
///
/// Returns a corruption error if the record has the wrong width.
pub fn decode_index_record(record: &[u8], score_size: usize) -> CoreResult<(Score, Addr)> {
    if record.len() != index_record_len(score_size) {
        return Err(CoreError::corruption(format!(
            "index record is {} bytes, expected {}",
            record.len(),
            index_record_len(score_size)
        )));
    }

    let position = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
    let size = u32::from_be_bytes([record[4], record[5], record[6], record[7]]);
    let score = Score::from_slice(&record[INDEX_FIXED_SIZE..])
        .ok_or_else(|| CoreError::corruption("index record holds an invalid score"))?;

    Ok((score, Addr::new(u64::from(position), u64::from(size))))
}

/// Width of a key record for the given score width.
#[must_use]
pub const fn key_record_len(score_size: usize) -> usize {
    KEY_SIZE + score_size
}

/// Encodes a key record.
#[must_use]
pub fn encode_key_record(key: &Key, score: &Score) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key_record_len(score.len()));
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(score.as_bytes());
    buf
}

/// Decodes a key record.
///
/// # Errors
///
/// Returns a corruption error if the record has the wrong width.
pub fn decode_key_record(record: &[u8], score_size: usize) -> CoreResult<(Key, Score)> {
    if record.len() != key_record_len(score_size) {
        return Err(CoreError::corruption(format!(
            "key record is {} bytes, expected {}",
            record.len(),
            key_record_len(score_size)
        )));
    }

    let key = Key::from_slice(&record[..KEY_SIZE])
        .ok_or_else(|| CoreError::corruption("key record holds an invalid key"))?;
    let score = Score::from_slice(&record[KEY_SIZE..])
        .ok_or_else(|| CoreError::corruption("key record holds an invalid score"))?;

    Ok((key, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreKind;

    #[test]
    fn block_layout() {
        let score = ScoreKind::Md5.compute(b"fox");
        let block = encode_block(&score, b"fox").unwrap();

        assert_eq!(block.len(), 4 + 16 + 3);
        assert_eq!(&block[..4], &19u32.to_be_bytes());
        assert_eq!(&block[4..20], score.as_bytes());
        assert_eq!(&block[20..], b"fox");
        assert_eq!(block_len(16, 3), block.len() as u64);
    }

    #[test]
    fn empty_payload_block() {
        let score = ScoreKind::Xxh64.compute(b"");
        let block = encode_block(&score, b"").unwrap();

        assert_eq!(block.len(), 12);
        let header = [block[0], block[1], block[2], block[3]];
        assert_eq!(decode_block_header(header, 8).unwrap(), 0);
    }

    #[test]
    fn header_shorter_than_score_is_corrupt() {
        let result = decode_block_header(7u32.to_be_bytes(), 8);
        assert!(matches!(result, Err(CoreError::Corruption { .. })));
    }

    #[test]
    fn payload_addr_skips_header_and_score() {
        let addr = payload_addr(23, 16, 5);
        assert_eq!(addr, Addr::new(43, 5));
        assert_eq!(addr.end(), 48);
    }

    #[test]
    fn index_record_layout() {
        let score = ScoreKind::Md5.compute(b"quick");
        let record = encode_index_record(&score, Addr::new(0x0102_0304, 5)).unwrap();

        assert_eq!(record.len(), index_record_len(16));
        assert_eq!(&record[..8], &[1, 2, 3, 4, 0, 0, 0, 5]);

        let (decoded, addr) = decode_index_record(&record, 16).unwrap();
        assert_eq!(decoded, score);
        assert_eq!(addr, Addr::new(0x0102_0304, 5));
    }

    #[test]
    fn index_record_wrong_width() {
        let result = decode_index_record(&[0u8; 20], 16);
        assert!(matches!(result, Err(CoreError::Corruption { .. })));
    }

    #[test]
    fn index_record_overflow() {
        let score = ScoreKind::Md5.compute(b"big");
        let result = encode_index_record(&score, Addr::new(u64::from(u32::MAX) + 1, 1));
        assert!(matches!(result, Err(CoreError::AddressOverflow { .. })));
    }

    #[test]
    fn key_record_layout() {
        let key = Key::from_bytes([7u8; KEY_SIZE]);
        let score = ScoreKind::Xxh64.compute(b"v1");
        let record = encode_key_record(&key, &score);

        assert_eq!(record.len(), key_record_len(8));
        let (k, s) = decode_key_record(&record, 8).unwrap();
        assert_eq!(k, key);
        assert_eq!(s, score);
    }
}
