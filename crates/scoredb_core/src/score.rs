//! Content scores.
//!
//! A [`Score`] is the deterministic digest of a payload and the only key
//! under which content is stored. Two digest schemes are available through
//! [`ScoreKind`]; the scheme is fixed per store.

use std::fmt;

/// Largest score width of any supported scheme.
pub const MAX_SCORE_SIZE: usize = 16;

/// Digest scheme used to derive scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScoreKind {
    /// 16-byte MD5 digest. Recommended for general use.
    #[default]
    Md5,
    /// 8-byte XXH64 digest (seed 0, big-endian).
    ///
    /// Smaller and faster, but only safe for bounded stores: the birthday
    /// bound puts the collision probability near 1e-7 at ~1.9 million
    /// entries and near 50% at ~5 billion. A collision would make two
    /// payloads share one address, so pick [`ScoreKind::Md5`] for stores
    /// expected to grow past a few million entries.
    Xxh64,
}

impl ScoreKind {
    /// Width in bytes of scores produced by this scheme.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Xxh64 => 8,
        }
    }

    /// Short lowercase name, as accepted by [`ScoreKind::from_name`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Xxh64 => "xxh64",
        }
    }

    /// Parses a scheme name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "xxh64" => Some(Self::Xxh64),
            _ => None,
        }
    }

    /// Computes the score of a payload.
    ///
    /// Pure and stable across processes and platforms.
    #[must_use]
    pub fn compute(self, payload: &[u8]) -> Score {
        match self {
            Self::Md5 => Score::from_array(md5::compute(payload).0),
            Self::Xxh64 => {
                let digest = xxhash_rust::xxh64::xxh64(payload, 0);
                Score::from_array(digest.to_be_bytes())
            }
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-width digest identifying a payload.
///
/// Equality is byte-wise; scores of different widths never compare equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    len: u8,
    bytes: [u8; MAX_SCORE_SIZE],
}

impl Score {
    fn from_array<const N: usize>(digest: [u8; N]) -> Self {
        let mut bytes = [0u8; MAX_SCORE_SIZE];
        bytes[..N].copy_from_slice(&digest);
        Self {
            len: N as u8,
            bytes,
        }
    }

    /// Creates a score from raw bytes.
    ///
    /// Returns `None` unless the slice has the width of a supported scheme.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != ScoreKind::Md5.size() && slice.len() != ScoreKind::Xxh64.size() {
            return None;
        }
        let mut bytes = [0u8; MAX_SCORE_SIZE];
        bytes[..slice.len()].copy_from_slice(slice);
        Some(Self {
            len: slice.len() as u8,
            bytes,
        })
    }

    /// Parses a lowercase or uppercase hex string.
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        let raw = hex::decode(text).ok()?;
        Self::from_slice(&raw)
    }

    /// Returns the score bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Width of the score in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`; present for API symmetry with `len`.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lowercase hex representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl AsRef<[u8]> for Score {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score({})", self.to_hex())
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_vector() {
        let score = ScoreKind::Md5.compute(b"brown fox");
        assert_eq!(score.to_string(), "fdd929ffb0a167ab33e8b1a8905858cf");
        assert_eq!(score.len(), 16);
    }

    #[test]
    fn xxh64_vector() {
        let score = ScoreKind::Xxh64.compute(b"brown fox");
        assert_eq!(score.to_string(), "7113fd84e8973eb2");
        assert_eq!(score.len(), 8);
    }

    #[test]
    fn empty_payload_has_a_score() {
        let score = ScoreKind::Md5.compute(b"");
        assert_eq!(score.to_string(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn equal_payloads_equal_scores() {
        for kind in [ScoreKind::Md5, ScoreKind::Xxh64] {
            assert_eq!(kind.compute(b"same"), kind.compute(b"same"));
            assert_ne!(kind.compute(b"same"), kind.compute(b"Same"));
        }
    }

    #[test]
    fn widths_never_collide() {
        let md5 = ScoreKind::Md5.compute(b"x");
        let short = Score::from_slice(&md5.as_bytes()[..8]).unwrap();
        assert_ne!(md5, short);
    }

    #[test]
    fn hex_parsing() {
        let score = Score::from_hex("fdd929ffb0a167ab33e8b1a8905858cf").unwrap();
        assert_eq!(score, ScoreKind::Md5.compute(b"brown fox"));
        assert_eq!(
            Score::from_hex("7113FD84E8973EB2").unwrap(),
            ScoreKind::Xxh64.compute(b"brown fox")
        );

        assert!(Score::from_hex("zz").is_none());
        assert!(Score::from_hex("abcd").is_none());
    }

    #[test]
    fn from_slice_rejects_odd_widths() {
        assert!(Score::from_slice(&[0u8; 16]).is_some());
        assert!(Score::from_slice(&[0u8; 8]).is_some());
        assert!(Score::from_slice(&[0u8; 12]).is_none());
        assert!(Score::from_slice(&[]).is_none());
    }

    #[test]
    fn kind_names() {
        assert_eq!(ScoreKind::from_name("MD5"), Some(ScoreKind::Md5));
        assert_eq!(ScoreKind::from_name("xxh64"), Some(ScoreKind::Xxh64));
        assert_eq!(ScoreKind::from_name("sha1"), None);
        assert_eq!(ScoreKind::Xxh64.to_string(), "xxh64");
    }
}
