//! Known digest vectors.

use scoredb_core::ScoreKind;

/// A payload and its expected hex score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreVector {
    /// Digest scheme.
    pub kind: ScoreKind,
    /// Input bytes.
    pub payload: &'static [u8],
    /// Expected lowercase hex score.
    pub hex: &'static str,
}

/// Vectors every build must reproduce.
pub const SCORE_VECTORS: &[ScoreVector] = &[
    ScoreVector {
        kind: ScoreKind::Md5,
        payload: b"brown fox",
        hex: "fdd929ffb0a167ab33e8b1a8905858cf",
    },
    ScoreVector {
        kind: ScoreKind::Xxh64,
        payload: b"brown fox",
        hex: "7113fd84e8973eb2",
    },
    ScoreVector {
        kind: ScoreKind::Md5,
        payload: b"",
        hex: "d41d8cd98f00b204e9800998ecf8427e",
    },
    ScoreVector {
        kind: ScoreKind::Xxh64,
        payload: b"",
        hex: "ef46db3751d8e999",
    },
];
