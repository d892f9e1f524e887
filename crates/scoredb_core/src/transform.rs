//! Payload transforms.
//!
//! A [`TransformedStore`] encodes every payload before handing it to the
//! wrapped store and decodes it on the way back. Scores returned by the
//! decorator address the *encoded* bytes, so the checksum gate of the
//! inner store still protects what is on disk.
//!
//! Codecs must be deterministic, otherwise equal payloads would no longer
//! deduplicate. [`AesGcmCodec`] therefore uses a nonce derived from the key
//! and the plaintext instead of a random one.

use crate::content::ContentStore;
use crate::error::CoreResult;
use crate::score::{Score, ScoreKind};

/// A reversible, deterministic byte transform.
pub trait PayloadCodec: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Transforms a payload for storage.
    fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>>;

    /// Reverses [`encode`](Self::encode).
    fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>>;
}

/// Codecs applied in sequence on encode and in reverse on decode.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn PayloadCodec>>,
}

impl Pipeline {
    /// Creates an empty pipeline, which leaves payloads unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn then(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.stages.push(Box::new(codec));
        self
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl PayloadCodec for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
        let mut bytes = payload.to_vec();
        for stage in &self.stages {
            bytes = stage.encode(&bytes)?;
        }
        Ok(bytes)
    }

    fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>> {
        let mut bytes = encoded.to_vec();
        for stage in self.stages.iter().rev() {
            bytes = stage.decode(&bytes)?;
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

/// Content store decorator applying a codec to every payload.
pub struct TransformedStore<S, C> {
    inner: S,
    codec: C,
}

impl<S: ContentStore, C: PayloadCodec> TransformedStore<S, C> {
    /// Wraps `inner` with `codec`.
    pub fn new(inner: S, codec: C) -> Self {
        Self { inner, codec }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ContentStore, C: PayloadCodec> ContentStore for TransformedStore<S, C> {
    fn score_kind(&self) -> ScoreKind {
        self.inner.score_kind()
    }

    fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        let encoded = self.inner.read(score)?;
        self.codec.decode(&encoded)
    }

    fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        let encoded = self.codec.encode(payload)?;
        self.inner.write(&encoded)
    }

    fn contains(&self, score: &Score) -> CoreResult<bool> {
        self.inner.contains(score)
    }

    fn score_for(&self, payload: &[u8]) -> CoreResult<Score> {
        self.inner.score_for(&self.codec.encode(payload)?)
    }
}

#[cfg(feature = "compression")]
mod compression {
    use super::PayloadCodec;
    use crate::error::{CoreError, CoreResult};

    /// Zstandard compression.
    #[derive(Debug, Clone, Copy)]
    pub struct ZstdCodec {
        level: i32,
    }

    impl ZstdCodec {
        /// Creates a codec with an explicit compression level.
        #[must_use]
        pub const fn with_level(level: i32) -> Self {
            Self { level }
        }
    }

    impl Default for ZstdCodec {
        fn default() -> Self {
            Self::with_level(zstd::DEFAULT_COMPRESSION_LEVEL)
        }
    }

    impl PayloadCodec for ZstdCodec {
        fn name(&self) -> &'static str {
            "zstd"
        }

        fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
            zstd::encode_all(payload, self.level)
                .map_err(|e| CoreError::transform(format!("zstd compression failed: {e}")))
        }

        fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>> {
            zstd::decode_all(encoded)
                .map_err(|e| CoreError::transform(format!("zstd decompression failed: {e}")))
        }
    }
}

#[cfg(feature = "compression")]
pub use compression::ZstdCodec;

#[cfg(feature = "encryption")]
mod encryption {
    use super::PayloadCodec;
    use crate::error::{CoreError, CoreResult};
    use crate::txn::TransactionalEngine;
    use aes_gcm::{
        aead::{generic_array::GenericArray, Aead, KeyInit},
        Aes256Gcm, Nonce,
    };
    use rand::RngCore;
    use sha2::{Digest, Sha256};
    use zeroize::{Zeroize, ZeroizeOnDrop};

    /// Size of the AES-256 key in bytes.
    pub const ENCRYPTION_KEY_SIZE: usize = 32;
    /// Size of the GCM nonce in bytes.
    pub const NONCE_SIZE: usize = 12;
    /// Size of the GCM authentication tag in bytes.
    pub const TAG_SIZE: usize = 16;

    /// Engine key under which [`EncryptionKey::load_or_create`] keeps the key.
    pub const ENGINE_KEY_NAME: &[u8] = b"00key";

    /// AES-256 key, zeroized on drop.
    #[derive(Clone, Zeroize, ZeroizeOnDrop)]
    pub struct EncryptionKey {
        bytes: [u8; ENCRYPTION_KEY_SIZE],
    }

    impl EncryptionKey {
        /// Generates a random key.
        #[must_use]
        pub fn generate() -> Self {
            let mut bytes = [0u8; ENCRYPTION_KEY_SIZE];
            rand::thread_rng().fill_bytes(&mut bytes);
            Self { bytes }
        }

        /// Creates a key from raw bytes.
        ///
        /// # Errors
        ///
        /// Returns an error unless the slice is exactly 32 bytes.
        pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
            let bytes: [u8; ENCRYPTION_KEY_SIZE] = bytes
                .try_into()
                .map_err(|_| CoreError::invalid_key_size(bytes.len(), ENCRYPTION_KEY_SIZE))?;
            Ok(Self { bytes })
        }

        /// Returns the key bytes. Never log them.
        #[must_use]
        pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_SIZE] {
            &self.bytes
        }

        /// Reads the key kept in `engine`, generating and storing one on
        /// first use. Both steps share one transaction.
        pub fn load_or_create<E: TransactionalEngine>(engine: &E) -> CoreResult<Self> {
            engine.update(|txn| match txn.read(ENGINE_KEY_NAME)? {
                Some(stored) => Self::from_bytes(&stored),
                None => {
                    let key = Self::generate();
                    txn.write(ENGINE_KEY_NAME, key.as_bytes())?;
                    Ok(key)
                }
            })
        }
    }

    impl std::fmt::Debug for EncryptionKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("EncryptionKey")
                .field("bytes", &"[REDACTED]")
                .finish()
        }
    }

    /// Convergent AES-256-GCM encryption.
    ///
    /// The nonce is the first 12 bytes of `SHA-256(key || plaintext)`, so
    /// equal plaintexts encrypt to equal ciphertexts under one key. This
    /// reveals which payloads are equal, and nothing else.
    ///
    /// Output format: `nonce (12) || ciphertext || tag (16)`.
    pub struct AesGcmCodec {
        cipher: Aes256Gcm,
        key: EncryptionKey,
    }

    impl AesGcmCodec {
        /// Creates a codec for `key`.
        #[must_use]
        pub fn new(key: EncryptionKey) -> Self {
            let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
            Self { cipher, key }
        }

        fn nonce_for(&self, plaintext: &[u8]) -> [u8; NONCE_SIZE] {
            let mut hasher = Sha256::new();
            hasher.update(self.key.as_bytes());
            hasher.update(plaintext);
            let digest = hasher.finalize();

            let mut nonce = [0u8; NONCE_SIZE];
            nonce.copy_from_slice(&digest[..NONCE_SIZE]);
            nonce
        }
    }

    impl PayloadCodec for AesGcmCodec {
        fn name(&self) -> &'static str {
            "aes-256-gcm"
        }

        fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
            let nonce_bytes = self.nonce_for(payload);
            let ciphertext = self
                .cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), payload)
                .map_err(|_| CoreError::transform("encryption failed"))?;

            let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
            out.extend_from_slice(&nonce_bytes);
            out.extend(ciphertext);
            Ok(out)
        }

        fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>> {
            if encoded.len() < NONCE_SIZE + TAG_SIZE {
                return Err(CoreError::transform("ciphertext too short"));
            }

            let (nonce, ciphertext) = encoded.split_at(NONCE_SIZE);
            self.cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| CoreError::transform("decryption failed"))
        }
    }

    impl std::fmt::Debug for AesGcmCodec {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AesGcmCodec").finish_non_exhaustive()
        }
    }
}

#[cfg(feature = "encryption")]
pub use encryption::{AesGcmCodec, EncryptionKey, ENCRYPTION_KEY_SIZE, NONCE_SIZE, TAG_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::Store;

    /// Reverses the bytes; enough to tell encoded from plain.
    struct Reverse;

    impl PayloadCodec for Reverse {
        fn name(&self) -> &'static str {
            "reverse"
        }
        fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
            Ok(payload.iter().rev().copied().collect())
        }
        fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>> {
            self.encode(encoded)
        }
    }

    /// Appends a marker byte.
    struct Suffix(u8);

    impl PayloadCodec for Suffix {
        fn name(&self) -> &'static str {
            "suffix"
        }
        fn encode(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
            let mut out = payload.to_vec();
            out.push(self.0);
            Ok(out)
        }
        fn decode(&self, encoded: &[u8]) -> CoreResult<Vec<u8>> {
            match encoded.split_last() {
                Some((&last, rest)) if last == self.0 => Ok(rest.to_vec()),
                _ => Err(crate::CoreError::transform("missing suffix")),
            }
        }
    }

    #[test]
    fn pipeline_order() {
        let pipeline = Pipeline::new().then(Suffix(b'!')).then(Reverse);

        let encoded = pipeline.encode(b"abc").unwrap();
        assert_eq!(encoded, b"!cba");
        assert_eq!(pipeline.decode(&encoded).unwrap(), b"abc");
        assert_eq!(format!("{pipeline:?}"), r#"["suffix", "reverse"]"#);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.encode(b"same").unwrap(), b"same");
    }

    #[test]
    fn scores_address_encoded_bytes() {
        let store = TransformedStore::new(Store::in_memory(Config::default()).unwrap(), Reverse);
        let score = store.write(b"abc").unwrap();

        assert_eq!(score, ScoreKind::Md5.compute(b"cba"));
        assert_eq!(store.score_for(b"abc").unwrap(), score);
        assert_ne!(store.inner().score_for(b"abc").unwrap(), score);
        assert_eq!(store.read(&score).unwrap(), b"abc");
        assert_eq!(store.inner().read(&score).unwrap(), b"cba");
    }

    #[cfg(feature = "compression")]
    #[test]
    fn zstd_round_trip_and_dedup() {
        let store = TransformedStore::new(
            Store::in_memory(Config::default()).unwrap(),
            ZstdCodec::default(),
        );
        let payload = b"compressible ".repeat(200);

        let a = store.write(&payload).unwrap();
        let b = store.write(&payload).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.read(&a).unwrap(), payload);

        let stored = store.inner().read(&a).unwrap();
        assert!(stored.len() < payload.len());
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn aes_gcm_is_deterministic_per_key() {
        let codec = AesGcmCodec::new(EncryptionKey::generate());
        let a = codec.encode(b"secret").unwrap();
        let b = codec.encode(b"secret").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), NONCE_SIZE + 6 + TAG_SIZE);
        assert_ne!(&a[NONCE_SIZE..NONCE_SIZE + 6], b"secret");
        assert_eq!(codec.decode(&a).unwrap(), b"secret");

        let other = AesGcmCodec::new(EncryptionKey::generate());
        assert_ne!(other.encode(b"secret").unwrap(), a);
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn aes_gcm_rejects_tampering() {
        let codec = AesGcmCodec::new(EncryptionKey::generate());
        let mut sealed = codec.encode(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(codec.decode(&sealed).is_err());
        assert!(codec.decode(&[0u8; 8]).is_err());
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn key_size_is_checked() {
        assert!(EncryptionKey::from_bytes(&[0u8; 16]).is_err());
        let key = EncryptionKey::from_bytes(&[7u8; ENCRYPTION_KEY_SIZE]).unwrap();
        assert_eq!(format!("{key:?}"), r#"EncryptionKey { bytes: "[REDACTED]" }"#);
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn engine_keeps_one_key() {
        use crate::txn::MemoryEngine;

        let engine = MemoryEngine::new();
        let first = EncryptionKey::load_or_create(&engine).unwrap();
        let second = EncryptionKey::load_or_create(&engine).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(engine.len(), 1);
    }

    #[cfg(all(feature = "compression", feature = "encryption"))]
    #[test]
    fn compress_then_encrypt() {
        let pipeline = Pipeline::new()
            .then(ZstdCodec::default())
            .then(AesGcmCodec::new(EncryptionKey::generate()));
        let store = TransformedStore::new(Store::in_memory(Config::default()).unwrap(), pipeline);

        let payload = b"the quick brown fox ".repeat(50);
        let score = store.write(&payload).unwrap();
        assert_eq!(store.read(&score).unwrap(), payload);
        assert_eq!(store.write(&payload).unwrap(), score);
    }
}
