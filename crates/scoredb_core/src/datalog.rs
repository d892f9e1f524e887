//! Append-only data log.
//!
//! The data log holds every block ever written, in write order. It is the
//! source of truth of the store: the index can always be recomputed from
//! it by a linear scan.
//!
//! ## Recovery Policy
//!
//! ### Tolerated (treated as clean end-of-log)
//!
//! - **Truncated header**: fewer than `4 + S` bytes left at the end
//! - **Truncated payload**: the declared block extends past the end
//!
//! Both are a crash mid-append. The partial block is discarded as if it
//! had never been written.
//!
//! ### Fatal (abort the scan)
//!
//! - **Impossible header**: declared block shorter than the score width
//! - **I/O errors** while reading a block that is fully present

use crate::codec::{self, Addr, BLOCK_HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::score::{Score, ScoreKind};
use scoredb_storage::StorageBackend;
use tracing::{debug, warn};

/// A block decoded during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Offset of the block's length prefix.
    pub offset: u64,
    /// Score recorded in the block header.
    pub score: Score,
    /// Address of the block's payload.
    pub addr: Addr,
}

/// Outcome of a scan over the data log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of complete blocks decoded.
    pub blocks: usize,
    /// Number of blocks that produced a new index entry.
    pub indexed: usize,
    /// Offset one past the last complete block.
    pub valid_end: u64,
    /// Bytes after `valid_end` belonging to a torn block.
    pub torn_bytes: u64,
}

/// Result of re-hashing every block in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of blocks checked.
    pub blocks_checked: usize,
    /// Payload bytes hashed.
    pub bytes_checked: u64,
    /// Blocks whose payload no longer hashes to their recorded score.
    pub corrupt: Vec<Block>,
    /// Bytes of a torn trailing block, if any.
    pub torn_bytes: u64,
}

impl VerifyReport {
    /// Returns `true` if no corruption was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// The append-only data log.
pub struct Datalog {
    backend: Box<dyn StorageBackend>,
    kind: ScoreKind,
    sync_on_write: bool,
}

impl Datalog {
    /// Opens a data log over a storage backend.
    ///
    /// The cursor is the current backend size.
    pub fn open(backend: Box<dyn StorageBackend>, kind: ScoreKind, sync_on_write: bool) -> Self {
        Self {
            backend,
            kind,
            sync_on_write,
        }
    }

    /// Returns the logical end of the log.
    pub fn cursor(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Digest scheme of the scores recorded in this log.
    #[must_use]
    pub fn score_kind(&self) -> ScoreKind {
        self.kind
    }

    /// Scores and appends a payload, returning its address.
    ///
    /// Does not check for duplicates; that is the store's job.
    pub fn write(&mut self, payload: &[u8]) -> CoreResult<Addr> {
        let score = self.kind.compute(payload);
        self.append(&score, payload)
    }

    /// Appends a block for an already computed score.
    ///
    /// The block is durable (synced, or flushed when `sync_on_write` is off)
    /// before this returns. On failure the partial block is truncated away.
    pub fn append(&mut self, score: &Score, payload: &[u8]) -> CoreResult<Addr> {
        let start = self.backend.size()?;
        let addr = codec::payload_addr(start, score.len(), payload.len() as u64);
        addr.check_indexable()?;

        let block = codec::encode_block(score, payload)?;
        if let Err(err) = self.append_durable(&block) {
            self.roll_back(start);
            return Err(err);
        }

        debug!(score = %score, position = addr.position, size = addr.size, "appended block");
        Ok(addr)
    }

    fn append_durable(&mut self, block: &[u8]) -> CoreResult<()> {
        self.backend.append(block)?;
        if self.sync_on_write {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }
        Ok(())
    }

    fn roll_back(&mut self, start: u64) {
        if let Err(err) = self.backend.truncate(start) {
            warn!(offset = start, error = %err, "failed to roll back partial block");
        }
    }

    /// Reads the payload at `addr`.
    ///
    /// Positional: never depends on or moves the cursor.
    pub fn read(&self, addr: Addr) -> CoreResult<Vec<u8>> {
        let len = usize::try_from(addr.size).map_err(|_| CoreError::AddressOverflow {
            position: addr.end(),
        })?;
        Ok(self.backend.read_at(addr.position, len)?)
    }

    /// Iterates over complete blocks starting at `from`.
    pub fn blocks(&self, from: u64) -> CoreResult<BlockIter<'_>> {
        let size = self.backend.size()?;
        Ok(BlockIter {
            log: self,
            size,
            offset: from,
            finished: from >= size,
        })
    }

    /// Rebuilds `index` by scanning the whole log.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Rebuild`] if the scan fails for any reason
    /// other than a torn trailing block.
    pub fn rebuild_index(&self, index: &mut Index) -> CoreResult<ScanSummary> {
        self.replay_into(index, 0)
    }

    /// Records every block from `from` onwards in `index`, in file order.
    ///
    /// `from` must be a block boundary.
    pub fn replay_into(&self, index: &mut Index, from: u64) -> CoreResult<ScanSummary> {
        let mut summary = ScanSummary {
            valid_end: from,
            ..ScanSummary::default()
        };

        let mut blocks = self.blocks(from)?;
        for block in blocks.by_ref() {
            let block = block.map_err(|err| CoreError::rebuild(summary.valid_end, err.to_string()))?;
            if index.write(&block.score, block.addr)? {
                summary.indexed += 1;
            }
            summary.blocks += 1;
            summary.valid_end = block.addr.end();
        }

        summary.torn_bytes = blocks.size.saturating_sub(summary.valid_end);
        Ok(summary)
    }

    /// Raw bytes from `from` to the end of the log.
    pub fn tail(&self, from: u64) -> CoreResult<Vec<u8>> {
        let size = self.backend.size()?;
        if from >= size {
            return Ok(Vec::new());
        }
        let len = usize::try_from(size - from).map_err(|_| CoreError::AddressOverflow { position: size })?;
        Ok(self.backend.read_at(from, len)?)
    }

    /// Truncates a torn block left behind by a crash.
    pub fn discard_tail(&mut self, valid_end: u64) -> CoreResult<u64> {
        let size = self.backend.size()?;
        if valid_end >= size {
            return Ok(0);
        }

        let torn = size - valid_end;
        warn!(offset = valid_end, bytes = torn, "discarding torn block at end of data log");
        self.backend.truncate(valid_end)?;
        Ok(torn)
    }

    /// Re-hashes every block and reports the ones that no longer match.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let mut report = VerifyReport::default();
        let mut valid_end = 0;

        let mut blocks = self.blocks(0)?;
        for block in blocks.by_ref() {
            let block = block?;
            let payload = self.read(block.addr)?;
            if self.kind.compute(&payload) != block.score {
                report.corrupt.push(block);
            }
            report.blocks_checked += 1;
            report.bytes_checked += block.addr.size;
            valid_end = block.addr.end();
        }

        report.torn_bytes = blocks.size.saturating_sub(valid_end);
        Ok(report)
    }

    /// Syncs the log and releases the backend.
    pub fn close(mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Datalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datalog")
            .field("kind", &self.kind)
            .field("cursor", &self.backend.size().ok())
            .finish_non_exhaustive()
    }
}

/// Iterator over the complete blocks of a data log.
///
/// Ends silently at a torn trailing block; yields an error and stops on
/// an impossible header or an I/O failure.
pub struct BlockIter<'a> {
    log: &'a Datalog,
    size: u64,
    offset: u64,
    finished: bool,
}

impl BlockIter<'_> {
    fn read_next(&mut self) -> CoreResult<Option<Block>> {
        let score_size = self.log.kind.size();
        let head_len = BLOCK_HEADER_SIZE + score_size;

        if self.offset + head_len as u64 > self.size {
            return Ok(None);
        }

        let head = self.log.backend.read_at(self.offset, head_len)?;
        let prefix = [head[0], head[1], head[2], head[3]];
        let payload_len = codec::decode_block_header(prefix, score_size)?;

        let block_end = self.offset + codec::block_len(score_size, payload_len);
        if block_end > self.size {
            return Ok(None);
        }

        let score = Score::from_slice(&head[BLOCK_HEADER_SIZE..])
            .ok_or_else(|| CoreError::corruption("block header holds an invalid score"))?;
        let block = Block {
            offset: self.offset,
            score,
            addr: codec::payload_addr(self.offset, score_size, payload_len),
        };

        self.offset = block_end;
        Ok(Some(block))
    }
}

impl Iterator for BlockIter<'_> {
    type Item = CoreResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
