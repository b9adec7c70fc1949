//! Crash-recovery core of a write-ahead-logged, multi-node relational store.
//!
//! After a restart the log is replayed in order to reconstruct on-disk state.
//! This crate holds the machinery that makes that safe under arbitrary crash
//! interleavings:
//!
//! - [`invalid_pages`]: bookkeeping for logged writes to pages that no longer
//!   exist, verified empty at the end of replay;
//! - [`replay_buffer`]: obtaining a pinned, exclusively locked page during
//!   redo, extending or skipping as needed;
//! - [`retention`]: which old log segments may be deleted, honoring both the
//!   local retention window and connected replicas;
//! - [`xact_record`]: the on-disk transaction-end record codec, including the
//!   distributed two-phase variants;
//! - [`replay`]: the thin driver tying those together for a replay pass.
//!
//! Replay is single-threaded and strictly ordered by log position; nothing in
//! this crate takes locks on its own behalf during redo.

pub mod invalid_pages;
pub mod record;
pub mod replay;
pub mod replay_buffer;
pub mod replication;
pub mod reltag;
pub mod retention;
pub mod test_utils;
pub mod xact_record;

use wal_meta::BlockNumber;

use crate::reltag::RelationLocator;
use crate::replication::NodeRole;

pub mod defaults {
    /// 64 MB log segments, so 64 segments per 2^32-byte logical log file.
    pub const WAL_SEG_SIZE: usize = 64 * 1024 * 1024;

    /// No local retention window by default; replica needs alone govern
    /// segment deletion.
    pub const KEEP_SEGMENTS: i32 = 0;
}

/// Per-node configuration consumed by the recovery and retention paths.
#[derive(Debug, Clone)]
pub struct ReplayConf {
    /// Size of one log segment in bytes.
    pub wal_seg_size: usize,
    /// Number of finished segments to keep around beyond what replicas need.
    /// Zero or negative disables the local retention floor.
    pub keep_segments: i32,
    /// This node's role in the cluster, which decides where the replication
    /// floor comes from.
    pub role: NodeRole,
}

impl Default for ReplayConf {
    fn default() -> Self {
        ReplayConf {
            wal_seg_size: defaults::WAL_SEG_SIZE,
            keep_segments: defaults::KEEP_SEGMENTS,
            role: NodeRole::Coordinator,
        }
    }
}

/// Fatal failures of a recovery pass. There is no retry for these: replay
/// either absorbs a condition as a normal recovery case or the process has to
/// restart from the last consistent checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// The log referenced pages that no later drop or truncate record ever
    /// explained away. The log is corrupt or incomplete.
    #[error("log replay references {0} invalid page(s) that were never dropped or truncated")]
    InvalidPagesRemain(usize),

    /// The invalid-page table itself lost an entry it had just reported,
    /// which means in-memory recovery state can no longer be trusted.
    #[error("invalid-page table corrupted: entry for page {blkno} of relation {rel} vanished")]
    RegistryCorrupted {
        rel: RelationLocator,
        blkno: BlockNumber,
    },
}
