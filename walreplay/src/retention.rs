//! Segment retention: which old log segments must still be kept.
//!
//! A periodic cleanup pass asks for the oldest segment it may not delete.
//! Two constraints feed that answer: the locally configured keep window
//! (`keep_segments`) and the oldest log position a connected replica still
//! needs. Inputs are treated as a fresh snapshot on every call; the
//! replication floor in particular must be read once by the caller and
//! passed in, since replica acknowledgements update it concurrently.

use std::cmp::min;

use tracing::debug;
use wal_meta::seg::segment_file_name;
use wal_meta::{Lsn, SegmentNumber};

use crate::ReplayConf;

/// Cap `candidate` so that the last `keep_segments` finished segments before
/// `current_lsn` survive deletion.
///
/// A non-positive `keep_segments` disables the window entirely and returns
/// the candidate untouched; the check comes before any segment arithmetic,
/// which would be meaningless for a disabled policy. On underflow the
/// request clamps to segment 1, the oldest unit the log ever materializes.
pub fn keep_floor(
    current_lsn: Lsn,
    keep_segments: i32,
    candidate: SegmentNumber,
    seg_size: usize,
) -> SegmentNumber {
    if keep_segments <= 0 {
        return candidate;
    }

    let current = current_lsn.segment_number(seg_size);
    let keep = keep_segments as u64;
    let requested = if current <= keep { 1 } else { current - keep };

    min(candidate, requested)
}

/// The delete floor tracked across cleanup passes. It only ever advances:
/// regressing would re-delete ranges the cleanup already consumed, while
/// advancing past a replica's position is prevented by the floor candidate
/// itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionState {
    floor: SegmentNumber,
}

impl RetentionState {
    pub fn new(initial_floor: SegmentNumber) -> RetentionState {
        RetentionState {
            floor: initial_floor,
        }
    }

    /// Oldest segment number that must not be deleted, as of the last pass.
    pub fn floor(&self) -> SegmentNumber {
        self.floor
    }

    /// Recompute the delete floor from this pass's snapshot of the current
    /// insert position and the replication floor (None when no replica
    /// position is being tracked).
    pub fn compute_floor(
        &mut self,
        current_lsn: Lsn,
        replication_floor: Option<Lsn>,
        conf: &ReplayConf,
    ) -> SegmentNumber {
        let cutoff = match replication_floor {
            Some(floor) => min(current_lsn, floor),
            None if conf.keep_segments <= 0 => {
                // No local window and no replica constraint: leave the floor
                // where it is rather than forcing it toward the insert
                // position.
                return self.floor;
            }
            None => current_lsn,
        };

        let candidate = keep_floor(
            current_lsn,
            conf.keep_segments,
            cutoff.segment_number(conf.wal_seg_size),
            conf.wal_seg_size,
        );

        if candidate > self.floor {
            debug!(
                "advancing log delete floor to segment {} ({})",
                candidate,
                segment_file_name(candidate, conf.wal_seg_size)
            );
            self.floor = candidate;
        }
        self.floor
    }
}
