//! The invalid-page table.
//!
//! During replay we may see log records for incremental updates of pages
//! that no longer exist, because their relation was later dropped or
//! truncated. Rather than simply ignoring such records, we make a note of
//! the referenced page and complain if we don't actually see a drop or
//! truncate covering it later in replay.
//!
//! The table is owned by the replay driver and lives only for one recovery
//! pass; a fresh pass starts from a fresh table. It is mutated by the single
//! replay thread only and needs no internal locking. If redo is ever
//! parallelized across relations, the table must be partitioned by relation
//! and a relation's forgets serialized against its inserts.

use std::collections::HashMap;

use tracing::{debug, warn};
use wal_meta::BlockNumber;

use crate::reltag::{PageReference, RelationLocator};
use crate::RecoveryError;

/// Records (relation, block) pairs referenced by replay that could not be
/// satisfied, keyed by page, valued by whether the page existed on disk as an
/// all-zero image (`true`) or was entirely absent (`false`).
#[derive(Debug, Default)]
pub struct InvalidPageRegistry {
    table: HashMap<PageReference, bool>,
}

impl InvalidPageRegistry {
    pub fn new() -> InvalidPageRegistry {
        InvalidPageRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Note a reference to an invalid page. A repeat reference to the same
    /// page leaves the originally recorded flag in place.
    pub fn record_invalid(&mut self, rel: RelationLocator, blkno: BlockNumber, present: bool) {
        // Debug-level so the cause of a later failure can be traced back to
        // the record that produced the reference.
        if present {
            debug!("page {} of relation {} is uninitialized", blkno, rel);
        } else {
            debug!("page {} of relation {} does not exist", blkno, rel);
        }

        self.table
            .entry(PageReference { rel, blkno })
            .or_insert(present);
    }

    /// Forget any invalid pages of `rel` at or above `min_blkno`, because
    /// they've been dropped or truncated away.
    pub fn forget_from(
        &mut self,
        rel: RelationLocator,
        min_blkno: BlockNumber,
    ) -> Result<(), RecoveryError> {
        let doomed: Vec<PageReference> = self
            .table
            .keys()
            .filter(|key| key.rel == rel && key.blkno >= min_blkno)
            .copied()
            .collect();

        for key in doomed {
            debug!("page {} of relation {} has been dropped", key.blkno, key.rel);
            if self.table.remove(&key).is_none() {
                return Err(RecoveryError::RegistryCorrupted {
                    rel: key.rel,
                    blkno: key.blkno,
                });
            }
        }
        Ok(())
    }

    /// Forget any invalid pages belonging to the given database, matched by
    /// the (tablespace, database) pair of the locator; a dropped database
    /// takes every relation inside it along.
    pub fn forget_database(&mut self, spc_id: u32, db_id: u32) -> Result<(), RecoveryError> {
        let doomed: Vec<PageReference> = self
            .table
            .keys()
            .filter(|key| key.rel.spc_id == spc_id && key.rel.db_id == db_id)
            .copied()
            .collect();

        for key in doomed {
            debug!("page {} of relation {} has been dropped", key.blkno, key.rel);
            if self.table.remove(&key).is_none() {
                return Err(RecoveryError::RegistryCorrupted {
                    rel: key.rel,
                    blkno: key.blkno,
                });
            }
        }
        Ok(())
    }

    /// Forget an invalid append-only segment file. Segment files are tracked
    /// under their file number in place of a block number and are looked up
    /// by exact match, not by range.
    pub fn forget_segment(
        &mut self,
        rel: RelationLocator,
        segment_file_num: u32,
    ) -> Result<(), RecoveryError> {
        let key = PageReference {
            rel,
            blkno: segment_file_num,
        };
        if !self.table.contains_key(&key) {
            return Ok(());
        }
        if self.table.remove(&key).is_none() {
            return Err(RecoveryError::RegistryCorrupted {
                rel,
                blkno: segment_file_num,
            });
        }
        debug!(
            "segment file {} of relation {} has been dropped",
            segment_file_num, rel
        );
        Ok(())
    }

    /// Complain about any remaining entries and empty the table.
    ///
    /// Every survivor is reported as a warning before the terminating error,
    /// so the operator sees the full set rather than just the first page. A
    /// non-empty table here means the log referenced pages nothing later
    /// explained away; recovery must not continue past that.
    pub fn check_and_clear(&mut self) -> Result<(), RecoveryError> {
        let remaining = std::mem::take(&mut self.table);
        if remaining.is_empty() {
            return Ok(());
        }

        for (key, present) in &remaining {
            if *present {
                warn!("page {} of relation {} was uninitialized", key.blkno, key.rel);
            } else {
                warn!("page {} of relation {} did not exist", key.blkno, key.rel);
            }
        }
        Err(RecoveryError::InvalidPagesRemain(remaining.len()))
    }
}
