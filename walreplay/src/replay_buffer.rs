//! Reading a page during log replay.
//!
//! Replay cannot assume a page it is told to update still exists: the
//! relation may have been dropped or truncated later in the log. The
//! acquisition protocol here either hands back a pinned, exclusively locked
//! buffer or tells the caller to skip the update, feeding the invalid-page
//! table either way. None of this code runs during normal operation.

use anyhow::Result;
use wal_meta::BlockNumber;

use crate::invalid_pages::InvalidPageRegistry;
use crate::reltag::RelationLocator;

/// Pseudo block number asking the store to allocate a new trailing page.
pub const NEW_BLOCK: BlockNumber = u32::MAX;

/// The buffer/storage-manager collaborator, as seen by replay.
///
/// An implementation keeps actual buffers inside of it and hands out opaque
/// pinned handles; replay only ever holds one at a time.
pub trait PageStore {
    type Buffer;

    /// Open the underlying storage for `rel`, creating the file if it is
    /// entirely absent.
    fn open_or_create(&mut self, rel: RelationLocator) -> Result<()>;

    /// Current number of blocks in the relation's file.
    fn nblocks(&mut self, rel: RelationLocator) -> Result<BlockNumber>;

    /// Read the given block and return it pinned. [`NEW_BLOCK`] allocates a
    /// new zeroed trailing block instead.
    fn read_pinned(&mut self, rel: RelationLocator, blkno: BlockNumber) -> Result<Self::Buffer>;

    /// Take the buffer's content lock exclusively.
    fn lock_exclusive(&mut self, buf: &mut Self::Buffer);

    /// Drop the content lock and the pin.
    fn unlock_release(&mut self, buf: Self::Buffer);

    /// Drop the pin of an unlocked buffer.
    fn release(&mut self, buf: Self::Buffer);

    /// Overwrite the buffer's page with a full image.
    fn write_image(&mut self, buf: &mut Self::Buffer, data: &[u8]);

    fn block_number(&self, buf: &Self::Buffer) -> BlockNumber;

    /// Whether the page has never been initialized (all zeroes).
    fn page_is_new(&self, buf: &Self::Buffer) -> bool;

    /// Close any cached handle for the relation; called when replay of a
    /// drop record retires the object.
    fn forget_rel(&mut self, rel: RelationLocator);
}

/// Outcome of [`acquire_for_replay`].
///
/// `Skip` is not an error: it means the update legitimately does not apply
/// because the page was dropped or truncated later in the log. The proof of
/// that is deferred to the end-of-recovery invalid-page check.
pub enum Acquired<B> {
    /// A pinned, exclusively locked buffer holding the requested page.
    Buffer(B),
    /// The update should be silently skipped.
    Skip,
}

/// Obtain a page for redo, comparable to a normal read followed by taking
/// the exclusive content lock. (The lock is for API consistency with
/// non-recovery code paths; replay is single-threaded.)
///
/// With `init` set, the caller intends to rewrite the page fully from the
/// log record, so the relation is extended as needed to make the page exist
/// and an all-zero page is acceptable. With `init` unset, a missing or
/// never-initialized page is recorded in the invalid-page table and `Skip`
/// is returned.
pub fn acquire_for_replay<S: PageStore>(
    store: &mut S,
    registry: &mut InvalidPageRegistry,
    rel: RelationLocator,
    blkno: BlockNumber,
    init: bool,
) -> Result<Acquired<S::Buffer>> {
    debug_assert!(blkno != NEW_BLOCK);

    // Create the target file if it doesn't already exist. This lets us cope
    // if the replay sequence contains writes to a relation that is later
    // deleted. Suppressing the writes instead would risk losing data if the
    // filesystem lost the file in the crash; better to keep writing until we
    // are actually told to delete the file.
    store.open_or_create(rel)?;

    let mut last_block = store.nblocks(rel)?;

    let mut buf;
    if blkno < last_block {
        // page exists in file
        buf = store.read_pinned(rel, blkno)?;
    } else {
        // page doesn't exist in file
        if !init {
            registry.record_invalid(rel, blkno, false);
            return Ok(Acquired::Skip);
        }
        // OK to extend the file, one trailing page at a time, dropping the
        // pin of each intermediate page. Only valid while replay is
        // single-threaded; no one else can be extending this relation.
        buf = store.read_pinned(rel, NEW_BLOCK)?;
        last_block += 1;
        while blkno >= last_block {
            store.release(buf);
            buf = store.read_pinned(rel, NEW_BLOCK)?;
            last_block += 1;
        }
        debug_assert_eq!(store.block_number(&buf), blkno);
    }

    store.lock_exclusive(&mut buf);

    if !init && store.page_is_new(&buf) {
        store.unlock_release(buf);
        registry.record_invalid(rel, blkno, true);
        return Ok(Acquired::Skip);
    }

    Ok(Acquired::Buffer(buf))
}

/// Stand-in for a relation descriptor in low-level storage calls during
/// replay. There is no working catalog while recovering, so all it can offer
/// is the physical locator and a name derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRel {
    pub locator: RelationLocator,
}

impl PhysicalRel {
    pub fn new(locator: RelationLocator) -> PhysicalRel {
        PhysicalRel { locator }
    }

    /// We don't know the relation's name; use the file id instead.
    pub fn name(&self) -> String {
        format!("{}", self.locator.rel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemPageStore, PAGE_SIZE};

    fn rel(rel_id: u32) -> RelationLocator {
        RelationLocator::new(1663, 1, rel_id)
    }

    #[test]
    fn existing_page_is_returned_locked() {
        let mut store = MemPageStore::new();
        store.create_rel(rel(1), 3);
        store.format_page(rel(1), 1);
        let mut reg = InvalidPageRegistry::new();

        match acquire_for_replay(&mut store, &mut reg, rel(1), 1, false).unwrap() {
            Acquired::Buffer(buf) => {
                assert_eq!(store.block_number(&buf), 1);
                assert!(buf.locked);
                store.unlock_release(buf);
            }
            Acquired::Skip => panic!("expected a buffer"),
        }
        assert!(reg.is_empty());
        assert_eq!(store.pinned(), 0);
    }

    #[test]
    fn missing_page_without_init_skips_and_registers() {
        let mut store = MemPageStore::new();
        store.create_rel(rel(1), 2);
        let mut reg = InvalidPageRegistry::new();

        match acquire_for_replay(&mut store, &mut reg, rel(1), 5, false).unwrap() {
            Acquired::Skip => {}
            Acquired::Buffer(_) => panic!("expected skip"),
        }
        assert_eq!(reg.len(), 1);
        assert_eq!(store.pinned(), 0);
    }

    #[test]
    fn missing_relation_is_created_not_suppressed() {
        let mut store = MemPageStore::new();
        let mut reg = InvalidPageRegistry::new();

        // No create_rel: the relation is entirely absent.
        match acquire_for_replay(&mut store, &mut reg, rel(9), 0, false).unwrap() {
            Acquired::Skip => {}
            Acquired::Buffer(_) => panic!("expected skip"),
        }
        // The file exists now, even though the page doesn't.
        assert_eq!(store.nblocks(rel(9)).unwrap(), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn init_extends_to_target_block() {
        let mut store = MemPageStore::new();
        store.create_rel(rel(1), 1);
        let mut reg = InvalidPageRegistry::new();

        match acquire_for_replay(&mut store, &mut reg, rel(1), 4, true).unwrap() {
            Acquired::Buffer(mut buf) => {
                assert_eq!(store.block_number(&buf), 4);
                // intermediate pins were dropped, only the target is held
                assert_eq!(store.pinned(), 1);
                store.write_image(&mut buf, &[1u8; PAGE_SIZE]);
                store.unlock_release(buf);
            }
            Acquired::Skip => panic!("expected a buffer"),
        }
        assert_eq!(store.nblocks(rel(1)).unwrap(), 5);
        assert!(reg.is_empty());
        assert_eq!(store.pinned(), 0);
    }

    #[test]
    fn zeroed_page_without_init_skips_and_registers_present() {
        let mut store = MemPageStore::new();
        store.create_rel(rel(1), 3);
        // block 2 exists but was never initialized
        let mut reg = InvalidPageRegistry::new();

        match acquire_for_replay(&mut store, &mut reg, rel(1), 2, false).unwrap() {
            Acquired::Skip => {}
            Acquired::Buffer(_) => panic!("expected skip"),
        }
        assert_eq!(reg.len(), 1);
        assert_eq!(store.pinned(), 0);

        // with init set the same page is acceptable
        match acquire_for_replay(&mut store, &mut reg, rel(1), 2, true).unwrap() {
            Acquired::Buffer(buf) => store.unlock_release(buf),
            Acquired::Skip => panic!("expected a buffer"),
        }
    }
}
