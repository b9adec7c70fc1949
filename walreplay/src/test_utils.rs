//! Utils for distributed unit testing: an in-memory page store with pin
//! accounting, and logging setup shared by tests across the crate.

use std::collections::HashMap;

use anyhow::{bail, Result};
use wal_meta::BlockNumber;

use crate::replay_buffer::{PageStore, NEW_BLOCK};
use crate::reltag::RelationLocator;

pub const PAGE_SIZE: usize = 8192;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("walreplay=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A pinned page handle of [`MemPageStore`].
#[derive(Debug)]
pub struct MemBuffer {
    pub rel: RelationLocator,
    pub blkno: BlockNumber,
    pub locked: bool,
}

/// Buffer manager double keeping relations as vectors of pages in memory.
/// Tracks outstanding pins so tests can assert none leak.
#[derive(Debug, Default)]
pub struct MemPageStore {
    rels: HashMap<RelationLocator, Vec<Box<[u8; PAGE_SIZE]>>>,
    pins: usize,
}

impl MemPageStore {
    pub fn new() -> MemPageStore {
        MemPageStore::default()
    }

    /// Pre-create a relation with `nblocks` zeroed (uninitialized) pages.
    pub fn create_rel(&mut self, rel: RelationLocator, nblocks: u32) {
        let pages = (0..nblocks)
            .map(|_| Box::new([0u8; PAGE_SIZE]))
            .collect();
        self.rels.insert(rel, pages);
    }

    /// Stamp a minimal header onto a page so it no longer reads as new.
    pub fn format_page(&mut self, rel: RelationLocator, blkno: BlockNumber) {
        let page = &mut self.rels.get_mut(&rel).unwrap()[blkno as usize];
        page[0] = 0x50;
        page[1] = 0x01;
    }

    pub fn rel_exists(&self, rel: RelationLocator) -> bool {
        self.rels.contains_key(&rel)
    }

    pub fn page(&self, rel: RelationLocator, blkno: BlockNumber) -> &[u8; PAGE_SIZE] {
        &self.rels[&rel][blkno as usize]
    }

    /// Outstanding pin count.
    pub fn pinned(&self) -> usize {
        self.pins
    }
}

impl PageStore for MemPageStore {
    type Buffer = MemBuffer;

    fn open_or_create(&mut self, rel: RelationLocator) -> Result<()> {
        self.rels.entry(rel).or_default();
        Ok(())
    }

    fn nblocks(&mut self, rel: RelationLocator) -> Result<BlockNumber> {
        match self.rels.get(&rel) {
            Some(pages) => Ok(pages.len() as BlockNumber),
            None => bail!("relation {} is not open", rel),
        }
    }

    fn read_pinned(&mut self, rel: RelationLocator, blkno: BlockNumber) -> Result<MemBuffer> {
        let Some(pages) = self.rels.get_mut(&rel) else {
            bail!("relation {} is not open", rel);
        };
        let blkno = if blkno == NEW_BLOCK {
            pages.push(Box::new([0u8; PAGE_SIZE]));
            (pages.len() - 1) as BlockNumber
        } else {
            if blkno as usize >= pages.len() {
                bail!("block {} of relation {} is past the end", blkno, rel);
            }
            blkno
        };
        self.pins += 1;
        Ok(MemBuffer {
            rel,
            blkno,
            locked: false,
        })
    }

    fn lock_exclusive(&mut self, buf: &mut MemBuffer) {
        buf.locked = true;
    }

    fn unlock_release(&mut self, mut buf: MemBuffer) {
        buf.locked = false;
        self.pins -= 1;
    }

    fn release(&mut self, buf: MemBuffer) {
        debug_assert!(!buf.locked);
        self.pins -= 1;
    }

    fn write_image(&mut self, buf: &mut MemBuffer, data: &[u8]) {
        let page = &mut self.rels.get_mut(&buf.rel).unwrap()[buf.blkno as usize];
        let len = data.len().min(PAGE_SIZE);
        page[..len].copy_from_slice(&data[..len]);
    }

    fn block_number(&self, buf: &MemBuffer) -> BlockNumber {
        buf.blkno
    }

    fn page_is_new(&self, buf: &MemBuffer) -> bool {
        self.rels[&buf.rel][buf.blkno as usize].iter().all(|b| *b == 0)
    }

    fn forget_rel(&mut self, _rel: RelationLocator) {
        // nothing cached per relation here; file removal is the storage
        // manager's own redo, not ours
    }
}
