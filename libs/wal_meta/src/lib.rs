//! Shared scalar types and arithmetic for the append-only log: log sequence
//! numbers, segment numbering and the on-disk segment naming convention.

pub mod lsn;
pub mod seg;

pub use lsn::{AtomicLsn, Lsn};
pub use seg::SegmentNumber;

/// Object identifier of a catalog-managed entity (tablespace, database,
/// relation file).
pub type Oid = u32;

/// Number of a page within a relation fork.
pub type BlockNumber = u32;

/// 32-bit transaction identifier.
pub type TransactionId = u32;

/// Commit timestamp, microseconds since the storage epoch.
pub type TimestampTz = i64;
