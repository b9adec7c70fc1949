//! Decoding of on-disk transaction-end records.
//!
//! The record kind is carried in the enclosing log entry's type tag (see
//! [`crate::record`]); the payload layouts here are a wire contract shared
//! with the log producer: fixed-width little-endian integers, arrays stored
//! as count-prefixed contiguous blocks with no padding between them. The
//! distributed two-phase trailer deliberately comes last so the plain commit
//! decoder can be reused unchanged underneath it.

use anyhow::{ensure, Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wal_meta::{Oid, TimestampTz, TransactionId};

use crate::reltag::RelationLocator;

/// Type tags of transaction-end records, as stored in the enclosing log
/// entry. Spaced by 0x10 to leave room for per-kind flag bits.
pub mod tags {
    pub const COMMIT: u8 = 0x00;
    pub const PREPARE: u8 = 0x10;
    pub const ABORT: u8 = 0x20;
    pub const COMMIT_PREPARED: u8 = 0x30;
    pub const ABORT_PREPARED: u8 = 0x40;
    pub const ASSIGNMENT: u8 = 0x50;
    pub const COMMIT_COMPACT: u8 = 0x60;
    pub const DISTRIBUTED_COMMIT: u8 = 0x70;
    pub const DISTRIBUTED_FORGET: u8 = 0x80;
}

/// Well-known negative invalidation-message ids. Non-negative ids address a
/// catalog cache directly.
pub const INVAL_CATALOG_ID: i32 = -1;
pub const INVAL_RELCACHE_ID: i32 = -2;
pub const INVAL_SMGR_ID: i32 = -3;
pub const INVAL_RELMAP_ID: i32 = -4;

/// Fixed size of the global transaction id buffer in the distributed
/// trailer; the gid is NUL-padded inside it.
pub const GLOBAL_ID_LEN: usize = 200;

fn need(buf: &impl Buf, n: usize, what: &str) -> Result<()> {
    ensure!(
        buf.remaining() >= n,
        "transaction-end record truncated: need {} bytes for {}, have {}",
        n,
        what,
        buf.remaining()
    );
    Ok(())
}

/// A cache-invalidation notice queued by a committing transaction,
/// broadcast so every backend refreshes the affected in-memory state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalMessage {
    /// Invalidate one entry of the identified catalog cache.
    CatCacheEntry(i32),
    /// Invalidate everything cached from the identified catalog.
    CatalogWide(Oid),
    /// Invalidate the cached descriptor of one relation.
    RelationCache(Oid),
    /// Closed storage-manager file handles must be reopened.
    StorageManager,
    /// The relation map file changed.
    RelationMap,
    /// An id minted by a newer producer version. Observed, never fatal.
    Unrecognized(i32),
}

impl InvalMessage {
    /// Encoded size on the wire: id and argument, 8 bytes, no padding.
    pub const WIRE_SIZE: usize = 8;

    pub fn decode(buf: &mut impl Buf) -> InvalMessage {
        let id = buf.get_i32_le();
        let arg = buf.get_u32_le();
        if id >= 0 {
            InvalMessage::CatCacheEntry(id)
        } else {
            match id {
                INVAL_CATALOG_ID => InvalMessage::CatalogWide(arg),
                INVAL_RELCACHE_ID => InvalMessage::RelationCache(arg),
                INVAL_SMGR_ID => InvalMessage::StorageManager,
                INVAL_RELMAP_ID => InvalMessage::RelationMap,
                _ => {
                    debug!("unrecognized invalidation message id {}", id);
                    InvalMessage::Unrecognized(id)
                }
            }
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let (id, arg) = match *self {
            InvalMessage::CatCacheEntry(cache) => (cache, 0),
            InvalMessage::CatalogWide(cat) => (INVAL_CATALOG_ID, cat),
            InvalMessage::RelationCache(rel) => (INVAL_RELCACHE_ID, rel),
            InvalMessage::StorageManager => (INVAL_SMGR_ID, 0),
            InvalMessage::RelationMap => (INVAL_RELMAP_ID, 0),
            InvalMessage::Unrecognized(id) => (id, 0),
        };
        buf.put_i32_le(id);
        buf.put_u32_le(arg);
    }
}

/// Identity of a distributed (two-phase) transaction across the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalXact {
    pub gid: String,
    pub gxid: u32,
}

impl GlobalXact {
    pub fn decode(buf: &mut Bytes) -> Result<GlobalXact> {
        need(buf, GLOBAL_ID_LEN + 4, "distributed trailer")?;
        let raw = buf.split_to(GLOBAL_ID_LEN);
        let end = raw.iter().position(|b| *b == 0).unwrap_or(GLOBAL_ID_LEN);
        let gid = std::str::from_utf8(&raw[..end])
            .context("global transaction id is not valid UTF-8")?
            .to_owned();
        let gxid = buf.get_u32_le();
        Ok(GlobalXact { gid, gxid })
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        ensure!(
            self.gid.len() < GLOBAL_ID_LEN,
            "global transaction id longer than {} bytes",
            GLOBAL_ID_LEN - 1
        );
        buf.put_slice(self.gid.as_bytes());
        buf.put_bytes(0, GLOBAL_ID_LEN - self.gid.len());
        buf.put_u32_le(self.gxid);
        Ok(())
    }
}

fn decode_xid_list(buf: &mut Bytes, what: &str) -> Result<Vec<TransactionId>> {
    need(buf, 4, what)?;
    let count = buf.get_u32_le() as usize;
    need(buf, count * 4, what)?;
    let mut xids = Vec::with_capacity(count);
    for _ in 0..count {
        xids.push(buf.get_u32_le());
    }
    Ok(xids)
}

fn decode_rel_list(buf: &mut Bytes) -> Result<Vec<RelationLocator>> {
    need(buf, 4, "dropped-relation list")?;
    let count = buf.get_u32_le() as usize;
    need(buf, count * RelationLocator::WIRE_SIZE, "dropped-relation list")?;
    let mut rels = Vec::with_capacity(count);
    for _ in 0..count {
        rels.push(RelationLocator::decode(buf));
    }
    Ok(rels)
}

/// The full commit record: dropped relations first (their count establishes
/// the offset of everything after), then subtransactions, then invalidation
/// messages, each array chained directly after the previous one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XactCommit {
    pub xact_time: TimestampTz,
    pub dropped_relations: Vec<RelationLocator>,
    pub subxacts: Vec<TransactionId>,
    pub inval_msgs: Vec<InvalMessage>,
}

impl XactCommit {
    pub fn decode(buf: &mut Bytes) -> Result<XactCommit> {
        need(buf, 8, "commit time")?;
        let xact_time = buf.get_i64_le();
        let dropped_relations = decode_rel_list(buf)?;
        let subxacts = decode_xid_list(buf, "subtransaction list")?;

        need(buf, 4, "invalidation list")?;
        let nmsgs = buf.get_u32_le() as usize;
        need(buf, nmsgs * InvalMessage::WIRE_SIZE, "invalidation list")?;
        let mut inval_msgs = Vec::with_capacity(nmsgs);
        for _ in 0..nmsgs {
            inval_msgs.push(InvalMessage::decode(buf));
        }

        Ok(XactCommit {
            xact_time,
            dropped_relations,
            subxacts,
            inval_msgs,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.xact_time);
        buf.put_u32_le(self.dropped_relations.len() as u32);
        for rel in &self.dropped_relations {
            rel.encode(buf);
        }
        buf.put_u32_le(self.subxacts.len() as u32);
        for xid in &self.subxacts {
            buf.put_u32_le(*xid);
        }
        buf.put_u32_le(self.inval_msgs.len() as u32);
        for msg in &self.inval_msgs {
            msg.encode(buf);
        }
    }
}

/// The full abort record: like a commit but with nothing to invalidate,
/// since an aborted transaction published no catalog changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XactAbort {
    pub xact_time: TimestampTz,
    pub dropped_relations: Vec<RelationLocator>,
    pub subxacts: Vec<TransactionId>,
}

impl XactAbort {
    pub fn decode(buf: &mut Bytes) -> Result<XactAbort> {
        need(buf, 8, "abort time")?;
        let xact_time = buf.get_i64_le();
        let dropped_relations = decode_rel_list(buf)?;
        let subxacts = decode_xid_list(buf, "subtransaction list")?;
        Ok(XactAbort {
            xact_time,
            dropped_relations,
            subxacts,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.xact_time);
        buf.put_u32_le(self.dropped_relations.len() as u32);
        for rel in &self.dropped_relations {
            rel.encode(buf);
        }
        buf.put_u32_le(self.subxacts.len() as u32);
        for xid in &self.subxacts {
            buf.put_u32_le(*xid);
        }
    }
}

/// The compact commit record. Written when the transaction dropped no
/// relations and queued no invalidations, which lets replay skip that
/// bookkeeping entirely; the decoder must not try to read the absent lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XactCompact {
    pub xact_time: TimestampTz,
    pub subxacts: Vec<TransactionId>,
}

impl XactCompact {
    pub fn decode(buf: &mut Bytes) -> Result<XactCompact> {
        need(buf, 8, "commit time")?;
        let xact_time = buf.get_i64_le();
        let subxacts = decode_xid_list(buf, "subtransaction list")?;
        Ok(XactCompact { xact_time, subxacts })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.xact_time);
        buf.put_u32_le(self.subxacts.len() as u32);
        for xid in &self.subxacts {
            buf.put_u32_le(*xid);
        }
    }
}

/// A decoded transaction-end record of any shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum XactEnd {
    CommitCompact(XactCompact),
    Commit(XactCommit),
    Abort(XactAbort),
    Prepare,
    CommitPrepared {
        xid: TransactionId,
        rec: XactCommit,
    },
    AbortPrepared {
        xid: TransactionId,
        rec: XactAbort,
    },
    /// Associates newly assigned subtransactions with their top-level
    /// transaction, for tracing only. The enclosing entry's header xid is
    /// deliberately ignored in favor of the embedded top-level id.
    Assignment {
        top_xid: TransactionId,
        subxacts: Vec<TransactionId>,
    },
    DistributedCommit {
        rec: XactCommit,
        gxact: GlobalXact,
    },
    /// A previously distributed-committed transaction whose cluster-wide
    /// bookkeeping can be released.
    DistributedForget(GlobalXact),
    /// A tag minted by a newer producer version.
    Unknown(u8),
}

/// Decode one transaction-end record payload given the type tag from the
/// enclosing log entry.
///
/// An unrecognized tag is rendered as [`XactEnd::Unknown`] rather than an
/// error, so logs written by a newer version replay past it; a payload too
/// short for its own tag is an error, since that is corruption rather than a
/// format extension.
pub fn decode_xact_record(tag: u8, buf: &mut Bytes) -> Result<XactEnd> {
    let rec = match tag {
        tags::COMMIT_COMPACT => XactEnd::CommitCompact(XactCompact::decode(buf)?),
        tags::COMMIT => XactEnd::Commit(XactCommit::decode(buf)?),
        tags::ABORT => XactEnd::Abort(XactAbort::decode(buf)?),
        tags::PREPARE => XactEnd::Prepare,
        tags::COMMIT_PREPARED => {
            need(buf, 4, "prepared xid")?;
            let xid = buf.get_u32_le();
            XactEnd::CommitPrepared {
                xid,
                rec: XactCommit::decode(buf)?,
            }
        }
        tags::ABORT_PREPARED => {
            need(buf, 4, "prepared xid")?;
            let xid = buf.get_u32_le();
            XactEnd::AbortPrepared {
                xid,
                rec: XactAbort::decode(buf)?,
            }
        }
        tags::ASSIGNMENT => {
            need(buf, 4, "top-level xid")?;
            let top_xid = buf.get_u32_le();
            let subxacts = decode_xid_list(buf, "assigned subtransaction list")?;
            XactEnd::Assignment { top_xid, subxacts }
        }
        tags::DISTRIBUTED_COMMIT => {
            // The global transaction information is stored last, so the
            // regular commit decoder runs first and leaves the cursor at
            // the trailer.
            let rec = XactCommit::decode(buf)?;
            let gxact = GlobalXact::decode(buf)?;
            XactEnd::DistributedCommit { rec, gxact }
        }
        tags::DISTRIBUTED_FORGET => XactEnd::DistributedForget(GlobalXact::decode(buf)?),
        other => {
            warn!("unrecognized transaction-end record tag 0x{:02x}", other);
            XactEnd::Unknown(other)
        }
    };
    Ok(rec)
}

impl XactEnd {
    /// Type tag under which this record is framed.
    pub fn tag(&self) -> u8 {
        match self {
            XactEnd::CommitCompact(_) => tags::COMMIT_COMPACT,
            XactEnd::Commit(_) => tags::COMMIT,
            XactEnd::Abort(_) => tags::ABORT,
            XactEnd::Prepare => tags::PREPARE,
            XactEnd::CommitPrepared { .. } => tags::COMMIT_PREPARED,
            XactEnd::AbortPrepared { .. } => tags::ABORT_PREPARED,
            XactEnd::Assignment { .. } => tags::ASSIGNMENT,
            XactEnd::DistributedCommit { .. } => tags::DISTRIBUTED_COMMIT,
            XactEnd::DistributedForget(_) => tags::DISTRIBUTED_FORGET,
            XactEnd::Unknown(tag) => *tag,
        }
    }

    /// Relations dropped by this transaction, if its shape carries any.
    pub fn dropped_relations(&self) -> &[RelationLocator] {
        match self {
            XactEnd::Commit(rec)
            | XactEnd::CommitPrepared { rec, .. }
            | XactEnd::DistributedCommit { rec, .. } => &rec.dropped_relations,
            XactEnd::Abort(rec) | XactEnd::AbortPrepared { rec, .. } => &rec.dropped_relations,
            _ => &[],
        }
    }

    /// Producer-side encoding of the payload (the tag travels in the
    /// enclosing log entry).
    pub fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            XactEnd::CommitCompact(rec) => rec.encode(buf),
            XactEnd::Commit(rec) => rec.encode(buf),
            XactEnd::Abort(rec) => rec.encode(buf),
            XactEnd::Prepare => {}
            XactEnd::CommitPrepared { xid, rec } => {
                buf.put_u32_le(*xid);
                rec.encode(buf);
            }
            XactEnd::AbortPrepared { xid, rec } => {
                buf.put_u32_le(*xid);
                rec.encode(buf);
            }
            XactEnd::Assignment { top_xid, subxacts } => {
                buf.put_u32_le(*top_xid);
                buf.put_u32_le(subxacts.len() as u32);
                for xid in subxacts {
                    buf.put_u32_le(*xid);
                }
            }
            XactEnd::DistributedCommit { rec, gxact } => {
                rec.encode(buf);
                gxact.encode(buf)?;
            }
            XactEnd::DistributedForget(gxact) => gxact.encode(buf)?,
            XactEnd::Unknown(_) => {}
        }
        Ok(())
    }

    /// Human-readable rendering for record inspection tooling and trace
    /// logging.
    pub fn describe(&self) -> String {
        fn commit_desc(out: &mut String, rec: &XactCommit) {
            out.push_str(&format!("{}", rec.xact_time));
            if !rec.dropped_relations.is_empty() {
                out.push_str("; rels:");
                for rel in &rec.dropped_relations {
                    out.push_str(&format!(" {rel}"));
                }
            }
            if !rec.subxacts.is_empty() {
                out.push_str("; subxacts:");
                for xid in &rec.subxacts {
                    out.push_str(&format!(" {xid}"));
                }
            }
            if !rec.inval_msgs.is_empty() {
                out.push_str("; inval msgs:");
                for msg in &rec.inval_msgs {
                    match msg {
                        InvalMessage::CatCacheEntry(id) => out.push_str(&format!(" catcache {id}")),
                        InvalMessage::CatalogWide(cat) => out.push_str(&format!(" catalog {cat}")),
                        InvalMessage::RelationCache(rel) => {
                            out.push_str(&format!(" relcache {rel}"))
                        }
                        InvalMessage::StorageManager => out.push_str(" smgr"),
                        InvalMessage::RelationMap => out.push_str(" relmap"),
                        InvalMessage::Unrecognized(id) => {
                            out.push_str(&format!(" unknown id {id}"))
                        }
                    }
                }
            }
        }

        fn abort_desc(out: &mut String, rec: &XactAbort) {
            out.push_str(&format!("{}", rec.xact_time));
            if !rec.dropped_relations.is_empty() {
                out.push_str("; rels:");
                for rel in &rec.dropped_relations {
                    out.push_str(&format!(" {rel}"));
                }
            }
            if !rec.subxacts.is_empty() {
                out.push_str("; subxacts:");
                for xid in &rec.subxacts {
                    out.push_str(&format!(" {xid}"));
                }
            }
        }

        let mut out = String::new();
        match self {
            XactEnd::CommitCompact(rec) => {
                out.push_str(&format!("commit: {}", rec.xact_time));
                if !rec.subxacts.is_empty() {
                    out.push_str("; subxacts:");
                    for xid in &rec.subxacts {
                        out.push_str(&format!(" {xid}"));
                    }
                }
            }
            XactEnd::Commit(rec) => {
                out.push_str("commit: ");
                commit_desc(&mut out, rec);
            }
            XactEnd::Abort(rec) => {
                out.push_str("abort: ");
                abort_desc(&mut out, rec);
            }
            XactEnd::Prepare => out.push_str("prepare"),
            XactEnd::CommitPrepared { xid, rec } => {
                out.push_str(&format!("commit prepared {xid}: "));
                commit_desc(&mut out, rec);
            }
            XactEnd::AbortPrepared { xid, rec } => {
                out.push_str(&format!("abort prepared {xid}: "));
                abort_desc(&mut out, rec);
            }
            XactEnd::Assignment { top_xid, subxacts } => {
                out.push_str(&format!("xid assignment xtop {top_xid}: subxacts:"));
                for xid in subxacts {
                    out.push_str(&format!(" {xid}"));
                }
            }
            XactEnd::DistributedCommit { rec, gxact } => {
                out.push_str("distributed commit ");
                commit_desc(&mut out, rec);
                out.push_str(&format!(" gid = {}, gxid = {}", gxact.gid, gxact.gxid));
            }
            XactEnd::DistributedForget(gxact) => {
                out.push_str(&format!(
                    "distributed forget gid = {}, gxid = {}",
                    gxact.gid, gxact.gxid
                ));
            }
            XactEnd::Unknown(tag) => out.push_str(&format!("UNKNOWN (0x{tag:02x})")),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(rel_id: u32) -> RelationLocator {
        RelationLocator::new(1663, 1, rel_id)
    }

    fn sample_commit() -> XactCommit {
        XactCommit {
            xact_time: 712_224_000_000_000,
            dropped_relations: vec![rel(16384), rel(16385)],
            subxacts: vec![101, 102, 103],
            inval_msgs: vec![InvalMessage::RelationCache(16385)],
        }
    }

    #[test]
    fn commit_round_trip_consumes_exact_payload() {
        let orig = sample_commit();
        let mut buf = BytesMut::new();
        orig.encode(&mut buf);

        let mut rd = buf.freeze();
        let decoded = XactCommit::decode(&mut rd).unwrap();
        assert_eq!(decoded, orig);
        // the decoder must stop exactly at the end of its own payload
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn compact_never_reads_a_relation_list() {
        let compact = XactCompact {
            xact_time: 1,
            subxacts: vec![7],
        };
        let mut buf = BytesMut::new();
        compact.encode(&mut buf);
        // Trailing bytes that would happily parse as a relation list must be
        // left untouched by the compact decoder.
        let junk_len = 4 + RelationLocator::WIRE_SIZE;
        buf.put_u32_le(1);
        rel(999).encode(&mut buf);

        let mut rd = buf.freeze();
        let decoded = match decode_xact_record(tags::COMMIT_COMPACT, &mut rd).unwrap() {
            XactEnd::CommitCompact(rec) => rec,
            other => panic!("unexpected decode: {other:?}"),
        };
        assert_eq!(decoded, compact);
        assert_eq!(rd.remaining(), junk_len);
    }

    #[test]
    fn abort_has_no_invalidation_list() {
        let orig = XactAbort {
            xact_time: 42,
            dropped_relations: vec![rel(500)],
            subxacts: vec![9, 10],
        };
        let mut buf = BytesMut::new();
        orig.encode(&mut buf);
        let mut rd = buf.freeze();
        match decode_xact_record(tags::ABORT, &mut rd).unwrap() {
            XactEnd::Abort(decoded) => assert_eq!(decoded, orig),
            other => panic!("unexpected decode: {other:?}"),
        }
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn distributed_commit_reads_trailer_last() {
        let rec = XactEnd::DistributedCommit {
            rec: sample_commit(),
            gxact: GlobalXact {
                gid: "1668123456-0000000123".to_owned(),
                gxid: 123,
            },
        };
        let mut buf = BytesMut::new();
        rec.encode_payload(&mut buf).unwrap();

        let mut rd = buf.freeze();
        match decode_xact_record(tags::DISTRIBUTED_COMMIT, &mut rd).unwrap() {
            XactEnd::DistributedCommit { rec: crec, gxact } => {
                assert_eq!(crec, sample_commit());
                assert_eq!(gxact.gid, "1668123456-0000000123");
                assert_eq!(gxact.gxid, 123);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn distributed_forget_round_trip() {
        let orig = GlobalXact {
            gid: "gx-9".to_owned(),
            gxid: 9,
        };
        let mut buf = BytesMut::new();
        XactEnd::DistributedForget(orig.clone())
            .encode_payload(&mut buf)
            .unwrap();
        let mut rd = buf.freeze();
        match decode_xact_record(tags::DISTRIBUTED_FORGET, &mut rd).unwrap() {
            XactEnd::DistributedForget(decoded) => assert_eq!(decoded, orig),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn prepared_variants_embed_full_records() {
        let rec = XactEnd::CommitPrepared {
            xid: 7777,
            rec: sample_commit(),
        };
        let mut buf = BytesMut::new();
        rec.encode_payload(&mut buf).unwrap();
        let mut rd = buf.freeze();
        match decode_xact_record(tags::COMMIT_PREPARED, &mut rd).unwrap() {
            XactEnd::CommitPrepared { xid, rec } => {
                assert_eq!(xid, 7777);
                assert_eq!(rec, sample_commit());
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn assignment_uses_embedded_top_xid() {
        let rec = XactEnd::Assignment {
            top_xid: 500,
            subxacts: vec![501, 502],
        };
        let mut buf = BytesMut::new();
        rec.encode_payload(&mut buf).unwrap();
        let mut rd = buf.freeze();
        match decode_xact_record(tags::ASSIGNMENT, &mut rd).unwrap() {
            XactEnd::Assignment { top_xid, subxacts } => {
                assert_eq!(top_xid, 500);
                assert_eq!(subxacts, vec![501, 502]);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_tolerated_and_rendered() {
        let mut rd = Bytes::from_static(&[0u8; 16]);
        match decode_xact_record(0xF0, &mut rd).unwrap() {
            XactEnd::Unknown(tag) => assert_eq!(tag, 0xF0),
            other => panic!("unexpected decode: {other:?}"),
        }
        assert_eq!(XactEnd::Unknown(0xF0).describe(), "UNKNOWN (0xf0)");
    }

    #[test]
    fn unrecognized_inval_id_does_not_abort_decode() {
        let orig = XactCommit {
            xact_time: 5,
            dropped_relations: vec![],
            subxacts: vec![],
            inval_msgs: vec![InvalMessage::Unrecognized(-77), InvalMessage::StorageManager],
        };
        let mut buf = BytesMut::new();
        orig.encode(&mut buf);
        let mut rd = buf.freeze();
        let decoded = XactCommit::decode(&mut rd).unwrap();
        assert_eq!(
            decoded.inval_msgs,
            vec![InvalMessage::Unrecognized(-77), InvalMessage::StorageManager]
        );
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let orig = sample_commit();
        let mut buf = BytesMut::new();
        orig.encode(&mut buf);
        let full = buf.freeze();
        let mut rd = full.slice(..full.len() - 3);
        assert!(XactCommit::decode(&mut rd).is_err());
    }

    #[test]
    fn describe_compact_and_commit() {
        let compact = XactEnd::CommitCompact(XactCompact {
            xact_time: 99,
            subxacts: vec![5],
        });
        assert_eq!(compact.describe(), "commit: 99; subxacts: 5");

        let commit = XactEnd::Commit(sample_commit());
        let desc = commit.describe();
        assert!(desc.starts_with("commit: "));
        assert!(desc.contains("rels: 1663/1/16384 1663/1/16385"));
        assert!(desc.contains("subxacts: 101 102 103"));
        assert!(desc.contains("inval msgs: relcache 16385"));
    }
}
