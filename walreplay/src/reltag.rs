//! Identifiers for physical storage objects referenced by log records.

use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use wal_meta::{BlockNumber, Oid};

/// Locates one physical relation file throughout the cluster: which
/// tablespace directory it lives in, which database it belongs to, and its
/// file id. Equality is structural, and a locator never changes once a log
/// record has been written with it.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationLocator {
    pub spc_id: Oid,
    pub db_id: Oid,
    pub rel_id: Oid,
}

impl RelationLocator {
    /// Encoded size on the wire: three little-endian u32s, no padding.
    pub const WIRE_SIZE: usize = 12;

    pub fn new(spc_id: Oid, db_id: Oid, rel_id: Oid) -> RelationLocator {
        RelationLocator {
            spc_id,
            db_id,
            rel_id,
        }
    }

    pub fn decode(buf: &mut impl Buf) -> RelationLocator {
        RelationLocator {
            spc_id: buf.get_u32_le(),
            db_id: buf.get_u32_le(),
            rel_id: buf.get_u32_le(),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.spc_id);
        buf.put_u32_le(self.db_id);
        buf.put_u32_le(self.rel_id);
    }
}

impl fmt::Display for RelationLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.spc_id, self.db_id, self.rel_id)
    }
}

/// One physical page of a physical relation: the key of the invalid-page
/// table.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct PageReference {
    pub rel: RelationLocator,
    pub blkno: BlockNumber,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn locator_wire_round_trip() {
        let rel = RelationLocator::new(1663, 12000, 16384);
        let mut buf = BytesMut::new();
        rel.encode(&mut buf);
        assert_eq!(buf.len(), RelationLocator::WIRE_SIZE);
        let mut rd = Bytes::from(buf.freeze());
        assert_eq!(RelationLocator::decode(&mut rd), rel);
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn locator_display() {
        let rel = RelationLocator::new(1663, 12000, 16384);
        assert_eq!(format!("{rel}"), "1663/12000/16384");
    }
}
