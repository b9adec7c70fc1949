//! Framing of log entries.
//!
//! Each entry is a fixed header followed by an opaque payload. The header
//! carries the resource manager id and type tag that route the payload to a
//! redo handler, and a CRC over the payload. Little-endian throughout, like
//! everything else on the wire.

use anyhow::{bail, ensure, Result};
use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use wal_meta::TransactionId;

/// Serialized size of [`EntryHeader`]: length, xid, rmid, info, two pad
/// bytes, crc.
pub const ENTRY_HEADER_LEN: usize = 16;

/// Fixed header of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Total entry length, header included.
    pub total_len: u32,
    /// Transaction that wrote the entry, or 0 for non-transactional entries.
    pub xid: TransactionId,
    /// Resource manager the payload belongs to.
    pub rmid: u8,
    /// Type tag within the resource manager; low nibble reserved for flags.
    pub info: u8,
    /// CRC-32C over the payload.
    pub crc: u32,
}

impl EntryHeader {
    pub fn payload_len(&self) -> usize {
        self.total_len as usize - ENTRY_HEADER_LEN
    }
}

/// Frame one entry: header plus payload, CRC computed here.
pub fn encode_entry(
    xid: TransactionId,
    rmid: u8,
    info: u8,
    payload: &[u8],
    buf: &mut BytesMut,
) -> Result<()> {
    let total_len = ENTRY_HEADER_LEN + payload.len();
    ensure!(
        u32::try_from(total_len).is_ok(),
        "log entry payload of {} bytes exceeds the frame limit",
        payload.len()
    );
    buf.put_u32_le(total_len as u32);
    buf.put_u32_le(xid);
    buf.put_u8(rmid);
    buf.put_u8(info);
    buf.put_u16_le(0);
    buf.put_u32_le(crc32c::crc32c(payload));
    buf.put_slice(payload);
    Ok(())
}

/// Peek the total length of the entry starting at the head of `buf`, without
/// consuming anything. Used by readers to know how much to fetch.
pub fn peek_entry_len(buf: &[u8]) -> Result<usize> {
    ensure!(
        buf.len() >= 4,
        "log entry truncated: {} bytes is too short for a length word",
        buf.len()
    );
    let total_len = LittleEndian::read_u32(buf) as usize;
    ensure!(
        total_len >= ENTRY_HEADER_LEN,
        "log entry header reports impossible length {}",
        total_len
    );
    Ok(total_len)
}

/// Decode one entry off the front of `buf`, verifying the payload CRC.
///
/// A CRC mismatch is corruption, never tolerated: replaying a damaged
/// payload could silently apply garbage to pages.
pub fn decode_entry(buf: &mut Bytes) -> Result<(EntryHeader, Bytes)> {
    ensure!(
        buf.remaining() >= ENTRY_HEADER_LEN,
        "log entry truncated: need {} header bytes, have {}",
        ENTRY_HEADER_LEN,
        buf.remaining()
    );
    let total_len = buf.get_u32_le();
    let xid = buf.get_u32_le();
    let rmid = buf.get_u8();
    let info = buf.get_u8();
    buf.advance(2);
    let crc = buf.get_u32_le();

    let header = EntryHeader {
        total_len,
        xid,
        rmid,
        info,
        crc,
    };
    if (total_len as usize) < ENTRY_HEADER_LEN {
        bail!("log entry header reports impossible length {}", total_len);
    }
    let payload_len = header.payload_len();
    ensure!(
        buf.remaining() >= payload_len,
        "log entry truncated: need {} payload bytes, have {}",
        payload_len,
        buf.remaining()
    );
    let payload = buf.split_to(payload_len);

    let actual = crc32c::crc32c(&payload);
    if actual != crc {
        bail!(
            "incorrect checksum in log entry (expected {:08x}, got {:08x})",
            crc,
            actual
        );
    }

    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let mut buf = BytesMut::new();
        encode_entry(42, 1, 0x60, b"payload bytes", &mut buf).unwrap();
        assert_eq!(peek_entry_len(&buf).unwrap(), buf.len());

        let mut rd = buf.freeze();
        let (header, payload) = decode_entry(&mut rd).unwrap();
        assert_eq!(header.xid, 42);
        assert_eq!(header.rmid, 1);
        assert_eq!(header.info, 0x60);
        assert_eq!(&payload[..], b"payload bytes");
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn consecutive_entries_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_entry(1, 1, 0x00, b"first", &mut buf).unwrap();
        encode_entry(2, 2, 0x10, b"second", &mut buf).unwrap();

        let mut rd = buf.freeze();
        let (h1, p1) = decode_entry(&mut rd).unwrap();
        let (h2, p2) = decode_entry(&mut rd).unwrap();
        assert_eq!((h1.xid, &p1[..]), (1, &b"first"[..]));
        assert_eq!((h2.xid, &p2[..]), (2, &b"second"[..]));
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn corrupt_payload_is_rejected() {
        let mut buf = BytesMut::new();
        encode_entry(7, 1, 0x20, b"some payload", &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let mut rd = buf.freeze();
        let err = decode_entry(&mut rd).unwrap_err();
        assert!(err.to_string().contains("incorrect checksum"));
    }

    #[test]
    fn truncated_entry_is_rejected() {
        let mut buf = BytesMut::new();
        encode_entry(7, 1, 0x20, b"some payload", &mut buf).unwrap();
        let full = buf.freeze();

        let mut rd = full.slice(..ENTRY_HEADER_LEN + 3);
        assert!(decode_entry(&mut rd).is_err());

        let mut rd = full.slice(..6);
        assert!(decode_entry(&mut rd).is_err());
    }

    #[test]
    fn peek_rejects_garbage_length() {
        assert!(peek_entry_len(&[1, 2]).is_err());
        // a length word smaller than the header itself
        assert!(peek_entry_len(&[4, 0, 0, 0]).is_err());
    }
}
