//! Log segment numbering.
//!
//! The log is cut into fixed-size segments, the unit of retention and
//! deletion. Segments are numbered by a monotonically increasing integer;
//! on disk they are grouped into logical files of 2^32 bytes each, and the
//! 24-hex-digit file name encodes (timeline, logical file, segment within
//! the file), the same convention the original log manager uses.

/// Identifies one fixed-size chunk of the append-only log.
pub type SegmentNumber = u64;

/// Timeline component of segment file names. Timeline switching is not part
/// of this engine, so it is pinned to the initial timeline.
pub const LOG_TLI: u32 = 1;

/// How many segments fit in one 2^32-byte logical log file.
pub fn segments_per_logical_file(seg_sz: usize) -> SegmentNumber {
    0x1_0000_0000u64 / seg_sz as u64
}

/// On-disk file name of a segment, used in retention diagnostics.
pub fn segment_file_name(segno: SegmentNumber, seg_sz: usize) -> String {
    let per_file = segments_per_logical_file(seg_sz);
    format!(
        "{:>08X}{:>08X}{:>08X}",
        LOG_TLI,
        segno / per_file,
        segno % per_file
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEG_SZ: usize = 64 * 1024 * 1024;

    #[test]
    fn test_segments_per_logical_file() {
        assert_eq!(segments_per_logical_file(SEG_SZ), 64);
        assert_eq!(segments_per_logical_file(16 * 1024 * 1024), 256);
    }

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name(0, SEG_SZ), "000000010000000000000000");
        assert_eq!(segment_file_name(63, SEG_SZ), "00000001000000000000003F");
        assert_eq!(segment_file_name(64, SEG_SZ), "000000010000000100000000");
        assert_eq!(
            segment_file_name(3 * 64 + 10, SEG_SZ),
            "00000001000000030000000A"
        );
    }
}
