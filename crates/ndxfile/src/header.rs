use byteorder::{ByteOrder, LittleEndian};

use crate::tag::TAG_WIRE_BYTES;

/// Format version, packed major.minor.patch (major and minor 8 bits each).
pub const FORMAT_VERSION: u32 = 0x0100_0000;

/// Bytes the header struct occupies on disk.
pub const HEADER_WIRE_BYTES: usize = 36;

/// File offset of the header struct (just past the header tag).
pub const HEADER_FILE_OFFSET: u64 = TAG_WIRE_BYTES as u64;

/// The database header, rewritten in place after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    /// Monotone counter assigned to each created record and its slot, used
    /// as an integrity cross-check on reads.
    pub record_reference: u32,
    /// File offset where the next data record will be appended.
    pub next_free_data: u32,
    /// Number of live records.
    pub nr_of_records: u32,
    /// Total index slots ever materialized (live, deleted, and reserved).
    pub nr_of_index_records: u32,
    /// Slot number of the most recently deleted slot, or -1. The deleted
    /// slots form a stack threaded through their status fields.
    pub last_deleted_index: i32,
    /// File offset of the next unused reserved slot.
    pub next_free_index: u32,
    /// Slots per reserved run.
    pub reserved_index_records: u16,
    pub nr_of_keys: u16,
    /// Sum of segment sizes across all keys.
    pub total_key_size: u16,
    /// Bytes the descriptor block occupies.
    pub key_descriptor_size: u16,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_WIRE_BYTES] {
        let mut out = [0u8; HEADER_WIRE_BYTES];
        LittleEndian::write_u32(&mut out[0..4], self.version);
        LittleEndian::write_u32(&mut out[4..8], self.record_reference);
        LittleEndian::write_u32(&mut out[8..12], self.next_free_data);
        LittleEndian::write_u32(&mut out[12..16], self.nr_of_records);
        LittleEndian::write_u32(&mut out[16..20], self.nr_of_index_records);
        LittleEndian::write_i32(&mut out[20..24], self.last_deleted_index);
        LittleEndian::write_u32(&mut out[24..28], self.next_free_index);
        LittleEndian::write_u16(&mut out[28..30], self.reserved_index_records);
        LittleEndian::write_u16(&mut out[30..32], self.nr_of_keys);
        LittleEndian::write_u16(&mut out[32..34], self.total_key_size);
        LittleEndian::write_u16(&mut out[34..36], self.key_descriptor_size);
        out
    }

    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            version: LittleEndian::read_u32(&bytes[0..4]),
            record_reference: LittleEndian::read_u32(&bytes[4..8]),
            next_free_data: LittleEndian::read_u32(&bytes[8..12]),
            nr_of_records: LittleEndian::read_u32(&bytes[12..16]),
            nr_of_index_records: LittleEndian::read_u32(&bytes[16..20]),
            last_deleted_index: LittleEndian::read_i32(&bytes[20..24]),
            next_free_index: LittleEndian::read_u32(&bytes[24..28]),
            reserved_index_records: LittleEndian::read_u16(&bytes[28..30]),
            nr_of_keys: LittleEndian::read_u16(&bytes[30..32]),
            total_key_size: LittleEndian::read_u16(&bytes[32..34]),
            key_descriptor_size: LittleEndian::read_u16(&bytes[34..36]),
        }
    }
}
