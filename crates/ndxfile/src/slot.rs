use byteorder::{ByteOrder, LittleEndian};

use crate::FormatError;

/// Bytes the fixed part of an index slot occupies; the normalized key bytes
/// follow immediately.
pub const SLOT_WIRE_BYTES: usize = 20;

const RAW_RESERVED: i32 = -2;
const RAW_LIVE: i32 = -1;

/// Slot state, stored as a signed 32-bit value.
///
/// A non-negative raw value marks the slot deleted and doubles as the slot
/// number of the *previously* deleted slot, so the deleted slots form a
/// stack headed by the header's `last_deleted_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Materialized but never used.
    Reserved,
    /// Holds a live record.
    Live,
    /// Deleted; the payload is the previous deleted slot number. The stack
    /// bottom stores its own slot number (a negative terminator would
    /// collide with the `Reserved`/`Live` raw values).
    Deleted(u32),
}

impl SlotStatus {
    pub fn from_raw(raw: i32) -> Result<Self, FormatError> {
        match raw {
            RAW_RESERVED => Ok(SlotStatus::Reserved),
            RAW_LIVE => Ok(SlotStatus::Live),
            raw if raw >= 0 => Ok(SlotStatus::Deleted(raw as u32)),
            raw => Err(FormatError::InvalidSlotStatus(raw)),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            SlotStatus::Reserved => RAW_RESERVED,
            SlotStatus::Live => RAW_LIVE,
            SlotStatus::Deleted(prev) => prev as i32,
        }
    }
}

/// The fixed part of an index slot. The record's normalized composite key
/// bytes are stored right after it, both on disk and in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    pub status: SlotStatus,
    /// File offset of this slot.
    pub offset: u32,
    /// File offset of the record's data tag.
    pub data_offset: u32,
    /// Payload bytes of the record.
    pub data_size: u32,
    /// Copy of the header's `record_reference` at creation time; re-checked
    /// against the data tag on every read.
    pub record_ref: u32,
}

impl IndexSlot {
    /// A fresh reserved slot at `offset`.
    pub fn reserved(offset: u32) -> Self {
        Self {
            status: SlotStatus::Reserved,
            offset,
            data_offset: 0,
            data_size: 0,
            record_ref: 0,
        }
    }

    pub fn encode(&self) -> [u8; SLOT_WIRE_BYTES] {
        let mut out = [0u8; SLOT_WIRE_BYTES];
        LittleEndian::write_i32(&mut out[0..4], self.status.to_raw());
        LittleEndian::write_u32(&mut out[4..8], self.offset);
        LittleEndian::write_u32(&mut out[8..12], self.data_offset);
        LittleEndian::write_u32(&mut out[12..16], self.data_size);
        LittleEndian::write_u32(&mut out[16..20], self.record_ref);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let status = SlotStatus::from_raw(LittleEndian::read_i32(&bytes[0..4]))?;
        Ok(Self {
            status,
            offset: LittleEndian::read_u32(&bytes[4..8]),
            data_offset: LittleEndian::read_u32(&bytes[8..12]),
            data_size: LittleEndian::read_u32(&bytes[12..16]),
            record_ref: LittleEndian::read_u32(&bytes[16..20]),
        })
    }
}
