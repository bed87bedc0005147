use byteorder::{ByteOrder, LittleEndian};

use crate::FormatError;

/// Bytes a record tag occupies on disk.
pub const TAG_WIRE_BYTES: usize = 16;

const RAW_HEADER: i32 = -4;
const RAW_INDEX: i32 = -3;
const RAW_NEXT_INDEX: i32 = -2;
const RAW_DELETED_DATA: i32 = -1;

/// Discriminates what follows a record tag in the file.
///
/// The raw values are part of the format. Non-negative raw ids all decode to
/// [`TagId::Data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagId {
    /// File prefix: header struct plus key descriptors.
    Header,
    /// A reserved run of index slots.
    Index,
    /// Chain link patched to the next run's `Index` tag when a run is added.
    NextIndex,
    /// A data record whose slot has been deleted.
    DeletedData,
    /// A live data record; the payload follows the tag.
    Data,
}

impl TagId {
    pub fn from_raw(raw: i32) -> Result<Self, FormatError> {
        match raw {
            RAW_HEADER => Ok(TagId::Header),
            RAW_INDEX => Ok(TagId::Index),
            RAW_NEXT_INDEX => Ok(TagId::NextIndex),
            RAW_DELETED_DATA => Ok(TagId::DeletedData),
            raw if raw >= 0 => Ok(TagId::Data),
            raw => Err(FormatError::InvalidTagId(raw)),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            TagId::Header => RAW_HEADER,
            TagId::Index => RAW_INDEX,
            TagId::NextIndex => RAW_NEXT_INDEX,
            TagId::DeletedData => RAW_DELETED_DATA,
            TagId::Data => 0,
        }
    }
}

/// The 16-byte tag preceding every header, run, and data record.
///
/// `size` doubles as the chain pointer: for a [`TagId::NextIndex`] tag it
/// holds the file offset of the next run's `Index` tag (zero while the run is
/// the last one). Use [`RecordTag::next_index_offset`] to read it under that
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTag {
    pub id: TagId,
    /// Cross-check reference shared with the owning index slot.
    pub record_ref: u32,
    pub size: u32,
    /// File offset of the following record.
    pub offset: u32,
}

impl RecordTag {
    pub fn new(id: TagId, record_ref: u32, size: u32, offset: u32) -> Self {
        Self {
            id,
            record_ref,
            size,
            offset,
        }
    }

    /// The chain pointer of a `NextIndex` tag.
    pub fn next_index_offset(&self) -> u32 {
        self.size
    }

    pub fn encode(&self) -> [u8; TAG_WIRE_BYTES] {
        let mut out = [0u8; TAG_WIRE_BYTES];
        LittleEndian::write_i32(&mut out[0..4], self.id.to_raw());
        LittleEndian::write_u32(&mut out[4..8], self.record_ref);
        LittleEndian::write_u32(&mut out[8..12], self.size);
        LittleEndian::write_u32(&mut out[12..16], self.offset);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let id = TagId::from_raw(LittleEndian::read_i32(&bytes[0..4]))?;
        Ok(Self {
            id,
            record_ref: LittleEndian::read_u32(&bytes[4..8]),
            size: LittleEndian::read_u32(&bytes[8..12]),
            offset: LittleEndian::read_u32(&bytes[12..16]),
        })
    }
}
