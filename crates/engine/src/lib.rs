//! # engine — single-file indexed-record store
//!
//! A low-level embedded database in the spirit of VMS indexed file I/O: one
//! file holds variable-length opaque record payloads plus a set of secondary
//! indexes (*search keys*) permitting lookup by composite byte-level keys.
//! There is no query language, no locking, and no cross-process coordination
//! — callers serialize access externally.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────────┐
//! │                        DATABASE                          │
//! │                                                          │
//! │ create.rs → file prefix + first reserved run             │
//! │ open.rs   → load header, descriptors, slot mirror        │
//! │ write.rs  → create/delete/update records (write-through) │
//! │ read.rs   → exist/get/get-next via sorted key arrays     │
//! │ sort.rs   → lazy Shell sort per search key               │
//! └──────┬───────────────┬───────────────┬───────────────────┘
//!        v               v               v
//!    ndxfile          keydesc           fio
//!  (disk layout)  (keys, normalize)  (byte file)
//! ```
//!
//! Every search key owns an array of slot numbers kept sorted by that key's
//! normalized bytes. Record insertion appends to the arrays and marks them
//! dirty; the next lookup re-sorts lazily, then binary-searches and expands
//! the hit in both directions to cover duplicates, publishing a cursor that
//! [`Database::get_next_record`] consumes.
//!
//! The file is the authoritative store: every mutation writes through before
//! the in-memory mirror is updated. `close` therefore has nothing to flush.

mod create;
mod error;
mod open;
mod read;
mod sort;
mod write;

pub use error::{Error, Result};
pub use keydesc::{KeyDescriptor, KeySegment, SegmentType};

use fio::FileIo;
use ndxfile::{Header, IndexSlot, RecordTag, SlotStatus, TagId, SLOT_WIRE_BYTES, TAG_WIRE_BYTES};

/// Smallest accepted reserved-run size.
pub const MIN_RESERVED_INDEX_RECORDS: u16 = 10;
/// Reserved-run size used by [`Database::create`].
pub const DEFAULT_RESERVED_INDEX_RECORDS: u16 = 100;
/// Largest accepted reserved-run size.
pub const MAX_RESERVED_INDEX_RECORDS: u16 = 10000;
/// Index slots preallocated in memory beyond the on-disk count by
/// [`Database::open`].
pub const DEFAULT_ALLOCATED_INDEX_KEYS: u32 = 50_000;
/// Default scratch-buffer size for [`Database::rebuild`]; grown on demand.
pub const MAX_DATA_SIZE: u32 = 1000;
/// Hard cap on any single in-memory buffer allocation, in bytes.
pub const MAX_ALLOCATION: u64 = 1 << 30;

/// Sentinel for "no position" in cursors and search-key hints.
pub(crate) const INVALID_POSITION: u32 = u32::MAX;

/// A record payload travelling in and out of the store.
///
/// For insertion ([`Database::create_record`]) the payload is
/// `data[data_offset..data_offset + data_size]`; search-key segments address
/// `data` from its start, so key material may come from a prefix region that
/// is not itself persisted.
///
/// For retrieval the payload is read into the front of `data` (at most
/// `allocated_size` bytes), `data_size` is set to the stored size and
/// `data_offset` to the *file* offset of the payload.
#[derive(Debug, Clone)]
pub struct Record {
    pub allocated_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub data: Vec<u8>,
}

impl Record {
    /// An empty record with a zeroed buffer of `allocated_size` bytes.
    pub fn with_capacity(allocated_size: u32) -> Self {
        Self {
            allocated_size,
            data_offset: 0,
            data_size: 0,
            data: vec![0; allocated_size as usize],
        }
    }

    /// A record ready for insertion whose payload is all of `payload`.
    pub fn from_payload(payload: &[u8]) -> Self {
        Self {
            allocated_size: payload.len() as u32,
            data_offset: 0,
            data_size: payload.len() as u32,
            data: payload.to_vec(),
        }
    }

    /// The payload bytes after a successful retrieval.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.data_size as usize]
    }

    /// The payload window used for insertion.
    pub(crate) fn payload_window(&self) -> Result<&[u8]> {
        let start = self.data_offset as usize;
        let end = start + self.data_size as usize;
        if end > self.data.len() {
            return Err(Error::RecordTooSmall);
        }
        Ok(&self.data[start..end])
    }
}

/// A (possibly partial) composite search key for one key id.
///
/// The value is given in raw payload byte order and normalized in place on
/// first use; the key remembers that normalization ran, so reusing the same
/// key for repeated searches converts at most once. A partial key matches on
/// its prefix; it must end on a segment boundary unless the trailing segment
/// is of byte type.
#[derive(Debug, Clone)]
pub struct SearchKey {
    /// The key id this key searches on (0-based).
    pub id: u16,
    size: u16,
    value: Vec<u8>,
    converted: bool,
    index: u32,
    count: u32,
}

impl SearchKey {
    pub fn new(id: u16, value: Vec<u8>) -> Self {
        debug_assert!(value.len() <= usize::from(u16::MAX));
        Self {
            id,
            size: value.len() as u16,
            value,
            converted: false,
            index: INVALID_POSITION,
            count: 0,
        }
    }

    /// Replaces the key value, re-arming normalization.
    pub fn set_value(&mut self, value: Vec<u8>) {
        debug_assert!(value.len() <= usize::from(u16::MAX));
        self.size = value.len() as u16;
        self.value = value;
        self.converted = false;
    }

    /// Length of the (possibly partial) key in bytes.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// The key bytes; normalized once a search or an explicit
    /// [`Database::convert_key`] has run.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// After a miss, the array position at which a record with this key
    /// would be inserted; after a hit, the position of the first match.
    pub fn insertion_index(&self) -> u32 {
        self.index
    }
}

/// Per-key search state: the sorted slot-number array and the cursor
/// published by the latest search.
#[derive(Debug)]
pub(crate) struct KeyIndex {
    /// Live slot numbers; sorted by this key's bytes when `sorted` holds.
    pub(crate) records: Vec<u32>,
    pub(crate) position: u32,
    pub(crate) selection_start: u32,
    pub(crate) selection_end: u32,
    /// Byte offset of this key inside a slot entry.
    pub(crate) key_offset: u16,
    pub(crate) key_size: u16,
    pub(crate) sorted: bool,
}

impl KeyIndex {
    pub(crate) fn new(key_offset: u16, key_size: u16) -> Self {
        Self {
            records: Vec::new(),
            position: INVALID_POSITION,
            selection_start: INVALID_POSITION,
            selection_end: INVALID_POSITION,
            key_offset,
            key_size,
            sorted: false,
        }
    }
}

/// An open database. Obtained from [`Database::create`] or
/// [`Database::open`]; dropping the handle closes it.
///
/// The handle owns the in-memory mirror of every index slot (live, deleted,
/// and reserved, in slot-number order) plus the per-key sorted arrays. The
/// mirror is a cache rebuilt from the file on open; the file stays
/// authoritative throughout.
pub struct Database {
    pub(crate) file: FileIo,
    pub(crate) read_only: bool,
    pub(crate) header: Header,
    pub(crate) descriptors: Vec<KeyDescriptor>,
    pub(crate) key_index: Vec<KeyIndex>,
    /// All slot entries (`IndexSlot` wire form + key bytes), slot-number order.
    pub(crate) mirror: Vec<u8>,
    /// Bytes per mirror entry.
    pub(crate) slot_entry: usize,
    /// Slots that are live or deleted (everything but `Reserved`).
    pub(crate) used_slots: u32,
    pub(crate) last_error: Error,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("read_only", &self.read_only)
            .field("nr_of_keys", &self.header.nr_of_keys)
            .field("nr_of_records", &self.header.nr_of_records)
            .field("nr_of_index_records", &self.header.nr_of_index_records)
            .field("reserved_index_records", &self.header.reserved_index_records)
            .field("used_slots", &self.used_slots)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Database {
    /// Number of search keys.
    pub fn nr_of_keys(&self) -> u16 {
        self.header.nr_of_keys
    }

    /// Width in bytes of the given key; 0 when `key_id` is out of range.
    pub fn key_size(&self, key_id: u16) -> u16 {
        match self.key_index.get(usize::from(key_id)) {
            Some(key) => key.key_size,
            None => 0,
        }
    }

    /// Number of live records.
    pub fn nr_of_records(&self) -> u32 {
        self.header.nr_of_records
    }

    /// The error recorded by the most recent operation ([`Error::NoError`]
    /// when it succeeded).
    pub fn last_error(&self) -> Error {
        self.last_error
    }

    /// Number of matches found by the most recent search with `key`.
    pub fn search_count(&self, key: &SearchKey) -> u32 {
        key.count
    }

    /// Closes the database. Nothing is flushed — every mutation was written
    /// through when it happened. Dropping the handle is equivalent.
    pub fn close(self) {}

    // ---- internal slot and tag access ----

    pub(crate) fn slot_base(&self, slot_no: u32) -> usize {
        slot_no as usize * self.slot_entry
    }

    /// Decodes the mirrored slot structure for `slot_no`.
    pub(crate) fn slot(&self, slot_no: u32) -> Result<IndexSlot> {
        let base = self.slot_base(slot_no);
        IndexSlot::decode(&self.mirror[base..base + SLOT_WIRE_BYTES])
            .map_err(|_| Error::IndexCorrupt)
    }

    /// The first `len` mirrored key bytes of `key_id` in `slot_no`.
    pub(crate) fn key_bytes(&self, slot_no: u32, key_id: usize, len: usize) -> &[u8] {
        let base = self.slot_base(slot_no) + usize::from(self.key_index[key_id].key_offset);
        &self.mirror[base..base + len]
    }

    /// Reads a record tag from the file, leaving the cursor just past it.
    pub(crate) fn read_tag(&mut self, offset: u32) -> Result<RecordTag> {
        let mut bytes = [0u8; TAG_WIRE_BYTES];
        self.file
            .read_at(u64::from(offset), &mut bytes)
            .map_err(|_| Error::DatabaseIo)?;
        RecordTag::decode(&bytes).map_err(|_| Error::IndexCorrupt)
    }

    /// Reads a slot structure from the file at `offset`.
    pub(crate) fn read_slot_at(&mut self, offset: u32) -> Result<IndexSlot> {
        let mut bytes = [0u8; SLOT_WIRE_BYTES];
        self.file
            .read_at(u64::from(offset), &mut bytes)
            .map_err(|_| Error::DatabaseIo)?;
        IndexSlot::decode(&bytes).map_err(|_| Error::IndexCorrupt)
    }

    /// Writes a slot structure through to disk and into the mirror, leaving
    /// the slot's key bytes untouched.
    pub(crate) fn write_slot(&mut self, slot_no: u32, slot: &IndexSlot) -> Result<()> {
        let encoded = slot.encode();
        self.file
            .write_at(u64::from(slot.offset), &encoded)
            .map_err(|_| Error::DatabaseIo)?;
        let base = self.slot_base(slot_no);
        self.mirror[base..base + SLOT_WIRE_BYTES].copy_from_slice(&encoded);
        Ok(())
    }

    /// Verifies a data tag against its slot: a live data id and a matching
    /// record reference.
    pub(crate) fn verify_data_tag(tag: &RecordTag, slot: &IndexSlot) -> Result<()> {
        if tag.id != TagId::Data || tag.record_ref != slot.record_ref {
            return Err(Error::IndexCorrupt);
        }
        Ok(())
    }

    pub(crate) fn deleted_prev(slot_no: u32, status: SlotStatus) -> Result<Option<u32>> {
        match status {
            SlotStatus::Deleted(prev) if prev == slot_no => Ok(None),
            SlotStatus::Deleted(prev) => Ok(Some(prev)),
            _ => Err(Error::IndexCorrupt),
        }
    }
}

#[cfg(test)]
mod tests;
