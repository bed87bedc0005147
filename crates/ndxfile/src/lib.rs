//! # ndxfile — on-disk layout of the indexed database file
//!
//! A database is a single file: a fixed prefix, then equally sized *reserved
//! runs* of index slots interleaved with data records. Runs are chained
//! through `NextIndex` tags so the index can grow without relocating data.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ tag { id: Header, size: header + descriptors }        16 B    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Header                                                36 B    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ key descriptors (per key: u16 count, then 4 B per segment)    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ tag { id: Index, size: R·slot_entry, offset: end-of-run }     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ R index slots                                                 │
//! │   IndexSlot (20 B) + total_key_size normalized key bytes      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ tag { id: NextIndex, next_index_offset: 0 until chained }     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ data records and further reserved runs, appended as needed    │
//! │   tag { id: Data, record_ref, size, offset } + payload        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All tag, header and slot integers are little-endian. Key bytes inside a
//! slot are stored in big-endian *normalized* form (see the `keydesc` crate),
//! so slot-to-slot key comparison is a plain byte compare and the key order
//! is identical on every host.
//!
//! Every data record is cross-checked against its slot through a shared
//! `record_ref` value assigned at creation; a mismatch on read means the
//! index and the data area have diverged.

mod header;
mod run;
mod slot;
mod tag;

pub use header::{Header, FORMAT_VERSION, HEADER_FILE_OFFSET, HEADER_WIRE_BYTES};
pub use run::write_reserved_run;
pub use slot::{IndexSlot, SlotStatus, SLOT_WIRE_BYTES};
pub use tag::{RecordTag, TagId, TAG_WIRE_BYTES};

use thiserror::Error;

/// Errors raised while decoding on-disk structures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown record tag id {0}")]
    InvalidTagId(i32),

    #[error("unknown index slot status {0}")]
    InvalidSlotStatus(i32),
}

/// Bytes one index slot occupies on disk and in the mirror:
/// the fixed slot structure plus the composite key.
pub fn slot_entry_bytes(total_key_size: u16) -> usize {
    SLOT_WIRE_BYTES + usize::from(total_key_size)
}
