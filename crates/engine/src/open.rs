//! Opening an existing database: header and descriptor recovery, mirror
//! load across the reserved-run chain, and the initial per-key sort.

use std::path::Path;

use fio::FileIo;
use keydesc::{KeyDescriptor, SEGMENT_WIRE_BYTES};
use ndxfile::{
    slot_entry_bytes, Header, RecordTag, SlotStatus, TagId, HEADER_WIRE_BYTES, SLOT_WIRE_BYTES,
    TAG_WIRE_BYTES,
};

use crate::sort::shell_sort;
use crate::{
    Database, Error, KeyIndex, Result, DEFAULT_ALLOCATED_INDEX_KEYS, MAX_ALLOCATION,
};

impl Database {
    /// Opens an existing database with the default in-memory preallocation.
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        Self::open_with(path, read_only, DEFAULT_ALLOCATED_INDEX_KEYS)
    }

    /// Opens an existing database.
    ///
    /// `allocated_index_keys` slots beyond the on-disk count are preallocated
    /// in memory so that growth does not reallocate immediately; read-only
    /// opens ignore it and size the mirror exactly.
    ///
    /// On any failure the file is closed and the handle never exists.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        read_only: bool,
        allocated_index_keys: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidParameters);
        }

        let mut file = FileIo::open(path, read_only).map_err(|_| Error::NoDatabase)?;

        // Header tag, then the header itself.
        let mut tag_bytes = [0u8; TAG_WIRE_BYTES];
        file.read(&mut tag_bytes).map_err(|_| Error::DatabaseIo)?;
        let tag = RecordTag::decode(&tag_bytes).map_err(|_| Error::InvalidDatabase)?;
        if tag.id != TagId::Header {
            return Err(Error::InvalidDatabase);
        }

        let mut header_bytes = [0u8; HEADER_WIRE_BYTES];
        file.read(&mut header_bytes).map_err(|_| Error::DatabaseIo)?;
        let header = Header::decode(&header_bytes);

        // Key descriptors follow contiguously: per key a u16 segment count,
        // then the segments.
        let nr_of_keys = usize::from(header.nr_of_keys);
        let mut descriptors: Vec<KeyDescriptor> = Vec::with_capacity(nr_of_keys);
        let mut key_index: Vec<KeyIndex> = Vec::with_capacity(nr_of_keys);
        let mut key_offset = SLOT_WIRE_BYTES as u16;
        for _ in 0..nr_of_keys {
            let mut count_bytes = [0u8; 2];
            file.read(&mut count_bytes).map_err(|_| Error::DatabaseIo)?;
            let nr_of_segments = u16::from_le_bytes(count_bytes);

            let mut segment_bytes =
                vec![0u8; usize::from(nr_of_segments) * SEGMENT_WIRE_BYTES];
            file.read(&mut segment_bytes).map_err(|_| Error::DatabaseIo)?;
            let descriptor = KeyDescriptor::decode_segments(nr_of_segments, &segment_bytes)
                .map_err(|_| Error::InvalidKeyDescriptor)?;

            let key_size = descriptor.key_size();
            key_index.push(KeyIndex::new(key_offset, key_size));
            key_offset += key_size;
            descriptors.push(descriptor);
        }

        // Re-validate and cross-check against the recovered header sizes.
        let layout = keydesc::validate(&descriptors).map_err(|_| Error::InvalidKeyDescriptor)?;
        if layout.descriptor_bytes != header.key_descriptor_size
            || layout.total_key_size != header.total_key_size
        {
            return Err(Error::InvalidKeyDescriptor);
        }

        let slot_entry = slot_entry_bytes(header.total_key_size);
        let allocated_slots = if read_only {
            u64::from(header.nr_of_index_records)
        } else {
            u64::from(header.nr_of_index_records) + u64::from(allocated_index_keys)
        };
        if allocated_slots * slot_entry as u64 >= MAX_ALLOCATION {
            return Err(Error::MemoryAllocation);
        }

        // Load every slot entry, live or not, following the run chain: after
        // each full run of `reserved_index_records` slots sits a NextIndex
        // tag pointing at the next run's Index tag.
        let mut mirror: Vec<u8> = Vec::with_capacity(allocated_slots as usize * slot_entry);
        file.read(&mut tag_bytes).map_err(|_| Error::DatabaseIo)?;
        let tag = RecordTag::decode(&tag_bytes).map_err(|_| Error::InvalidDatabase)?;
        if tag.id != TagId::Index {
            return Err(Error::InvalidDatabase);
        }

        let mut entry = vec![0u8; slot_entry];
        let mut run_counter: u16 = 0;
        for _ in 0..header.nr_of_index_records {
            if run_counter == header.reserved_index_records {
                file.read(&mut tag_bytes).map_err(|_| Error::DatabaseIo)?;
                let next = RecordTag::decode(&tag_bytes).map_err(|_| Error::InvalidDatabase)?;
                if next.id != TagId::NextIndex {
                    return Err(Error::InvalidDatabase);
                }
                file.read_at(u64::from(next.next_index_offset()), &mut tag_bytes)
                    .map_err(|_| Error::DatabaseIo)?;
                let run = RecordTag::decode(&tag_bytes).map_err(|_| Error::InvalidDatabase)?;
                if run.id != TagId::Index {
                    return Err(Error::InvalidDatabase);
                }
                run_counter = 0;
            }

            file.read(&mut entry).map_err(|_| Error::DatabaseIo)?;
            mirror.extend_from_slice(&entry);
            run_counter += 1;
        }

        // Classify the slots: live slots feed every key's array, deleted
        // slots only count as used.
        let mut live: Vec<u32> = Vec::new();
        let mut used_slots: u32 = 0;
        for slot_no in 0..header.nr_of_index_records {
            let base = slot_no as usize * slot_entry;
            let slot = ndxfile::IndexSlot::decode(&mirror[base..base + SLOT_WIRE_BYTES])
                .map_err(|_| Error::IndexCorrupt)?;
            match slot.status {
                SlotStatus::Reserved => {}
                SlotStatus::Live => {
                    used_slots += 1;
                    live.push(slot_no);
                }
                SlotStatus::Deleted(_) => used_slots += 1,
            }
        }
        for key in &mut key_index {
            key.records = live.clone();
        }

        let mut db = Database {
            file,
            read_only,
            header,
            descriptors,
            key_index,
            mirror,
            slot_entry,
            used_slots,
            last_error: Error::NoError,
        };

        for key_id in 0..nr_of_keys {
            let key_offset = db.key_index[key_id].key_offset;
            let key_size = db.key_index[key_id].key_size;
            shell_sort(
                &mut db.key_index[key_id].records,
                &db.mirror,
                db.slot_entry,
                key_offset,
                key_size,
            );
            db.key_index[key_id].sorted = true;
        }

        Ok(db)
    }
}
