//! Database creation and rebuild.

use std::path::Path;

use fio::FileIo;
use keydesc::KeyDescriptor;
use ndxfile::{
    slot_entry_bytes, write_reserved_run, Header, RecordTag, SlotStatus, TagId, FORMAT_VERSION,
    HEADER_WIRE_BYTES, TAG_WIRE_BYTES,
};

use crate::{
    Database, Error, Record, Result, DEFAULT_RESERVED_INDEX_RECORDS, MAX_RESERVED_INDEX_RECORDS,
    MIN_RESERVED_INDEX_RECORDS,
};

impl Database {
    /// Creates a new database with the default reserved-run size and opens it.
    pub fn create<P: AsRef<Path>>(path: P, descriptors: &[KeyDescriptor]) -> Result<Self> {
        Self::create_with(path, descriptors, DEFAULT_RESERVED_INDEX_RECORDS)
    }

    /// Creates a new database file and opens it.
    ///
    /// Writes the header tag, the header, the key descriptors and one
    /// reserved run of `reserved` empty index slots, then closes the file and
    /// reopens it through the regular [`Database::open`] path.
    ///
    /// Fails with [`Error::DatabaseAlreadyExist`] when a file of that name
    /// can already be opened, and with [`Error::InvalidParameters`] when
    /// `reserved` falls outside
    /// [`MIN_RESERVED_INDEX_RECORDS`]..=[`MAX_RESERVED_INDEX_RECORDS`].
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        descriptors: &[KeyDescriptor],
        reserved: u16,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty()
            || descriptors.is_empty()
            || reserved < MIN_RESERVED_INDEX_RECORDS
            || reserved > MAX_RESERVED_INDEX_RECORDS
        {
            return Err(Error::InvalidParameters);
        }

        let layout = keydesc::validate(descriptors).map_err(|_| Error::InvalidKeyDescriptor)?;

        if FileIo::open(path, true).is_ok() {
            return Err(Error::DatabaseAlreadyExist);
        }

        let mut file = FileIo::create(path).map_err(|_| Error::DatabaseIo)?;

        let tag = RecordTag::new(
            TagId::Header,
            0,
            HEADER_WIRE_BYTES as u32 + u32::from(layout.descriptor_bytes),
            0,
        );
        let slot_entry = slot_entry_bytes(layout.total_key_size) as u32;
        let run_start = TAG_WIRE_BYTES as u32 + tag.size;
        let next_free_index = run_start + TAG_WIRE_BYTES as u32;
        let header = Header {
            version: FORMAT_VERSION,
            record_reference: 0,
            next_free_data: next_free_index
                + u32::from(reserved) * slot_entry
                + TAG_WIRE_BYTES as u32,
            nr_of_records: 0,
            nr_of_index_records: u32::from(reserved),
            last_deleted_index: -1,
            next_free_index,
            reserved_index_records: reserved,
            nr_of_keys: descriptors.len() as u16,
            total_key_size: layout.total_key_size,
            key_descriptor_size: layout.descriptor_bytes,
        };

        let mut prefix = Vec::with_capacity(
            TAG_WIRE_BYTES + HEADER_WIRE_BYTES + usize::from(layout.descriptor_bytes),
        );
        prefix.extend_from_slice(&tag.encode());
        prefix.extend_from_slice(&header.encode());
        for descriptor in descriptors {
            descriptor.encode_into(&mut prefix);
        }
        file.write(&prefix).map_err(|_| Error::DatabaseIo)?;

        write_reserved_run(&mut file, run_start, reserved, layout.total_key_size)
            .map_err(|_| Error::DatabaseIo)?;

        // The prefix is complete; reopen through the regular path so the
        // handle is built exactly as for any existing database.
        drop(file);
        Self::open(path, false)
    }

    /// Rebuilds this database into a fresh one at `path` with new key
    /// descriptors, re-inserting every live record.
    ///
    /// `max_data_size` sizes the scratch buffer; it grows on demand when a
    /// record exceeds it. The reserved-run size of the target is the current
    /// record count, clamped into the valid range. The target database is
    /// closed again before returning; the source stays open.
    pub fn rebuild<P: AsRef<Path>>(
        &mut self,
        path: P,
        descriptors: &[KeyDescriptor],
        max_data_size: u32,
    ) -> Result<()> {
        self.last_error = Error::NoError;
        let result = self.rebuild_inner(path.as_ref(), descriptors, max_data_size);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn rebuild_inner(
        &mut self,
        path: &Path,
        descriptors: &[KeyDescriptor],
        max_data_size: u32,
    ) -> Result<()> {
        if self.header.nr_of_records == 0 {
            return Err(Error::EmptyDatabase);
        }

        let reserved = self
            .header
            .nr_of_records
            .clamp(
                u32::from(MIN_RESERVED_INDEX_RECORDS),
                u32::from(MAX_RESERVED_INDEX_RECORDS),
            ) as u16;
        let mut target = Database::create_with(path, descriptors, reserved)?;

        let mut scratch = Record::with_capacity(max_data_size.max(1));
        for slot_no in 0..self.header.nr_of_index_records {
            let slot = self.slot(slot_no)?;
            if slot.status != SlotStatus::Live {
                continue;
            }
            if slot.data_size > scratch.allocated_size {
                scratch = Record::with_capacity(slot.data_size);
            }
            self.get_record_slot_inner(slot_no, &mut scratch)?;
            // Retrieval leaves the file offset in data_offset; the payload
            // sits at the front of the buffer for re-insertion.
            scratch.data_offset = 0;
            target.create_record(&scratch)?;
        }

        Ok(())
    }
}
