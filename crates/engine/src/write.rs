//! Write path: record creation (with deleted-slot reuse and reserved-run
//! growth), deletion, and in-place update. Every step writes through to the
//! file before the mirror is touched.

use ndxfile::{
    write_reserved_run, IndexSlot, RecordTag, SlotStatus, TagId, HEADER_FILE_OFFSET,
    SLOT_WIRE_BYTES, TAG_WIRE_BYTES,
};

use crate::{Database, Error, Record, Result, MAX_ALLOCATION};

impl Database {
    /// Creates a record and returns its slot number.
    ///
    /// The normalized composite key is generated from the payload (one key
    /// per descriptor, concatenated in key-id order). A deleted slot whose
    /// data space still fits the payload is reused; otherwise the next
    /// reserved slot is claimed, and when that was the last slot of the
    /// current run a fresh run is appended and chained in. Every key's
    /// sorted array is marked dirty.
    pub fn create_record(&mut self, record: &Record) -> Result<u32> {
        self.last_error = Error::NoError;
        let result = self.create_record_inner(record);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn create_record_inner(&mut self, record: &Record) -> Result<u32> {
        let mut search_key = vec![0u8; usize::from(self.header.total_key_size)];
        self.generate_search_key(record, &mut search_key)?;
        let payload = record.payload_window()?;

        let mut header = self.header;

        // Walk the deleted stack for a slot whose old data space still fits
        // the new payload; unlink the first one that does.
        let mut reuse: Option<(u32, IndexSlot, RecordTag)> = None;
        let mut predecessor: Option<u32> = None;
        let mut walk = if header.last_deleted_index >= 0 {
            Some(header.last_deleted_index as u32)
        } else {
            None
        };
        while let Some(candidate) = walk {
            let slot = self.slot(candidate)?;
            let prev = Self::deleted_prev(candidate, slot.status)?;
            let tag = self.read_tag(slot.data_offset)?;
            if tag.id != TagId::DeletedData || tag.record_ref != slot.record_ref {
                return Err(Error::IndexCorrupt);
            }
            if record.data_size <= tag.size {
                match predecessor {
                    None => header.last_deleted_index = prev.map_or(-1, |p| p as i32),
                    Some(pred_no) => {
                        let mut pred = self.slot(pred_no)?;
                        pred.status = SlotStatus::Deleted(prev.unwrap_or(pred_no));
                        self.write_slot(pred_no, &pred)?;
                    }
                }
                reuse = Some((candidate, slot, tag));
                break;
            }
            predecessor = Some(candidate);
            walk = prev;
        }

        let (slot_no, mut slot, data_tag, fresh) = match reuse {
            Some((slot_no, slot, old_tag)) => {
                // The record overwrites the deleted record's space; the tag
                // keeps pointing at the unchanged next record.
                let tag = RecordTag::new(
                    TagId::Data,
                    header.record_reference,
                    record.data_size,
                    old_tag.offset,
                );
                (slot_no, slot, tag, false)
            }
            None => {
                let slot = self.read_slot_at(header.next_free_index)?;
                if slot.status != SlotStatus::Reserved {
                    return Err(Error::IndexCorrupt);
                }
                let tag = RecordTag::new(
                    TagId::Data,
                    header.record_reference,
                    record.data_size,
                    header.next_free_data + TAG_WIRE_BYTES as u32 + record.data_size,
                );
                (self.used_slots, slot, tag, true)
            }
        };

        slot.status = SlotStatus::Live;
        slot.data_size = record.data_size;
        slot.record_ref = header.record_reference;
        if fresh {
            slot.data_offset = header.next_free_data;
        }

        // When this claim consumes the last reserved slot the mirror must
        // grow by one run; refuse before anything is written so a failed
        // growth leaves the file exactly as it was.
        let grown_index_records = if fresh && self.used_slots + 1 == header.nr_of_index_records {
            let grown = header.nr_of_index_records + u32::from(header.reserved_index_records);
            if u64::from(grown) * self.slot_entry as u64 >= MAX_ALLOCATION {
                return Err(Error::MemoryAllocation);
            }
            Some(grown)
        } else {
            None
        };

        self.file
            .write_at(u64::from(slot.data_offset), &data_tag.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.file.write(payload).map_err(|_| Error::DatabaseIo)?;
        self.file
            .write_at(u64::from(slot.offset), &slot.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.file.write(&search_key).map_err(|_| Error::DatabaseIo)?;

        header.nr_of_records += 1;
        header.record_reference = header.record_reference.wrapping_add(1);

        if fresh {
            header.next_free_data += TAG_WIRE_BYTES as u32 + record.data_size;

            if let Some(grown) = grown_index_records {
                // The run is full: append a fresh reserved run at the end of
                // the data area and chain the old run's NextIndex tag to it.
                write_reserved_run(
                    &mut self.file,
                    header.next_free_data,
                    header.reserved_index_records,
                    header.total_key_size,
                )
                .map_err(|_| Error::DatabaseIo)?;

                let chain_offset = slot.offset + self.slot_entry as u32;
                header.next_free_index = header.next_free_data;
                header.next_free_data =
                    self.file.position().map_err(|_| Error::DatabaseIo)? as u32;

                let mut chain = self.read_tag(chain_offset)?;
                if chain.id != TagId::NextIndex {
                    return Err(Error::IndexCorrupt);
                }
                chain.size = header.next_free_index;
                chain.offset = header.next_free_index;
                self.file
                    .write_at(u64::from(chain_offset), &chain.encode())
                    .map_err(|_| Error::DatabaseIo)?;

                header.next_free_index += TAG_WIRE_BYTES as u32;
                header.nr_of_index_records = grown;

                let mut offset = header.next_free_index;
                for _ in 0..header.reserved_index_records {
                    self.mirror
                        .extend_from_slice(&IndexSlot::reserved(offset).encode());
                    self.mirror
                        .extend(std::iter::repeat(0u8).take(self.slot_entry - SLOT_WIRE_BYTES));
                    offset += self.slot_entry as u32;
                }
            } else {
                header.next_free_index += self.slot_entry as u32;
            }
        }

        self.file
            .write_at(HEADER_FILE_OFFSET, &header.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.header = header;
        if fresh {
            self.used_slots += 1;
        }

        let base = self.slot_base(slot_no);
        self.mirror[base..base + SLOT_WIRE_BYTES].copy_from_slice(&slot.encode());
        self.mirror[base + SLOT_WIRE_BYTES..base + self.slot_entry].copy_from_slice(&search_key);

        for key in &mut self.key_index {
            key.records.push(slot_no);
            key.sorted = false;
        }

        Ok(slot_no)
    }

    /// Deletes the record held by `slot_no`.
    ///
    /// The slot joins the deleted stack and its data tag is rewritten as
    /// deleted data; the data space stays behind for reuse by a later
    /// insertion that fits.
    pub fn delete_record(&mut self, slot_no: u32) -> Result<()> {
        self.last_error = Error::NoError;
        let result = self.delete_record_inner(slot_no);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn delete_record_inner(&mut self, slot_no: u32) -> Result<()> {
        if slot_no >= self.header.nr_of_index_records {
            return Err(Error::EntryNotFound);
        }
        let mut slot = self.slot(slot_no)?;
        if slot.status != SlotStatus::Live {
            return Err(Error::EntryNotFound);
        }

        let mut tag = self.read_tag(slot.data_offset)?;
        Self::verify_data_tag(&tag, &slot)?;
        tag.id = TagId::DeletedData;
        self.file
            .write_at(u64::from(slot.data_offset), &tag.encode())
            .map_err(|_| Error::DatabaseIo)?;

        // Push onto the deleted stack; the stack bottom references itself.
        let prev = if self.header.last_deleted_index >= 0 {
            self.header.last_deleted_index as u32
        } else {
            slot_no
        };
        slot.status = SlotStatus::Deleted(prev);
        self.write_slot(slot_no, &slot)?;

        let mut header = self.header;
        header.last_deleted_index = slot_no as i32;
        header.nr_of_records -= 1;
        self.file
            .write_at(HEADER_FILE_OFFSET, &header.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.header = header;

        // Removal keeps the remaining order, so sorted flags survive.
        for key in &mut self.key_index {
            key.records.retain(|&s| s != slot_no);
        }
        Ok(())
    }

    /// Rewrites the record held by `slot_no` in place.
    ///
    /// The new payload must fit the space of the existing data record
    /// (up to the following record's offset); the slot's search key is
    /// regenerated from the new payload.
    pub fn update_record(&mut self, slot_no: u32, record: &Record) -> Result<()> {
        self.last_error = Error::NoError;
        let result = self.update_record_inner(slot_no, record);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn update_record_inner(&mut self, slot_no: u32, record: &Record) -> Result<()> {
        if slot_no >= self.header.nr_of_index_records {
            return Err(Error::InvalidIndex);
        }
        let mut slot = self.slot(slot_no)?;
        if slot.status != SlotStatus::Live {
            return Err(Error::EntryNotFound);
        }

        let tag = self.read_tag(slot.data_offset)?;
        Self::verify_data_tag(&tag, &slot)?;
        let slack = tag.offset - (slot.data_offset + TAG_WIRE_BYTES as u32);
        if record.data_size > slack {
            return Err(Error::RecordTooLarge);
        }

        let mut search_key = vec![0u8; usize::from(self.header.total_key_size)];
        self.generate_search_key(record, &mut search_key)?;

        let new_tag = RecordTag::new(TagId::Data, slot.record_ref, record.data_size, tag.offset);
        let payload = record.payload_window()?;
        self.file
            .write_at(u64::from(slot.data_offset), &new_tag.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.file.write(payload).map_err(|_| Error::DatabaseIo)?;

        slot.data_size = record.data_size;
        self.file
            .write_at(u64::from(slot.offset), &slot.encode())
            .map_err(|_| Error::DatabaseIo)?;
        self.file.write(&search_key).map_err(|_| Error::DatabaseIo)?;

        let base = self.slot_base(slot_no);
        self.mirror[base..base + SLOT_WIRE_BYTES].copy_from_slice(&slot.encode());
        self.mirror[base + SLOT_WIRE_BYTES..base + self.slot_entry].copy_from_slice(&search_key);

        // The key bytes may have changed; every ordering is suspect now.
        for key in &mut self.key_index {
            key.sorted = false;
        }
        Ok(())
    }

    /// Builds the normalized composite key (all keys concatenated in key-id
    /// order) for a payload about to be written.
    fn generate_search_key(&self, record: &Record, out: &mut [u8]) -> Result<()> {
        let mut position = 0usize;
        let window_end = u64::from(record.data_offset) + u64::from(record.data_size);
        for descriptor in &self.descriptors {
            for segment in &descriptor.segments {
                let start = usize::from(segment.offset);
                let end = start + usize::from(segment.size);
                if end as u64 > window_end || end > record.data.len() {
                    return Err(Error::RecordTooSmall);
                }
                let target = &mut out[position..position + usize::from(segment.size)];
                target.copy_from_slice(&record.data[start..end]);
                keydesc::normalize_segment(target, segment.ty);
                position += usize::from(segment.size);
            }
        }
        Ok(())
    }
}
