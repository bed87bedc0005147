//! Read path: key conversion, binary search with duplicate-range expansion,
//! record retrieval, and cursor iteration.

use std::cmp::Ordering;

use keydesc::SegmentType;
use ndxfile::TAG_WIRE_BYTES;

use crate::sort::shell_sort;
use crate::{Database, Error, Record, Result, SearchKey, INVALID_POSITION};

impl Database {
    /// Normalizes a query key in place so it compares against stored key
    /// bytes with a plain byte compare.
    ///
    /// Runs at most once per key instance — searches call this implicitly
    /// and a second call on an already-converted key is skipped there. A
    /// partial key must cover whole segments, except that a trailing byte
    /// segment may be cut short.
    pub fn convert_key(&mut self, key: &mut SearchKey) -> Result<()> {
        self.last_error = Error::NoError;
        let result = self.convert_key_inner(key);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    pub(crate) fn convert_key_inner(&mut self, key: &mut SearchKey) -> Result<()> {
        key.converted = false;

        let key_id = usize::from(key.id);
        if key_id >= self.key_index.len() {
            return Err(Error::InvalidKeyIndex);
        }
        if key.size > self.key_index[key_id].key_size
            || usize::from(key.size) > key.value.len()
        {
            return Err(Error::InvalidKey);
        }

        let mut remaining = usize::from(key.size);
        let mut position = 0usize;
        for segment in &self.descriptors[key_id].segments {
            if remaining == 0 {
                break;
            }
            let size = usize::from(segment.size);
            if remaining < size {
                // A cut-off trailing segment only orders correctly for raw
                // bytes; a partial integer would compare garbage.
                if segment.ty == SegmentType::Byte {
                    remaining = 0;
                    break;
                }
                return Err(Error::InvalidKey);
            }
            keydesc::normalize_segment(&mut key.value[position..position + size], segment.ty);
            position += size;
            remaining -= size;
        }
        if remaining != 0 {
            return Err(Error::InvalidKey);
        }

        key.converted = true;
        Ok(())
    }

    /// Searches for a record matching the (possibly partial) key.
    ///
    /// On a hit, returns the slot number of the first match, records the
    /// whole duplicate range in the key's cursor (consumed by
    /// [`Database::get_next_record`] / [`Database::get_next_index`]) and sets
    /// the count returned by [`Database::search_count`]. On a miss, fails
    /// with [`Error::EntryNotFound`] and leaves the would-be insertion
    /// position in [`SearchKey::insertion_index`].
    pub fn exist_record(&mut self, key: &mut SearchKey) -> Result<u32> {
        self.last_error = Error::NoError;
        let result = self.exist_record_inner(key);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn exist_record_inner(&mut self, key: &mut SearchKey) -> Result<u32> {
        if self.header.nr_of_records == 0 {
            return Err(Error::EntryNotFound);
        }
        let key_id = usize::from(key.id);
        if key_id >= self.key_index.len() {
            return Err(Error::InvalidKeyIndex);
        }
        if !key.converted {
            self.convert_key_inner(key)?;
        }
        self.ensure_sorted(key_id);

        {
            let cursor = &mut self.key_index[key_id];
            cursor.position = INVALID_POSITION;
            cursor.selection_start = INVALID_POSITION;
            cursor.selection_end = INVALID_POSITION;
        }
        key.index = INVALID_POSITION;

        let prefix = usize::from(key.size);
        let n = self.key_index[key_id].records.len();
        if n == 0 {
            return Err(Error::EntryNotFound);
        }

        if n == 1 {
            let slot_no = self.key_index[key_id].records[0];
            let stored = self.key_bytes(slot_no, key_id, prefix);
            let query = &key.value[..prefix];
            if query != stored {
                key.index = if query < stored { 0 } else { 1 };
                return Err(Error::EntryNotFound);
            }
            let cursor = &mut self.key_index[key_id];
            cursor.position = 0;
            cursor.selection_start = 0;
            cursor.selection_end = 0;
            key.index = 0;
            key.count = 1;
            return Ok(slot_no);
        }

        let max_index = (n - 1) as i64;
        let mut left: i64 = 0;
        let mut right: i64 = max_index;
        let mut search: i64;
        let mut result: Ordering;
        loop {
            search = (left + right) >> 1;
            let slot_no = self.key_index[key_id].records[search as usize];
            let query = &key.value[..prefix];
            result = query.cmp(self.key_bytes(slot_no, key_id, prefix));
            match result {
                Ordering::Less => right = search - 1,
                Ordering::Greater => left = search + 1,
                Ordering::Equal => {}
            }
            if result == Ordering::Equal || left > right {
                break;
            }
        }

        if result == Ordering::Equal {
            let query = &key.value[..prefix];
            let matches = |db: &Self, position: i64| {
                let slot_no = db.key_index[key_id].records[position as usize];
                query == db.key_bytes(slot_no, key_id, prefix)
            };

            let mut first = search;
            while first > 0 && matches(self, first - 1) {
                first -= 1;
            }
            let mut last = search;
            while last < max_index && matches(self, last + 1) {
                last += 1;
            }

            let slot_no = self.key_index[key_id].records[first as usize];
            let cursor = &mut self.key_index[key_id];
            cursor.position = first as u32;
            cursor.selection_start = first as u32;
            cursor.selection_end = last as u32;
            key.index = first as u32;
            key.count = (last - first + 1) as u32;
            return Ok(slot_no);
        }

        key.index = if result == Ordering::Less {
            search as u32
        } else {
            (search + 1) as u32
        };
        Err(Error::EntryNotFound)
    }

    /// Retrieves the first record matching the key; shorthand for
    /// [`Database::exist_record`] followed by the slot-based
    /// [`Database::get_record_slot`]. Returns the slot number.
    pub fn get_record(&mut self, key: &mut SearchKey, out: &mut Record) -> Result<u32> {
        self.last_error = Error::NoError;
        let result = self
            .exist_record_inner(key)
            .and_then(|slot_no| self.get_record_slot_inner(slot_no, out).map(|_| slot_no));
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    /// Retrieves the record held by `slot_no` into `out`.
    ///
    /// The stored data tag is verified against the slot (record id and
    /// reference) before the payload is read; a payload larger than
    /// `out.allocated_size` fails with [`Error::RecordTooLarge`] without
    /// touching the buffer.
    pub fn get_record_slot(&mut self, slot_no: u32, out: &mut Record) -> Result<()> {
        self.last_error = Error::NoError;
        let result = self.get_record_slot_inner(slot_no, out);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    pub(crate) fn get_record_slot_inner(&mut self, slot_no: u32, out: &mut Record) -> Result<()> {
        if slot_no >= self.header.nr_of_index_records {
            return Err(Error::InvalidIndex);
        }
        let slot = self.slot(slot_no)?;
        let tag = self.read_tag(slot.data_offset)?;
        Self::verify_data_tag(&tag, &slot)?;

        let capacity = out.allocated_size.min(out.data.len() as u32);
        if tag.size > capacity {
            return Err(Error::RecordTooLarge);
        }

        // The cursor sits just past the tag; the payload follows.
        let size = tag.size as usize;
        self.file
            .read(&mut out.data[..size])
            .map_err(|_| Error::DatabaseIo)?;
        out.data_offset = slot.data_offset + TAG_WIRE_BYTES as u32;
        out.data_size = tag.size;
        Ok(())
    }

    /// Advances the key's cursor and retrieves the record there.
    pub fn get_next_record(&mut self, key_id: u16, out: &mut Record) -> Result<u32> {
        self.last_error = Error::NoError;
        let result = self
            .next_cursor_slot(key_id)
            .and_then(|slot_no| self.get_record_slot_inner(slot_no, out).map(|_| slot_no));
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    /// Advances the key's cursor and returns the slot number there, without
    /// reading the record.
    pub fn get_next_index(&mut self, key_id: u16) -> Result<u32> {
        self.last_error = Error::NoError;
        let result = self.next_cursor_slot(key_id);
        if let Err(error) = result {
            self.last_error = error;
        }
        result
    }

    fn next_cursor_slot(&mut self, key_id: u16) -> Result<u32> {
        let key_id = usize::from(key_id);
        if key_id >= self.key_index.len() {
            return Err(Error::InvalidKeyIndex);
        }
        let cursor = &mut self.key_index[key_id];
        if cursor.position == cursor.selection_end {
            return Err(Error::EntryNotFound);
        }
        // A cursor taken before a delete may point past the shrunk array.
        if cursor.position as usize >= cursor.records.len() {
            return Err(Error::EntryNotFound);
        }
        let slot_no = cursor.records[cursor.position as usize];
        cursor.position += 1;
        Ok(slot_no)
    }

    pub(crate) fn ensure_sorted(&mut self, key_id: usize) {
        if self.key_index[key_id].sorted {
            return;
        }
        let key_offset = self.key_index[key_id].key_offset;
        let key_size = self.key_index[key_id].key_size;
        shell_sort(
            &mut self.key_index[key_id].records,
            &self.mirror,
            self.slot_entry,
            key_offset,
            key_size,
        );
        self.key_index[key_id].sorted = true;
    }
}
