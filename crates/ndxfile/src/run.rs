use fio::FileIo;

use crate::slot::IndexSlot;
use crate::tag::{RecordTag, TagId, TAG_WIRE_BYTES};
use crate::slot_entry_bytes;

/// Writes one reserved run of `reserved` empty index slots at `file_pointer`.
///
/// Layout written: an `Index` tag whose `size` covers the run and whose
/// `offset` points at the end of the run, then `reserved` slots in
/// `Reserved` state with zeroed key bytes, then a `NextIndex` tag with both
/// offset fields zero. The caller chains the run in later by patching the
/// previous run's `NextIndex` tag.
///
/// On return the file cursor sits just past the trailing `NextIndex` tag.
pub fn write_reserved_run(
    file: &mut FileIo,
    file_pointer: u32,
    reserved: u16,
    total_key_size: u16,
) -> fio::Result<()> {
    let entry = slot_entry_bytes(total_key_size) as u32;
    let run_size = u32::from(reserved) * entry;
    let first_slot = file_pointer + TAG_WIRE_BYTES as u32;

    let index_tag = RecordTag::new(TagId::Index, 0, run_size, first_slot + run_size);
    file.write_at(u64::from(file_pointer), &index_tag.encode())?;

    let zero_key = vec![0u8; usize::from(total_key_size)];
    let mut slot_offset = first_slot;
    for _ in 0..reserved {
        let slot = IndexSlot::reserved(slot_offset);
        file.write(&slot.encode())?;
        file.write(&zero_key)?;
        slot_offset += entry;
    }

    let next_tag = RecordTag::new(TagId::NextIndex, 0, 0, 0);
    file.write(&next_tag.encode())?;

    Ok(())
}
