use super::helpers::*;
use crate::*;
use anyhow::Result;
use fio::FileIo;
use ndxfile::{slot_entry_bytes, RecordTag, TagId, HEADER_WIRE_BYTES, TAG_WIRE_BYTES};
use tempfile::tempdir;

#[test]
fn insert_and_read_back_bitwise() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create_with(dir.path().join("a.db"), &personnel_keys(), 10)?;

    // 35 records cross three run boundaries at R = 10.
    let triples: Vec<(u32, u32, u32)> = (0..35).map(|i| (i * 3, i % 100, i % 10)).collect();
    let payloads = insert_all(&mut db, &triples);
    assert_eq!(db.nr_of_records(), 35);

    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    for (slot, bytes) in payloads.iter().enumerate() {
        db.get_record_slot(slot as u32, &mut out)?;
        assert_eq!(out.data_size as usize, PAYLOAD_BYTES);
        assert_eq!(out.payload(), bytes.as_slice());
    }
    Ok(())
}

#[test]
fn filling_a_run_chains_a_new_one() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("a.db");
    let mut db = Database::create_with(&path, &personnel_keys(), 10)?;

    let triples: Vec<(u32, u32, u32)> = (0..11).map(|i| (i, 0, 0)).collect();
    let payloads = insert_all(&mut db, &triples);
    db.close();

    // The first run's trailing NextIndex tag must point at the second run.
    let layout = keydesc::validate(&personnel_keys()).unwrap();
    let entry = slot_entry_bytes(layout.total_key_size);
    let first_slot =
        TAG_WIRE_BYTES + HEADER_WIRE_BYTES + usize::from(layout.descriptor_bytes) + TAG_WIRE_BYTES;
    let chain_offset = (first_slot + 10 * entry) as u64;

    let mut file = FileIo::open(&path, true)?;
    let mut tag_bytes = [0u8; TAG_WIRE_BYTES];
    file.read_at(chain_offset, &mut tag_bytes)?;
    let chain = RecordTag::decode(&tag_bytes)?;
    assert_eq!(chain.id, TagId::NextIndex);
    assert_ne!(chain.next_index_offset(), 0);

    file.read_at(u64::from(chain.next_index_offset()), &mut tag_bytes)?;
    assert_eq!(RecordTag::decode(&tag_bytes)?.id, TagId::Index);
    drop(file);

    // And the reopened database serves all eleven records.
    let mut db = Database::open(&path, false)?;
    assert_eq!(db.nr_of_records(), 11);
    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    for (slot, bytes) in payloads.iter().enumerate() {
        db.get_record_slot(slot as u32, &mut out)?;
        assert_eq!(out.payload(), bytes.as_slice());
    }
    Ok(())
}

#[test]
fn undersized_buffer_fails_without_mutation() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1)]);

    let mut out = Record::with_capacity(10);
    assert_eq!(
        db.get_record_slot(0, &mut out).err(),
        Some(Error::RecordTooLarge)
    );
    assert_eq!(db.last_error(), Error::RecordTooLarge);
    assert!(out.data.iter().all(|&b| b == 0));
    assert_eq!(out.data_size, 0);
    Ok(())
}

#[test]
fn record_smaller_than_key_window_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;

    // Key segments reach byte 29; a 20-byte payload cannot produce a key.
    let result = db.create_record(&Record::from_payload(&vec![0u8; 20]));
    assert_eq!(result.err(), Some(Error::RecordTooSmall));
    assert_eq!(db.nr_of_records(), 0);
    Ok(())
}

#[test]
fn delete_makes_a_record_unreachable() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1), (2, 2, 2), (3, 3, 3)]);

    db.delete_record(1)?;
    assert_eq!(db.nr_of_records(), 2);

    let mut key = id_key(2);
    assert_eq!(db.exist_record(&mut key).err(), Some(Error::EntryNotFound));

    // The slot's data tag is now deleted data; direct access reports the
    // index/data mismatch.
    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    assert_eq!(
        db.get_record_slot(1, &mut out).err(),
        Some(Error::IndexCorrupt)
    );

    // Double delete, reserved slots, and out-of-range slots all miss.
    assert_eq!(db.delete_record(1).err(), Some(Error::EntryNotFound));
    assert_eq!(db.delete_record(50).err(), Some(Error::EntryNotFound));
    assert_eq!(db.delete_record(7000).err(), Some(Error::EntryNotFound));
    Ok(())
}

#[test]
fn deleted_slot_is_reused_when_the_payload_fits() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1), (2, 2, 2), (3, 3, 3)]);

    db.delete_record(1)?;

    // An oversized payload cannot reuse the freed space and claims a fresh
    // slot instead.
    let mut big = payload(40, 40 % 100, 4);
    big.extend_from_slice(&[0xee; 100]);
    let slot = db.create_record(&Record::from_payload(&big))?;
    assert_eq!(slot, 3);

    // A same-sized payload takes the deleted slot over.
    let replacement = payload(50, 50, 5);
    let slot = db.create_record(&Record::from_payload(&replacement))?;
    assert_eq!(slot, 1);
    assert_eq!(db.nr_of_records(), 4);

    let mut out = Record::with_capacity(2 * PAYLOAD_BYTES as u32);
    db.get_record_slot(1, &mut out)?;
    assert_eq!(out.payload(), replacement.as_slice());

    let mut key = id_key(50);
    assert_eq!(db.exist_record(&mut key)?, 1);
    Ok(())
}

#[test]
fn deletions_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("a.db");
    let mut db = Database::create(&path, &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1), (2, 2, 2), (3, 3, 3)]);
    db.delete_record(0)?;
    db.delete_record(2)?;
    db.close();

    let mut db = Database::open(&path, false)?;
    assert_eq!(db.nr_of_records(), 1);
    let mut key = id_key(1);
    assert_eq!(db.exist_record(&mut key).err(), Some(Error::EntryNotFound));
    let mut key = id_key(3);
    assert_eq!(db.exist_record(&mut key).err(), Some(Error::EntryNotFound));
    let mut key = id_key(2);
    assert_eq!(db.exist_record(&mut key)?, 1);

    // The reloaded deleted stack still feeds reuse: slot 2, then slot 0.
    let slot = db.create_record(&Record::from_payload(&payload(7, 7, 7)))?;
    assert_eq!(slot, 2);
    let slot = db.create_record(&Record::from_payload(&payload(8, 8, 8)))?;
    assert_eq!(slot, 0);
    assert_eq!(db.nr_of_records(), 3);
    Ok(())
}

#[test]
fn update_rewrites_payload_and_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1), (2, 2, 2)]);

    let updated = payload(99, 42, 9);
    db.update_record(0, &Record::from_payload(&updated))?;

    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    db.get_record_slot(0, &mut out)?;
    assert_eq!(out.payload(), updated.as_slice());

    // The search keys follow the new payload.
    let mut key = id_key(99);
    assert_eq!(db.exist_record(&mut key)?, 0);
    let mut key = id_key(1);
    assert_eq!(db.exist_record(&mut key).err(), Some(Error::EntryNotFound));
    Ok(())
}

#[test]
fn update_cannot_outgrow_the_record_space() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    insert_all(&mut db, &[(1, 1, 1), (2, 2, 2)]);

    let mut big = payload(9, 9, 9);
    big.push(0xff);
    assert_eq!(
        db.update_record(0, &Record::from_payload(&big)).err(),
        Some(Error::RecordTooLarge)
    );

    assert_eq!(
        db.update_record(7000, &Record::from_payload(&payload(9, 9, 9)))
            .err(),
        Some(Error::InvalidIndex)
    );
    assert_eq!(
        db.update_record(50, &Record::from_payload(&payload(9, 9, 9)))
            .err(),
        Some(Error::EntryNotFound)
    );
    Ok(())
}

#[test]
fn get_record_by_key_combines_search_and_fetch() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::create(dir.path().join("a.db"), &personnel_keys())?;
    let payloads = insert_all(&mut db, &[(10, 1, 1), (20, 2, 2), (30, 3, 3)]);

    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    let mut key = id_key(20);
    let slot = db.get_record(&mut key, &mut out)?;
    assert_eq!(slot, 1);
    assert_eq!(out.payload(), payloads[1].as_slice());
    assert_eq!(db.search_count(&key), 1);

    let mut key = id_key(21);
    assert_eq!(
        db.get_record(&mut key, &mut out).err(),
        Some(Error::EntryNotFound)
    );
    Ok(())
}
