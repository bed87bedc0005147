//! The end-to-end scenario: a pseudo-random personnel data set inserted
//! across many reserved runs, searched exactly and by prefix, then reopened
//! and searched again without re-inserting.

use std::collections::HashMap;

use super::helpers::*;
use crate::*;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

const RECORDS: usize = 2500;

fn verify_read_back(db: &mut Database, payloads: &[Vec<u8>]) -> Result<()> {
    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    for (slot, bytes) in payloads.iter().enumerate() {
        db.get_record_slot(slot as u32, &mut out)?;
        assert_eq!(out.payload(), bytes.as_slice());
    }
    Ok(())
}

fn verify_exact_lookups(db: &mut Database, triples: &[(u32, u32, u32)]) -> Result<()> {
    let mut expected: HashMap<u32, u32> = HashMap::new();
    for &(id, _, _) in triples {
        *expected.entry(id).or_insert(0) += 1;
    }

    let mut total = 0;
    for (&id, &count) in &expected {
        let mut key = id_key(id);
        db.exist_record(&mut key)?;
        assert_eq!(db.search_count(&key), count, "id {id}");
        total += count;
    }
    assert_eq!(total, db.nr_of_records());
    Ok(())
}

fn verify_prefix_lookups(db: &mut Database, triples: &[(u32, u32, u32)]) -> Result<()> {
    let mut expected: HashMap<u32, u32> = HashMap::new();
    for &(_, _, department) in triples {
        *expected.entry(department).or_insert(0) += 1;
    }

    let mut total = 0;
    for (&department, &count) in &expected {
        let mut key = department_key(department);
        db.exist_record(&mut key)?;
        assert_eq!(db.search_count(&key), count, "department {department}");
        total += count;
    }
    assert_eq!(total, db.nr_of_records());
    Ok(())
}

fn verify_cursor_exhaustion(db: &mut Database, triples: &[(u32, u32, u32)]) -> Result<()> {
    // Pick the most frequent id; with 2500 draws from 0..1000 some id
    // repeats.
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for &(id, _, _) in triples {
        *counts.entry(id).or_insert(0) += 1;
    }
    let (&id, &count) = counts.iter().max_by_key(|(_, &c)| c).unwrap();
    assert!(count >= 2);

    let mut key = id_key(id);
    db.exist_record(&mut key)?;
    assert_eq!(db.search_count(&key), count);

    let mut out = Record::with_capacity(PAYLOAD_BYTES as u32);
    for _ in 0..count - 1 {
        db.get_next_record(1, &mut out)?;
    }
    assert_eq!(
        db.get_next_record(1, &mut out).err(),
        Some(Error::EntryNotFound)
    );
    Ok(())
}

#[test]
fn insert_search_reopen_search() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("personnel.db");

    let mut rng = StdRng::seed_from_u64(0xdb);
    let triples = random_triples(&mut rng, RECORDS);

    let mut db = Database::create(&path, &personnel_keys())?;
    let payloads = insert_all(&mut db, &triples);
    assert_eq!(db.nr_of_records(), RECORDS as u32);

    verify_read_back(&mut db, &payloads)?;
    verify_exact_lookups(&mut db, &triples)?;
    verify_prefix_lookups(&mut db, &triples)?;
    verify_cursor_exhaustion(&mut db, &triples)?;
    db.close();

    // Everything again from disk alone.
    let mut db = Database::open(&path, false)?;
    assert_eq!(db.nr_of_records(), RECORDS as u32);
    assert_eq!(db.key_size(0), 25);
    assert_eq!(db.key_size(1), 4);
    assert_eq!(db.key_size(2), 14);

    verify_read_back(&mut db, &payloads)?;
    verify_exact_lookups(&mut db, &triples)?;
    verify_prefix_lookups(&mut db, &triples)?;
    verify_cursor_exhaustion(&mut db, &triples)?;

    // A read-only open serves the same data.
    let mut db = Database::open(&path, true)?;
    verify_read_back(&mut db, &payloads)?;
    verify_exact_lookups(&mut db, &triples)?;
    Ok(())
}
