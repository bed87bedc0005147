//! Shared fixtures: the personnel payload layout and its three search keys.
//!
//! Payload layout (229 bytes): `id: u32` at 0, `name: [u8; 10]` at 4,
//! `department: [u8; 15]` at 14, `data: [u8; 200]` at 29.

use rand::rngs::StdRng;
use rand::Rng;

use crate::{Database, KeyDescriptor, KeySegment, Record, SearchKey, SegmentType};

pub const SIZE_OF_NAME: u8 = 10;
pub const SIZE_OF_DEPARTMENT: u8 = 15;
pub const OFFSET_NAME: u16 = 4;
pub const OFFSET_DEPARTMENT: u16 = 14;
pub const PAYLOAD_BYTES: usize = 229;

/// key 0: department + name (25 B), key 1: id (4 B), key 2: name + id (14 B).
pub fn personnel_keys() -> Vec<KeyDescriptor> {
    vec![
        KeyDescriptor::new(vec![
            KeySegment::new(OFFSET_DEPARTMENT, SegmentType::Byte, SIZE_OF_DEPARTMENT),
            KeySegment::new(OFFSET_NAME, SegmentType::Byte, SIZE_OF_NAME),
        ]),
        KeyDescriptor::new(vec![KeySegment::new(0, SegmentType::U32, 4)]),
        KeyDescriptor::new(vec![
            KeySegment::new(OFFSET_NAME, SegmentType::Byte, SIZE_OF_NAME),
            KeySegment::new(0, SegmentType::U32, 4),
        ]),
    ]
}

pub fn name_string(name_no: u32) -> String {
    format!("MY-NAME-{name_no:02}")
}

pub fn department_string(department_no: u32) -> String {
    format!("MY_DEPARTMENT-{department_no}")
}

/// Builds one payload. The trailing data area is derived from the id so
/// byte-for-byte read-back comparisons are meaningful.
pub fn payload(id: u32, name_no: u32, department_no: u32) -> Vec<u8> {
    let mut out = vec![0u8; PAYLOAD_BYTES];
    out[0..4].copy_from_slice(&id.to_ne_bytes());
    let name = name_string(name_no);
    out[4..4 + name.len()].copy_from_slice(name.as_bytes());
    let department = department_string(department_no);
    out[14..14 + department.len()].copy_from_slice(department.as_bytes());
    for (i, byte) in out[29..].iter_mut().enumerate() {
        *byte = (id as u8).wrapping_add(i as u8);
    }
    out
}

/// Random (id, name_no, department_no) triples: ids 0..1000, names 0..100,
/// departments 0..10, so duplicates show up at realistic rates.
pub fn random_triples(rng: &mut StdRng, n: usize) -> Vec<(u32, u32, u32)> {
    (0..n)
        .map(|_| {
            (
                rng.gen_range(0..1000u32),
                rng.gen_range(0..100u32),
                rng.gen_range(0..10u32),
            )
        })
        .collect()
}

/// Inserts one payload per triple, asserting consecutive slot numbers, and
/// returns the payloads for later comparison.
pub fn insert_all(db: &mut Database, triples: &[(u32, u32, u32)]) -> Vec<Vec<u8>> {
    let base = db.nr_of_records();
    let mut payloads = Vec::with_capacity(triples.len());
    for (i, &(id, name_no, department_no)) in triples.iter().enumerate() {
        let bytes = payload(id, name_no, department_no);
        let slot = db.create_record(&Record::from_payload(&bytes)).unwrap();
        assert_eq!(slot, base + i as u32);
        payloads.push(bytes);
    }
    payloads
}

/// A raw (unconverted) query key on the id key.
pub fn id_key(id: u32) -> SearchKey {
    SearchKey::new(1, id.to_ne_bytes().to_vec())
}

/// A raw partial query key on the department prefix of key 0.
pub fn department_key(department_no: u32) -> SearchKey {
    SearchKey::new(0, department_string(department_no).into_bytes())
}
