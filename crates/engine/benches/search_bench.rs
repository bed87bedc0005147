use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine::{Database, KeyDescriptor, KeySegment, Record, SearchKey, SegmentType};
use tempfile::tempdir;

/// Binary-search lookups over 10k records keyed by a single u32.
fn bench_exist_record(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let keys = vec![KeyDescriptor::new(vec![KeySegment::new(
        0,
        SegmentType::U32,
        4,
    )])];
    let mut db = Database::create(dir.path().join("bench.db"), &keys).unwrap();

    let mut payload = [0u8; 64];
    for i in 0..10_000u32 {
        // Knuth multiplicative hash scatters the insertion order.
        let id = i.wrapping_mul(2_654_435_761) % 100_000;
        payload[0..4].copy_from_slice(&id.to_ne_bytes());
        db.create_record(&Record::from_payload(&payload)).unwrap();
    }

    // One search up front pays for the initial sort.
    let mut warmup = SearchKey::new(0, 0u32.to_ne_bytes().to_vec());
    let _ = db.exist_record(&mut warmup);

    let mut i = 0u32;
    c.bench_function("exist_record/10k", |b| {
        b.iter(|| {
            let id = i.wrapping_mul(2_654_435_761) % 100_000;
            i = i.wrapping_add(1);
            let mut key = SearchKey::new(0, id.to_ne_bytes().to_vec());
            black_box(db.exist_record(&mut key).ok())
        })
    });
}

criterion_group!(benches, bench_exist_record);
criterion_main!(benches);
