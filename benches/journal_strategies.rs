use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flashvfs::heap::HeapStats;
use flashvfs::strategy::{FileIo, MemoryJournal, SectorCache};
use flashvfs::{register, JournalMode, MemStorage, VfsConfig};
use std::sync::Arc;

/// Journal-shaped write pattern: a header, then (page number, page, checksum)
/// records
fn journal_pattern(c: &mut Criterion) {
    let page_sizes = vec![512usize, 1024, 4096];
    let mut group = c.benchmark_group("journal_records");

    for page_size in page_sizes {
        let records = 60_000 / (page_size + 8);
        group.throughput(Throughput::Bytes((records * (page_size + 8)) as u64));
        let page = vec![0x5Au8; page_size];

        group.bench_with_input(
            BenchmarkId::new("memory", page_size),
            &page_size,
            |b, &page_size| {
                b.iter(|| {
                    let heap = Arc::new(HeapStats::new(None));
                    let mut journal = MemoryJournal::open(8 * 1024, heap).unwrap();
                    write_records(&mut journal, &page, page_size, records);
                    black_box(journal.size());
                });
            },
        );

        for coalesce in [false, true] {
            let name = if coalesce { "sector_cached" } else { "sector_detect" };
            group.bench_with_input(
                BenchmarkId::new(name, page_size),
                &page_size,
                |b, &page_size| {
                    b.iter(|| {
                        let heap = Arc::new(HeapStats::new(None));
                        let journal = MemoryJournal::open(8 * 1024, Arc::clone(&heap)).unwrap();
                        let mut cache = SectorCache::new(journal, 4096, coalesce, heap);
                        write_records(&mut cache, &page, page_size, records);
                        cache.sync().unwrap();
                        black_box(cache.stats());
                    });
                },
            );
        }
    }

    group.finish();
}

fn write_records(file: &mut dyn FileIo, page: &[u8], page_size: usize, records: usize) {
    file.write(&[0u8; 28], 0).unwrap();
    let mut offset = 512i64;
    for pgno in 0..records as u32 {
        file.write(&pgno.to_be_bytes(), offset).unwrap();
        file.write(page, offset + 4).unwrap();
        file.write(&[0u8; 4], offset + 4 + page_size as i64).unwrap();
        offset += page_size as i64 + 8;
    }
}

/// SQLite transactions through the registered VFS, one per journal mode
fn sqlite_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_inserts");

    for journal in [JournalMode::Direct, JournalMode::Memory, JournalMode::SectorCached] {
        let config = VfsConfig::default()
            .with_name(format!("bench-{:?}", journal).to_lowercase())
            .with_journal(journal);
        let vfs = register(config, MemStorage::new()).unwrap();
        let conn = vfs.connect("/bench.db").unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, data TEXT)")
            .unwrap();

        group.bench_function(BenchmarkId::from_parameter(format!("{:?}", journal)), |b| {
            b.iter(|| {
                conn.execute_batch("BEGIN").unwrap();
                for i in 0..10 {
                    conn.execute("INSERT INTO t (data) VALUES (?1)", [format!("row {}", i)])
                        .unwrap();
                }
                conn.execute_batch("COMMIT").unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, journal_pattern, sqlite_inserts);
criterion_main!(benches);
