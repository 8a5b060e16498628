//! End-to-end VFS scenarios against a RAM device
//!
//! Drives `DeviceVfs` the way the engine does (open by role, then file
//! operations on the handle) and checks the result codes it would see.

use flashvfs::{
    AccessKind, DeviceVfs, FaultPlan, FixedClock, IoErrorKind, JournalMode, MemStorage,
    OpenFlags, StrategyKind, VfsConfig, VfsError,
};
use libsqlite3_sys as ffi;

fn vfs_with(config: VfsConfig) -> (DeviceVfs, MemStorage) {
    let mem = MemStorage::new();
    let vfs = DeviceVfs::with_clock(config, mem.clone(), FixedClock(1_600_000_000)).unwrap();
    (vfs, mem)
}

fn journal_flags() -> OpenFlags {
    OpenFlags::READWRITE | OpenFlags::CREATE | OpenFlags::MAIN_JOURNAL
}

fn db_flags() -> OpenFlags {
    OpenFlags::READWRITE | OpenFlags::CREATE | OpenFlags::MAIN_DB
}

#[test]
fn scenario_memory_journal_lifecycle() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    let mut journal = vfs.open(Some("/j1"), journal_flags()).unwrap();

    assert_eq!(journal.kind(), StrategyKind::MemoryJournal);
    assert_eq!(journal.journal_capacity(), Some(8 * 1024));
    assert_eq!(journal.file_size().unwrap(), 0);

    let pattern: Vec<u8> = (0..100u8).collect();
    journal.write(&pattern, 0).unwrap();
    let mut out = vec![0u8; 100];
    journal.read(&mut out, 0).unwrap();
    assert_eq!(out, pattern);

    journal.write(&[0xAB; 50], 9000).unwrap();
    assert!(journal.journal_capacity().unwrap() >= 9050);
    assert_eq!(journal.file_size().unwrap(), 9050);

    journal.read(&mut out, 0).unwrap();
    assert_eq!(out, pattern);

    // The gap reads back as zeros
    let mut gap = vec![0xFFu8; 64];
    journal.read(&mut gap, 200).unwrap();
    assert!(gap.iter().all(|&b| b == 0));

    journal.close().unwrap();
    assert!(!mem.exists("/j1"));
    assert_eq!(vfs.heap().allocations, 0);
}

#[test]
fn scenario_access_missing_file() {
    let (vfs, _) = vfs_with(VfsConfig::default());
    assert!(!vfs.access("/missing", AccessKind::Exists));
    assert!(!vfs.access("/missing", AccessKind::Read));
}

#[test]
fn scenario_read_write_open_creates() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    assert!(!mem.exists("/new.db"));

    let mut file = vfs.open(Some("/new.db"), db_flags()).unwrap();
    assert_eq!(file.kind(), StrategyKind::Direct);
    assert_eq!(file.file_size().unwrap(), 0);
    assert!(mem.exists("/new.db"));
    assert!(vfs.access("/new.db", AccessKind::Exists));
}

#[test]
fn scenario_short_write() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    let mut file = vfs.open(Some("/data.db"), db_flags()).unwrap();

    mem.set_faults(FaultPlan {
        short_write: Some(10),
        ..FaultPlan::default()
    });
    let err = file.write(&[1u8; 64], 0).unwrap_err();
    assert_eq!(err, VfsError::Io(IoErrorKind::Write));
    assert_eq!(err.code(), ffi::SQLITE_IOERR_WRITE);
}

#[test]
fn direct_short_read_is_not_zero_filled() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    mem.insert("/data.db", b"abc");
    let mut file = vfs.open(Some("/data.db"), db_flags()).unwrap();

    let mut out = [0x55u8; 8];
    let err = file.read(&mut out, 0).unwrap_err();
    assert_eq!(err.code(), ffi::SQLITE_IOERR_SHORT_READ);
    assert_eq!(&out[..3], b"abc");
    assert_eq!(&out[3..], &[0x55; 5]);
}

#[test]
fn direct_device_failures_map_to_codes() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    let mut file = vfs.open(Some("/data.db"), db_flags()).unwrap();
    file.write(b"0123456789", 0).unwrap();

    mem.set_faults(FaultPlan {
        skew_seek: true,
        ..FaultPlan::default()
    });
    let mut out = [0u8; 4];
    assert_eq!(file.read(&mut out, 2).unwrap_err().code(), ffi::SQLITE_IOERR_READ);
    assert_eq!(file.write(b"xx", 2).unwrap_err().code(), ffi::SQLITE_IOERR_SEEK);

    mem.set_faults(FaultPlan {
        fail_flush: true,
        no_truncate: true,
        ..FaultPlan::default()
    });
    assert_eq!(file.sync().unwrap_err().code(), ffi::SQLITE_IOERR_FSYNC);
    assert_eq!(file.truncate(4).unwrap_err().code(), ffi::SQLITE_IOERR_TRUNCATE);

    mem.set_faults(FaultPlan {
        fail_close: true,
        fail_remove: true,
        ..FaultPlan::default()
    });
    assert_eq!(file.close().unwrap_err().code(), ffi::SQLITE_IOERR_CLOSE);
    assert_eq!(
        vfs.delete("/data.db").unwrap_err().code(),
        ffi::SQLITE_IOERR_DELETE
    );
}

#[test]
fn direct_truncate_shrinks_device_file() {
    let (vfs, mem) = vfs_with(VfsConfig::default());
    let mut file = vfs.open(Some("/data.db"), db_flags()).unwrap();
    file.write(&[7u8; 100], 0).unwrap();
    file.truncate(40).unwrap();
    assert_eq!(file.file_size().unwrap(), 40);
    assert_eq!(mem.contents("/data.db").unwrap().len(), 40);
}

#[test]
fn refused_open_is_cannot_open() {
    let (vfs, mem) = vfs_with(VfsConfig::default().with_journal(JournalMode::Direct));
    mem.set_faults(FaultPlan {
        fail_open: true,
        ..FaultPlan::default()
    });
    assert_eq!(
        vfs.open(Some("/data.db"), db_flags()).unwrap_err().code(),
        ffi::SQLITE_CANTOPEN
    );
    assert_eq!(
        vfs.open(Some("/data.db-journal"), journal_flags())
            .unwrap_err()
            .code(),
        ffi::SQLITE_CANTOPEN
    );
}

#[test]
fn heap_limit_refuses_journal() {
    let config = VfsConfig::default().with_heap_limit(4096);
    let (vfs, _) = vfs_with(config);
    let err = vfs.open(Some("/j"), journal_flags()).unwrap_err();
    assert_eq!(err, VfsError::OutOfMemory);
    assert_eq!(err.code(), ffi::SQLITE_NOMEM);
    assert_eq!(vfs.heap().bytes, 0);
}

#[test]
fn journal_growth_past_heap_limit_keeps_content() {
    let config = VfsConfig::default().with_heap_limit(10_000);
    let (vfs, _) = vfs_with(config);
    let mut journal = vfs.open(Some("/j"), journal_flags()).unwrap();
    journal.write(b"header", 0).unwrap();

    assert_eq!(
        journal.write(&[1u8; 512], 12_000).unwrap_err(),
        VfsError::OutOfMemory
    );
    let mut out = [0u8; 6];
    journal.read(&mut out, 0).unwrap();
    assert_eq!(&out, b"header");
    assert_eq!(journal.file_size().unwrap(), 6);
}

#[test]
fn sector_cached_journal_round_trip() {
    let config = VfsConfig::default()
        .with_journal(JournalMode::SectorCached)
        .with_sector_size(512);
    let (vfs, _) = vfs_with(config);
    let mut journal = vfs.open(Some("/j"), journal_flags()).unwrap();
    assert_eq!(journal.kind(), StrategyKind::MemoryJournalWithSectorCache);

    journal.write(&[1u8; 28], 0).unwrap();
    journal.write(&[2u8; 4], 512).unwrap();
    journal.write(&[3u8; 1024], 516).unwrap();
    journal.write(&[4u8; 4], 1540).unwrap();
    assert_eq!(journal.file_size().unwrap(), 1544);

    let mut out = vec![0u8; 1544];
    journal.read(&mut out, 0).unwrap();
    assert!(out[..28].iter().all(|&b| b == 1));
    assert!(out[28..512].iter().all(|&b| b == 0));
    assert!(out[512..516].iter().all(|&b| b == 2));
    assert!(out[516..1540].iter().all(|&b| b == 3));
    assert!(out[1540..].iter().all(|&b| b == 4));

    let stats = journal.sector_stats().unwrap();
    assert!(stats.crossings >= 2);

    journal.close().unwrap();
    assert_eq!(vfs.heap().bytes, 0);
}

#[test]
fn scenario_sector_cached_journal_lifecycle() {
    let (vfs, _) = vfs_with(VfsConfig::default().with_journal(JournalMode::SectorCached));
    let mut journal = vfs.open(Some("/j1"), journal_flags()).unwrap();
    assert_eq!(journal.kind(), StrategyKind::MemoryJournalWithSectorCache);
    assert_eq!(journal.journal_capacity(), Some(8 * 1024));

    let pattern: Vec<u8> = (0..100u8).collect();
    journal.write(&pattern, 0).unwrap();
    journal.write(&[0xCD; 50], 9000).unwrap();
    assert_eq!(journal.file_size().unwrap(), 9050);

    let mut out = vec![0u8; 100];
    journal.read(&mut out, 0).unwrap();
    assert_eq!(out, pattern);
    let mut tail = [0u8; 50];
    journal.read(&mut tail, 9000).unwrap();
    assert_eq!(tail, [0xCD; 50]);
    assert!(journal.journal_capacity().unwrap() >= 9050);

    journal.close().unwrap();
    assert_eq!(vfs.heap().bytes, 0);
}

#[test]
fn direct_read_past_end_is_empty_short_read() {
    let (vfs, _) = vfs_with(VfsConfig::default());
    let mut file = vfs.open(Some("/data.db"), db_flags()).unwrap();
    file.write(b"abc", 0).unwrap();

    let mut out = [0x33u8; 4];
    let err = file.read(&mut out, 100).unwrap_err();
    assert_eq!(err.code(), ffi::SQLITE_IOERR_SHORT_READ);
    assert_eq!(out, [0x33; 4]);
}
