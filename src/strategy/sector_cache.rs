//! Flash-sector write cache in front of a memory journal
//!
//! Holds one sector-sized scratch buffer. Every write is checked against the
//! resident sector and a crossing is logged. With coalescing enabled, writes
//! that stay inside one sector accumulate in the scratch buffer and reach the
//! journal only when another sector is needed, or on read, truncate, sync and
//! close. Writes spanning two sectors go straight through.

use super::journal::MemoryJournal;
use super::{FileIo, MAX_JOURNAL_SIZE};
use crate::error::{IoErrorKind, Result, VfsError};
use crate::heap::HeapStats;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorCacheStats {
    /// Writes whose end landed outside the resident sector
    pub crossings: u64,
    /// Writes absorbed by the scratch buffer
    pub staged: u64,
    /// Writes that reached the journal (flushes and write-throughs)
    pub forwarded: u64,
}

pub struct SectorCache {
    journal: MemoryJournal,
    heap: Arc<HeapStats>,
    sector_size: usize,
    coalesce: bool,
    /// Empty until the first write
    scratch: Vec<u8>,
    resident: Option<u64>,
    /// Meaningful bytes in `scratch`, from the start of the sector
    valid: usize,
    dirty: bool,
    stats: SectorCacheStats,
}

impl SectorCache {
    pub fn new(
        journal: MemoryJournal,
        sector_size: usize,
        coalesce: bool,
        heap: Arc<HeapStats>,
    ) -> Self {
        Self {
            journal,
            heap,
            sector_size,
            coalesce,
            scratch: Vec::new(),
            resident: None,
            valid: 0,
            dirty: false,
            stats: SectorCacheStats::default(),
        }
    }

    /// Sector the scratch buffer currently stands for
    pub fn resident_sector(&self) -> Option<u64> {
        self.resident
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn stats(&self) -> SectorCacheStats {
        self.stats
    }

    pub fn journal(&self) -> &MemoryJournal {
        &self.journal
    }

    fn sector_start(&self, sector: u64) -> usize {
        sector as usize * self.sector_size
    }

    fn ensure_scratch(&mut self) -> Result<()> {
        if !self.scratch.is_empty() {
            return Ok(());
        }
        self.heap.charge_alloc(self.sector_size)?;
        if self.scratch.try_reserve_exact(self.sector_size).is_err() {
            self.heap.release(self.sector_size);
            return Err(VfsError::OutOfMemory);
        }
        self.scratch.resize(self.sector_size, 0);
        Ok(())
    }

    /// Write the resident sector back to the journal if it holds staged data
    fn flush(&mut self) -> Result<()> {
        let Some(sector) = self.resident else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let base = self.sector_start(sector);
        self.journal
            .write(&self.scratch[..self.valid], base as i64)?;
        self.dirty = false;
        self.stats.forwarded += 1;
        trace!("sector {} flushed, {} bytes", sector, self.valid);
        Ok(())
    }

    /// Make `sector` resident, seeded from the journal's current content
    fn load(&mut self, sector: u64) {
        let base = self.sector_start(sector);
        let content = self.journal.as_bytes();
        // Sectors past the logical end start out empty
        let start = base.min(content.len());
        let valid = (content.len() - start).min(self.sector_size);

        self.scratch[..valid].copy_from_slice(&content[start..start + valid]);
        self.scratch[valid..].fill(0);
        self.resident = Some(sector);
        self.valid = valid;
        self.dirty = false;
    }

    /// Forget the resident sector (its content must already be in the journal)
    fn evict(&mut self) {
        self.resident = None;
        self.valid = 0;
        self.dirty = false;
    }
}

impl FileIo for SectorCache {
    fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()> {
        self.flush()?;
        self.journal.read(buf, offset)
    }

    fn write(&mut self, buf: &[u8], offset: i64) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let start = usize::try_from(offset).map_err(|_| IoErrorKind::Write)?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= MAX_JOURNAL_SIZE)
            .ok_or_else(|| {
                warn!(
                    "sector cache: write of {} at {} exceeds the {} byte cap",
                    buf.len(),
                    start,
                    MAX_JOURNAL_SIZE
                );
                VfsError::Io(IoErrorKind::Write)
            })?;

        let target = (end / self.sector_size) as u64;
        if self.resident != Some(target) {
            self.stats.crossings += 1;
            debug!(
                "sector cache: write crossing sector border {}/{:?}",
                target, self.resident
            );
        }

        if !self.coalesce {
            self.resident = Some(target);
            self.stats.forwarded += 1;
            return self.journal.write(buf, offset);
        }

        let first = (start / self.sector_size) as u64;
        let last = ((end - 1) / self.sector_size) as u64;
        if first != last {
            self.flush()?;
            self.evict();
            self.stats.forwarded += 1;
            return self.journal.write(buf, offset);
        }

        if self.resident != Some(first) {
            self.ensure_scratch()?;
            self.flush()?;
            self.load(first);
        }

        let base = self.sector_start(first);
        self.scratch[start - base..end - base].copy_from_slice(buf);
        self.valid = self.valid.max(end - base);
        self.dirty = true;
        self.stats.staged += 1;
        Ok(())
    }

    fn truncate(&mut self, size: i64) -> Result<()> {
        self.flush()?;
        self.evict();
        self.journal.truncate(size)
    }

    fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.journal.sync()
    }

    fn file_size(&mut self) -> Result<u64> {
        let journal_size = self.journal.file_size()?;
        match self.resident {
            Some(sector) if self.dirty => {
                let staged_end = (self.sector_start(sector) + self.valid) as u64;
                Ok(journal_size.max(staged_end))
            }
            _ => Ok(journal_size),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.journal.is_closed() {
            return Ok(());
        }
        let flushed = self.flush();
        if let Err(e) = flushed {
            warn!("sector cache: flush on close failed: {}", e);
        }
        if !self.scratch.is_empty() {
            self.scratch = Vec::new();
            self.heap.release(self.sector_size);
        }
        self.evict();
        self.journal.close()?;
        flushed
    }
}

impl Drop for SectorCache {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTOR: usize = 256;

    fn cache(coalesce: bool) -> (SectorCache, Arc<HeapStats>) {
        let heap = Arc::new(HeapStats::new(None));
        let journal = MemoryJournal::open(1024, Arc::clone(&heap)).unwrap();
        (
            SectorCache::new(journal, SECTOR, coalesce, Arc::clone(&heap)),
            heap,
        )
    }

    #[test]
    fn test_no_resident_sector_before_first_write() {
        let (c, heap) = cache(true);
        assert_eq!(c.resident_sector(), None);
        // Scratch is allocated lazily
        assert_eq!(heap.snapshot().allocations, 1);
    }

    #[test]
    fn test_in_sector_writes_are_staged() {
        let (mut c, _) = cache(true);
        c.write(b"aaaa", 0).unwrap();
        c.write(b"bbbb", 4).unwrap();
        c.write(b"cccc", 8).unwrap();

        assert!(c.is_dirty());
        assert_eq!(c.resident_sector(), Some(0));
        assert_eq!(c.stats().staged, 3);
        assert_eq!(c.stats().forwarded, 0);
        assert_eq!(c.journal().size(), 0);
        assert_eq!(c.file_size().unwrap(), 12);
    }

    #[test]
    fn test_moving_to_another_sector_flushes() {
        let (mut c, _) = cache(true);
        c.write(b"first", 0).unwrap();
        c.write(b"second", SECTOR as i64 + 10).unwrap();

        assert_eq!(c.stats().forwarded, 1);
        assert_eq!(&c.journal().as_bytes()[..5], b"first");
        assert_eq!(c.resident_sector(), Some(1));
    }

    #[test]
    fn test_returning_to_a_sector_keeps_earlier_bytes() {
        let (mut c, _) = cache(true);
        c.write(b"0123456789", 0).unwrap();
        c.write(b"x", SECTOR as i64).unwrap();
        c.write(b"AB", 2).unwrap();
        c.sync().unwrap();

        assert_eq!(&c.journal().as_bytes()[..10], b"01AB456789");
        assert_eq!(c.file_size().unwrap(), SECTOR as u64 + 1);
    }

    #[test]
    fn test_spanning_write_goes_through() {
        let (mut c, _) = cache(true);
        c.write(b"head", 0).unwrap();
        c.write(&[7u8; 20], SECTOR as i64 - 10).unwrap();

        assert_eq!(c.resident_sector(), None);
        assert!(!c.is_dirty());
        assert_eq!(c.stats().forwarded, 2);
        assert_eq!(c.journal().size() as usize, SECTOR + 10);
        assert_eq!(&c.journal().as_bytes()[..4], b"head");
    }

    #[test]
    fn test_read_sees_staged_data() {
        let (mut c, _) = cache(true);
        c.write(b"staged", 100).unwrap();
        let mut out = [0u8; 6];
        c.read(&mut out, 100).unwrap();
        assert_eq!(&out, b"staged");
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_detection_only_forwards_every_write() {
        let (mut c, _) = cache(false);
        c.write(b"aaaa", 0).unwrap();
        c.write(b"bbbb", 4).unwrap();
        c.write(b"cccc", SECTOR as i64).unwrap();

        let stats = c.stats();
        assert_eq!(stats.forwarded, 3);
        assert_eq!(stats.staged, 0);
        // First write (no resident sector) and the move to sector 1
        assert_eq!(stats.crossings, 2);
        assert_eq!(c.journal().size() as usize, SECTOR + 4);
        assert_eq!(c.resident_sector(), Some(1));
    }

    #[test]
    fn test_detection_only_holds_no_scratch() {
        let (mut c, heap) = cache(false);
        c.write(&[1u8; 64], 0).unwrap();
        c.write(&[2u8; 64], SECTOR as i64 * 3).unwrap();
        let snap = heap.snapshot();
        assert_eq!(snap.allocations, 1);
        assert_eq!(snap.bytes, c.journal().capacity());
    }

    #[test]
    fn test_jump_to_sector_past_end() {
        let (mut c, _) = cache(true);
        c.write(b"hdr", 0).unwrap();
        c.write(b"rec", SECTOR as i64 + 8).unwrap();
        c.write(b"far", SECTOR as i64 * 3 + 1).unwrap();
        assert_eq!(c.resident_sector(), Some(3));
        assert_eq!(c.file_size().unwrap(), SECTOR as u64 * 3 + 4);

        let mut out = [0xFFu8; 3];
        c.read(&mut out, SECTOR as i64 + 8).unwrap();
        assert_eq!(&out, b"rec");
        c.read(&mut out, SECTOR as i64 * 3 + 1).unwrap();
        assert_eq!(&out, b"far");
        c.read(&mut out, 0).unwrap();
        assert_eq!(&out, b"hdr");
    }

    #[test]
    fn test_write_ending_on_boundary_counts_as_crossing() {
        let (mut c, _) = cache(false);
        c.write(&[1u8; 8], 0).unwrap();
        c.write(&[1u8; 8], SECTOR as i64 - 8).unwrap();
        assert_eq!(c.stats().crossings, 2);
    }

    #[test]
    fn test_truncate_flushes_then_shrinks() {
        let (mut c, _) = cache(true);
        c.write(&[4u8; 100], 0).unwrap();
        c.truncate(40).unwrap();
        assert_eq!(c.file_size().unwrap(), 40);
        assert_eq!(c.resident_sector(), None);
    }

    #[test]
    fn test_close_flushes_and_releases() {
        let (mut c, heap) = cache(true);
        c.write(b"pending", 0).unwrap();
        assert_eq!(heap.snapshot().allocations, 2);

        c.close().unwrap();
        assert_eq!(heap.snapshot().allocations, 0);
        assert_eq!(heap.snapshot().bytes, 0);
        c.close().unwrap();
    }

    #[test]
    fn test_cap_rejected_before_staging() {
        let (mut c, _) = cache(true);
        assert_eq!(
            c.write(&[0u8; 4], MAX_JOURNAL_SIZE as i64 - 2),
            Err(VfsError::Io(IoErrorKind::Write))
        );
        assert!(!c.is_dirty());
    }
}
