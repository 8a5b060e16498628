//! Per-file I/O strategies
//!
//! A file is served by exactly one strategy, picked when it is opened:
//!
//! - [`DirectFile`]: every operation maps onto the device port
//! - [`MemoryJournal`]: the rollback journal kept in a heap buffer
//! - [`SectorCache`]: a memory journal behind a flash-sector write cache

mod direct;
mod journal;
mod sector_cache;

pub use direct::DirectFile;
pub use journal::MemoryJournal;
pub use sector_cache::{SectorCache, SectorCacheStats};

use crate::error::Result;

/// Largest journal the memory strategies will hold (16-bit logical size)
pub const MAX_JOURNAL_SIZE: usize = u16::MAX as usize;

/// File operations the engine drives through `sqlite3_io_methods`
///
/// Offsets are the engine's signed 64-bit byte offsets; each strategy
/// narrows them to what its storage can address.
pub trait FileIo {
    /// Fill `buf` from `offset`. A partial read copies the available prefix
    /// and fails with `ShortRead`; the rest of `buf` is left as it was.
    fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()>;

    fn write(&mut self, buf: &[u8], offset: i64) -> Result<()>;

    fn truncate(&mut self, size: i64) -> Result<()>;

    fn sync(&mut self) -> Result<()>;

    fn file_size(&mut self) -> Result<u64>;

    /// Release what the strategy owns. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    MemoryJournal,
    MemoryJournalWithSectorCache,
}

pub enum Strategy {
    Direct(DirectFile),
    MemoryJournal(MemoryJournal),
    SectorCached(SectorCache),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Direct(_) => StrategyKind::Direct,
            Strategy::MemoryJournal(_) => StrategyKind::MemoryJournal,
            Strategy::SectorCached(_) => StrategyKind::MemoryJournalWithSectorCache,
        }
    }

    fn io(&mut self) -> &mut dyn FileIo {
        match self {
            Strategy::Direct(f) => f,
            Strategy::MemoryJournal(j) => j,
            Strategy::SectorCached(c) => c,
        }
    }
}

impl FileIo for Strategy {
    fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()> {
        self.io().read(buf, offset)
    }

    fn write(&mut self, buf: &[u8], offset: i64) -> Result<()> {
        self.io().write(buf, offset)
    }

    fn truncate(&mut self, size: i64) -> Result<()> {
        self.io().truncate(size)
    }

    fn sync(&mut self) -> Result<()> {
        self.io().sync()
    }

    fn file_size(&mut self) -> Result<u64> {
        self.io().file_size()
    }

    fn close(&mut self) -> Result<()> {
        self.io().close()
    }
}
