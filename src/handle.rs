//! Open file as seen by the engine

use crate::error::Result;
use crate::strategy::{FileIo, SectorCacheStats, Strategy, StrategyKind};
use tracing::{trace, warn};

/// Longest diagnostic name kept for a handle, in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Open file: a diagnostic name plus the strategy that serves it
///
/// The strategy is fixed at open. Dropping a handle closes it; call
/// [`FileHandle::close`] to observe the close status.
pub struct FileHandle {
    name: String,
    strategy: Strategy,
}

impl FileHandle {
    pub(crate) fn new(path: &str, strategy: Strategy) -> Self {
        Self {
            name: bounded_name(path),
            strategy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Capacity of the journal buffer, for memory-backed handles
    pub fn journal_capacity(&self) -> Option<usize> {
        match &self.strategy {
            Strategy::Direct(_) => None,
            Strategy::MemoryJournal(j) => Some(j.capacity()),
            Strategy::SectorCached(c) => Some(c.journal().capacity()),
        }
    }

    pub fn sector_stats(&self) -> Option<SectorCacheStats> {
        match &self.strategy {
            Strategy::SectorCached(c) => Some(c.stats()),
            _ => None,
        }
    }

    pub fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()> {
        let result = self.strategy.read(buf, offset);
        trace!("{}: read {} @ {} -> {:?}", self.name, buf.len(), offset, result);
        result
    }

    pub fn write(&mut self, buf: &[u8], offset: i64) -> Result<()> {
        let result = self.strategy.write(buf, offset);
        trace!("{}: write {} @ {} -> {:?}", self.name, buf.len(), offset, result);
        result
    }

    pub fn truncate(&mut self, size: i64) -> Result<()> {
        let result = self.strategy.truncate(size);
        trace!("{}: truncate {} -> {:?}", self.name, size, result);
        result
    }

    pub fn sync(&mut self) -> Result<()> {
        let result = self.strategy.sync();
        trace!("{}: sync -> {:?}", self.name, result);
        result
    }

    pub fn file_size(&mut self) -> Result<u64> {
        self.strategy.file_size()
    }

    /// Close the file and release everything it owns
    pub fn close(mut self) -> Result<()> {
        let result = self.strategy.close();
        trace!("{}: close -> {:?}", self.name, result);
        result
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Err(e) = self.strategy.close() {
            warn!("{}: close on drop failed: {}", self.name, e);
        }
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// `path` cut to at most [`MAX_NAME_LEN`] bytes on a char boundary
fn bounded_name(path: &str) -> String {
    if path.len() <= MAX_NAME_LEN {
        return path.to_string();
    }
    let mut end = MAX_NAME_LEN;
    while !path.is_char_boundary(end) {
        end -= 1;
    }
    path[..end].to_string()
}
