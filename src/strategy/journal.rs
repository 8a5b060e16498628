//! Heap-resident rollback journal
//!
//! Keeps the engine's rollback journal off the wear-limited medium. The journal
//! lives in one zero-filled buffer that starts at a fixed number of pages and
//! grows on demand. Its logical size is a `u16`: journal content is capped at
//! [`MAX_JOURNAL_SIZE`] bytes, which bounds the heap a single transaction can
//! pin on the device.

use super::{FileIo, MAX_JOURNAL_SIZE};
use crate::error::{IoErrorKind, Result, VfsError};
use crate::heap::HeapStats;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct MemoryJournal {
    /// `buf.len()` is the allocated capacity; bytes past `size` are zero
    buf: Vec<u8>,
    size: u16,
    heap: Arc<HeapStats>,
    closed: bool,
}

impl MemoryJournal {
    /// Allocate a zeroed journal of `capacity` bytes
    pub fn open(capacity: usize, heap: Arc<HeapStats>) -> Result<Self> {
        heap.charge_alloc(capacity)?;
        let mut buf = Vec::new();
        if buf.try_reserve_exact(capacity).is_err() {
            heap.release(capacity);
            return Err(VfsError::OutOfMemory);
        }
        buf.resize(capacity, 0);

        debug!("memory journal open, {} bytes", capacity);
        Ok(Self {
            buf,
            size: 0,
            heap,
            closed: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Logical content
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.size)]
    }

    /// Grow the buffer to exactly `end` bytes
    fn grow(&mut self, end: usize) -> Result<()> {
        let old = self.buf.len();
        self.heap.charge_realloc(old, end)?;
        if self.buf.try_reserve_exact(end - old).is_err() {
            self.heap.refund_realloc(old, end);
            warn!("memory journal: growth {} -> {} failed", old, end);
            return Err(VfsError::OutOfMemory);
        }
        self.buf.resize(end, 0);
        trace!("memory journal grown {} -> {}", old, end);
        Ok(())
    }
}

impl FileIo for MemoryJournal {
    fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()> {
        if self.closed {
            return Err(IoErrorKind::Read.into());
        }
        let size = usize::from(self.size);
        let start = usize::try_from(offset).map_err(|_| IoErrorKind::Read)?;
        let end = start.saturating_add(buf.len());

        if end > size {
            let available = size.saturating_sub(start);
            if available > 0 {
                buf[..available].copy_from_slice(&self.buf[start..size]);
            }
            trace!(
                "memory journal: short read {}/{} at {} (size {})",
                available,
                buf.len(),
                start,
                size
            );
            return Err(IoErrorKind::ShortRead.into());
        }

        buf.copy_from_slice(&self.buf[start..end]);
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: i64) -> Result<()> {
        if self.closed {
            return Err(IoErrorKind::Write.into());
        }
        let start = usize::try_from(offset).map_err(|_| IoErrorKind::Write)?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= MAX_JOURNAL_SIZE)
            .ok_or_else(|| {
                warn!(
                    "memory journal: write of {} at {} exceeds the {} byte cap",
                    buf.len(),
                    start,
                    MAX_JOURNAL_SIZE
                );
                VfsError::Io(IoErrorKind::Write)
            })?;

        if end > self.buf.len() {
            self.grow(end)?;
        }

        self.buf[start..end].copy_from_slice(buf);
        // `end` is bounded by MAX_JOURNAL_SIZE above
        self.size = self.size.max(end as u16);
        Ok(())
    }

    /// Shrinks the logical size; never grows it
    fn truncate(&mut self, size: i64) -> Result<()> {
        let new = usize::try_from(size).map_err(|_| IoErrorKind::Truncate)?;
        let old = usize::from(self.size);
        if new < old {
            self.buf[new..old].fill(0);
            self.size = new as u16;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn file_size(&mut self) -> Result<u64> {
        Ok(u64::from(self.size))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let capacity = self.buf.len();
        self.buf = Vec::new();
        self.size = 0;
        self.closed = true;
        self.heap.release(capacity);
        debug!("memory journal closed, {} bytes released", capacity);
        Ok(())
    }
}

impl Drop for MemoryJournal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
