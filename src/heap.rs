//! Heap accounting for journal buffers
//!
//! The device has a few tens of kilobytes of heap, shared with everything else
//! running on it. Every buffer a memory journal or sector cache holds is
//! charged here, so the VFS can refuse growth past a configured limit and so
//! tests can prove that closing a handle returns everything it took.

use crate::error::{Result, VfsError};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapSnapshot {
    /// Buffers currently held
    pub allocations: usize,
    /// Bytes currently held
    pub bytes: usize,
    /// Buffers grown in place since the VFS was created
    pub reallocations: usize,
}

#[derive(Debug, Default)]
pub struct HeapStats {
    allocations: AtomicUsize,
    bytes: AtomicUsize,
    reallocations: AtomicUsize,
    limit: Option<usize>,
}

impl HeapStats {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            reallocations: self.reallocations.load(Ordering::Relaxed),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Reserve `bytes` for a new buffer
    pub fn charge_alloc(&self, bytes: usize) -> Result<()> {
        self.reserve(bytes)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reserve the extra bytes of a buffer growing from `old` to `new`
    pub fn charge_realloc(&self, old: usize, new: usize) -> Result<()> {
        self.reserve(new.saturating_sub(old))?;
        self.reallocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Return a buffer of `bytes`
    pub fn release(&self, bytes: usize) {
        self.bytes.fetch_sub(bytes, Ordering::Relaxed);
        self.allocations.fetch_sub(1, Ordering::Relaxed);
    }

    /// Undo a growth charge whose reallocation then failed
    pub fn refund_realloc(&self, old: usize, new: usize) {
        self.bytes
            .fetch_sub(new.saturating_sub(old), Ordering::Relaxed);
        self.reallocations.fetch_sub(1, Ordering::Relaxed);
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.bytes.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(bytes).ok_or(VfsError::OutOfMemory)?;
            if let Some(limit) = self.limit {
                if next > limit {
                    warn!(
                        "heap limit reached: {} held, {} requested, limit {}",
                        current, bytes, limit
                    );
                    return Err(VfsError::OutOfMemory);
                }
            }
            match self.bytes.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}
