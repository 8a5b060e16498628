//! RAM-backed device port
//!
//! Behaves like a tiny flat flash filesystem held in memory, with a
//! [`FaultPlan`] to make the device misbehave (short writes, failing flush,
//! close or remove, refused opens). Clones share the same device, so a test
//! can hand one clone to the VFS and keep another to inspect or sabotage it.

use super::{DeviceResult, DeviceStorage, Fd, FileStat, OpenMode, Whence};
use crate::error::DeviceError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Failures the device should produce
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Transfer at most this many bytes per write call
    pub short_write: Option<usize>,
    /// Transfer at most this many bytes per read call
    pub short_read: Option<usize>,
    /// Report a different position than requested on every seek
    pub skew_seek: bool,
    pub fail_open: bool,
    pub fail_flush: bool,
    pub fail_close: bool,
    pub fail_remove: bool,
    /// Refuse `truncate` like a port without shrink support
    pub no_truncate: bool,
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    pos: usize,
    writable: bool,
}

#[derive(Debug, Default)]
struct MemDevice {
    files: HashMap<String, Vec<u8>>,
    open: HashMap<u32, OpenFile>,
    next_fd: u32,
    faults: FaultPlan,
    writes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    device: Arc<Mutex<MemDevice>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active fault plan
    pub fn set_faults(&self, faults: FaultPlan) {
        self.device.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(FaultPlan::default());
    }

    /// Place a file on the device
    pub fn insert(&self, path: &str, content: &[u8]) {
        self.device
            .lock()
            .files
            .insert(path.to_string(), content.to_vec());
    }

    /// Current content of a file
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.device.lock().files.get(path).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.device.lock().files.contains_key(path)
    }

    /// Number of descriptors currently open
    pub fn open_count(&self) -> usize {
        self.device.lock().open.len()
    }

    /// Write calls that reached the device (a stand-in for flash programs)
    pub fn write_count(&self) -> u64 {
        self.device.lock().writes
    }
}

impl MemDevice {
    fn handle(&mut self, fd: Fd) -> DeviceResult<&mut OpenFile> {
        self.open
            .get_mut(&fd.raw())
            .ok_or(DeviceError::BadDescriptor(fd.raw()))
    }
}

impl DeviceStorage for MemStorage {
    fn open(&mut self, path: &str, mode: OpenMode) -> DeviceResult<Fd> {
        let mut dev = self.device.lock();
        if dev.faults.fail_open {
            return Err(DeviceError::Device(format!("open refused: {path}")));
        }
        match mode {
            OpenMode::Read | OpenMode::ReadWrite => {
                if !dev.files.contains_key(path) {
                    return Err(DeviceError::NotFound(path.to_string()));
                }
            }
            OpenMode::Create => {
                dev.files.insert(path.to_string(), Vec::new());
            }
        }

        dev.next_fd += 1;
        let fd = dev.next_fd;
        dev.open.insert(
            fd,
            OpenFile {
                path: path.to_string(),
                pos: 0,
                writable: mode.is_writable(),
            },
        );
        trace!("mem open {} {} -> {}", path, mode.as_str(), fd);
        Ok(Fd::new(fd))
    }

    fn close(&mut self, fd: Fd) -> DeviceResult<()> {
        let mut dev = self.device.lock();
        if dev.faults.fail_close {
            return Err(DeviceError::Device("close failed".to_string()));
        }
        dev.open
            .remove(&fd.raw())
            .map(|_| ())
            .ok_or(DeviceError::BadDescriptor(fd.raw()))
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> DeviceResult<usize> {
        let mut dev = self.device.lock();
        let limit = dev.faults.short_read.unwrap_or(usize::MAX);
        let (path, pos) = {
            let handle = dev.handle(fd)?;
            (handle.path.clone(), handle.pos)
        };
        let data = dev
            .files
            .get(&path)
            .ok_or_else(|| DeviceError::NotFound(path.clone()))?;

        // A descriptor may sit past the end after a seek
        let start = pos.min(data.len());
        let n = buf.len().min(data.len() - start).min(limit);
        buf[..n].copy_from_slice(&data[start..start + n]);
        dev.handle(fd)?.pos += n;
        Ok(n)
    }

    fn write(&mut self, fd: Fd, buf: &[u8]) -> DeviceResult<usize> {
        let mut dev = self.device.lock();
        let limit = dev.faults.short_write.unwrap_or(usize::MAX);
        let (path, pos, writable) = {
            let handle = dev.handle(fd)?;
            (handle.path.clone(), handle.pos, handle.writable)
        };
        if !writable {
            return Err(DeviceError::Device(format!("{path} opened read-only")));
        }

        let n = buf.len().min(limit);
        let data = dev
            .files
            .get_mut(&path)
            .ok_or_else(|| DeviceError::NotFound(path.clone()))?;
        if data.len() < pos + n {
            data.resize(pos + n, 0);
        }
        data[pos..pos + n].copy_from_slice(&buf[..n]);
        dev.writes += 1;
        dev.handle(fd)?.pos += n;
        Ok(n)
    }

    fn seek(&mut self, fd: Fd, offset: i32, whence: Whence) -> DeviceResult<u32> {
        let mut dev = self.device.lock();
        let skew = dev.faults.skew_seek;
        let path = dev.handle(fd)?.path.clone();
        let len = dev.files.get(&path).map_or(0, Vec::len) as i64;
        let handle = dev.handle(fd)?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => handle.pos as i64,
            Whence::End => len,
        };
        let target = base + i64::from(offset);
        if target < 0 || target > i64::from(i32::MAX) {
            return Err(DeviceError::Device(format!("seek to {target} out of range")));
        }
        handle.pos = target as usize;
        let reported = if skew { target + 1 } else { target };
        Ok(reported as u32)
    }

    fn flush(&mut self, fd: Fd) -> DeviceResult<()> {
        let mut dev = self.device.lock();
        dev.handle(fd)?;
        if dev.faults.fail_flush {
            return Err(DeviceError::Device("flush failed".to_string()));
        }
        Ok(())
    }

    fn size(&mut self, fd: Fd) -> u32 {
        let mut dev = self.device.lock();
        let Ok(handle) = dev.handle(fd) else {
            return 0;
        };
        let path = handle.path.clone();
        dev.files.get(&path).map_or(0, |d| d.len() as u32)
    }

    fn stat(&mut self, path: &str) -> Option<FileStat> {
        let dev = self.device.lock();
        dev.files.get(path).map(|data| FileStat {
            name: path.to_string(),
            size: data.len() as u32,
            is_dir: false,
        })
    }

    fn remove(&mut self, path: &str) -> DeviceResult<()> {
        let mut dev = self.device.lock();
        if dev.faults.fail_remove {
            return Err(DeviceError::Device(format!("remove failed: {path}")));
        }
        dev.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DeviceError::NotFound(path.to_string()))
    }

    fn truncate(&mut self, fd: Fd, len: u32) -> DeviceResult<()> {
        let mut dev = self.device.lock();
        if dev.faults.no_truncate {
            return Err(DeviceError::Unsupported("truncate"));
        }
        let path = dev.handle(fd)?.path.clone();
        if let Some(data) = dev.files.get_mut(&path) {
            data.resize(len as usize, 0);
        }
        Ok(())
    }
}
