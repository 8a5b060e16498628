//! Host-backed device port
//!
//! Maps the device file API onto `std::fs` below a root directory, so the VFS
//! can run (and be tested) on a development machine. Device paths are flat and
//! absolute (`/data.db`); they are resolved relative to the root.

use super::{DeviceResult, DeviceStorage, Fd, FileStat, OpenMode, Whence};
use crate::error::DeviceError;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

pub struct HostStorage {
    root: PathBuf,
    files: HashMap<u32, File>,
    next_fd: u32,
}

impl HostStorage {
    /// Serve device paths from `root`, which must already exist
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            files: HashMap::new(),
            next_fd: 1,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of a device path
    pub fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn file(&mut self, fd: Fd) -> DeviceResult<&mut File> {
        self.files
            .get_mut(&fd.raw())
            .ok_or(DeviceError::BadDescriptor(fd.raw()))
    }
}

impl DeviceStorage for HostStorage {
    fn open(&mut self, path: &str, mode: OpenMode) -> DeviceResult<Fd> {
        let host_path = self.host_path(path);
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::Create => options.read(true).write(true).create(true).truncate(true),
        };

        let file = options.open(&host_path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                DeviceError::NotFound(path.to_string())
            } else {
                DeviceError::Io(e)
            }
        })?;

        let fd = self.next_fd;
        self.next_fd = self.next_fd.wrapping_add(1).max(1);
        self.files.insert(fd, file);
        trace!("host open {:?} {} -> {}", host_path, mode.as_str(), fd);
        Ok(Fd::new(fd))
    }

    fn close(&mut self, fd: Fd) -> DeviceResult<()> {
        let mut file = self
            .files
            .remove(&fd.raw())
            .ok_or(DeviceError::BadDescriptor(fd.raw()))?;
        file.flush()?;
        Ok(())
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> DeviceResult<usize> {
        let file = self.file(fd)?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if total > 0 => {
                    warn!("host read stopped after {} bytes: {}", total, e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn write(&mut self, fd: Fd, buf: &[u8]) -> DeviceResult<usize> {
        let file = self.file(fd)?;
        let mut total = 0;
        while total < buf.len() {
            match file.write(&buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if total > 0 => {
                    warn!("host write stopped after {} bytes: {}", total, e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn seek(&mut self, fd: Fd, offset: i32, whence: Whence) -> DeviceResult<u32> {
        let file = self.file(fd)?;
        let target = match whence {
            Whence::Set => {
                let start = u64::try_from(offset).map_err(|_| {
                    DeviceError::Device(format!("negative absolute offset {offset}"))
                })?;
                SeekFrom::Start(start)
            }
            Whence::Cur => SeekFrom::Current(i64::from(offset)),
            Whence::End => SeekFrom::End(i64::from(offset)),
        };
        let pos = file.seek(target)?;
        u32::try_from(pos).map_err(|_| DeviceError::Device(format!("offset {pos} out of range")))
    }

    fn flush(&mut self, fd: Fd) -> DeviceResult<()> {
        let file = self.file(fd)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn size(&mut self, fd: Fd) -> u32 {
        match self.file(fd).and_then(|f| f.metadata().map_err(DeviceError::from)) {
            Ok(meta) => meta.len() as u32,
            Err(_) => 0,
        }
    }

    fn stat(&mut self, path: &str) -> Option<FileStat> {
        let meta = std::fs::metadata(self.host_path(path)).ok()?;
        Some(FileStat {
            name: path.to_string(),
            size: meta.len() as u32,
            is_dir: meta.is_dir(),
        })
    }

    fn remove(&mut self, path: &str) -> DeviceResult<()> {
        std::fs::remove_file(self.host_path(path)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                DeviceError::NotFound(path.to_string())
            } else {
                DeviceError::Io(e)
            }
        })
    }

    fn truncate(&mut self, fd: Fd, len: u32) -> DeviceResult<()> {
        let file = self.file(fd)?;
        file.set_len(u64::from(len))?;
        Ok(())
    }
}
