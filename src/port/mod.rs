//! Device Storage Port
//!
//! The minimal file API the host firmware exposes. The adapter consumes this
//! trait and never implements storage itself; [`HostStorage`] and
//! [`MemStorage`] are the two ports that ship with the crate.
//!
//! Offsets and sizes are 32-bit: the device file API cannot address more.

mod host;
mod mem;

pub use host::HostStorage;
pub use mem::{FaultPlan, MemStorage};

use crate::error::DeviceError;
use parking_lot::Mutex;
use std::sync::Arc;

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Device-native file descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(u32);

impl Fd {
    pub fn new(raw: u32) -> Self {
        Fd(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Open mode, rendered the way the device API spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `"r"`: existing file, read only
    Read,
    /// `"r+"`: existing file, read and write
    ReadWrite,
    /// `"w+"`: create or truncate, read and write
    Create,
}

impl OpenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadWrite => "r+",
            OpenMode::Create => "w+",
        }
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Result of a successful `stat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub size: u32,
    pub is_dir: bool,
}

/// Device file API consumed by the VFS
pub trait DeviceStorage: Send {
    fn open(&mut self, path: &str, mode: OpenMode) -> DeviceResult<Fd>;

    fn close(&mut self, fd: Fd) -> DeviceResult<()>;

    /// Read up to `buf.len()` bytes at the current position
    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> DeviceResult<usize>;

    /// Write up to `buf.len()` bytes at the current position
    fn write(&mut self, fd: Fd, buf: &[u8]) -> DeviceResult<usize>;

    /// Reposition and return the resulting absolute offset
    fn seek(&mut self, fd: Fd, offset: i32, whence: Whence) -> DeviceResult<u32>;

    fn flush(&mut self, fd: Fd) -> DeviceResult<()>;

    /// Size of an open file; zero for unknown descriptors
    fn size(&mut self, fd: Fd) -> u32;

    /// `None` when nothing exists at `path`
    fn stat(&mut self, path: &str) -> Option<FileStat>;

    fn remove(&mut self, path: &str) -> DeviceResult<()>;

    /// Set the length of an open file. Ports that cannot shrink files keep
    /// this default.
    fn truncate(&mut self, _fd: Fd, _len: u32) -> DeviceResult<()> {
        Err(DeviceError::Unsupported("truncate"))
    }
}

/// Port shared by a VFS and every direct file it opened
pub type SharedPort = Arc<Mutex<Box<dyn DeviceStorage>>>;

pub fn shared<S: DeviceStorage + 'static>(storage: S) -> SharedPort {
    Arc::new(Mutex::new(Box::new(storage)))
}
