//! Direct I/O: every operation goes straight to the device port

use super::FileIo;
use crate::error::{IoErrorKind, Result};
use crate::port::{Fd, SharedPort, Whence};
use tracing::{trace, warn};

pub struct DirectFile {
    port: SharedPort,
    /// `None` once closed
    fd: Option<Fd>,
}

impl DirectFile {
    pub fn new(port: SharedPort, fd: Fd) -> Self {
        Self { port, fd: Some(fd) }
    }

    pub fn fd(&self) -> Option<Fd> {
        self.fd
    }

    fn open_fd(&self, kind: IoErrorKind) -> Result<Fd> {
        self.fd.ok_or(kind.into())
    }

    /// Position the descriptor at `offset`, failing with `kind` when the
    /// device cannot address it or lands elsewhere
    fn seek_to(&self, fd: Fd, offset: i64, kind: IoErrorKind) -> Result<()> {
        let target = i32::try_from(offset).map_err(|_| {
            warn!("fd {}: offset {} beyond device range", fd.raw(), offset);
            kind
        })?;
        match self.port.lock().seek(fd, target, Whence::Set) {
            Ok(pos) if i64::from(pos) == offset => Ok(()),
            Ok(pos) => {
                warn!("fd {}: seek to {} landed at {}", fd.raw(), offset, pos);
                Err(kind.into())
            }
            Err(e) => {
                warn!("fd {}: seek to {} failed: {}", fd.raw(), offset, e);
                Err(kind.into())
            }
        }
    }
}

impl FileIo for DirectFile {
    fn read(&mut self, buf: &mut [u8], offset: i64) -> Result<()> {
        let fd = self.open_fd(IoErrorKind::Read)?;
        self.seek_to(fd, offset, IoErrorKind::Read)?;

        let n = self.port.lock().read(fd, buf).map_err(|e| {
            warn!("fd {}: read failed: {}", fd.raw(), e);
            IoErrorKind::Read
        })?;
        if n == buf.len() {
            Ok(())
        } else {
            trace!("fd {}: short read {}/{} at {}", fd.raw(), n, buf.len(), offset);
            Err(IoErrorKind::ShortRead.into())
        }
    }

    fn write(&mut self, buf: &[u8], offset: i64) -> Result<()> {
        let fd = self.open_fd(IoErrorKind::Write)?;
        self.seek_to(fd, offset, IoErrorKind::Seek)?;

        match self.port.lock().write(fd, buf) {
            Ok(n) if n == buf.len() => Ok(()),
            Ok(n) => {
                warn!("fd {}: short write {}/{} at {}", fd.raw(), n, buf.len(), offset);
                Err(IoErrorKind::Write.into())
            }
            Err(e) => {
                warn!("fd {}: write failed: {}", fd.raw(), e);
                Err(IoErrorKind::Write.into())
            }
        }
    }

    fn truncate(&mut self, size: i64) -> Result<()> {
        let fd = self.open_fd(IoErrorKind::Truncate)?;
        let len = u32::try_from(size).map_err(|_| IoErrorKind::Truncate)?;
        self.port.lock().truncate(fd, len).map_err(|e| {
            warn!("fd {}: truncate to {} failed: {}", fd.raw(), len, e);
            IoErrorKind::Truncate.into()
        })
    }

    fn sync(&mut self) -> Result<()> {
        let fd = self.open_fd(IoErrorKind::Fsync)?;
        self.port.lock().flush(fd).map_err(|e| {
            warn!("fd {}: flush failed: {}", fd.raw(), e);
            IoErrorKind::Fsync.into()
        })
    }

    fn file_size(&mut self) -> Result<u64> {
        match self.fd {
            Some(fd) => Ok(u64::from(self.port.lock().size(fd))),
            None => Ok(0),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(fd) = self.fd.take() else {
            return Ok(());
        };
        self.port.lock().close(fd).map_err(|e| {
            warn!("fd {}: close failed: {}", fd.raw(), e);
            IoErrorKind::Close.into()
        })
    }
}
