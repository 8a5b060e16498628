//! Error types for the device VFS
//!
//! [`VfsError`] is what every file and VFS operation returns. It is a closed
//! vocabulary that maps one-to-one onto the engine's result codes, so the
//! engine can drive its own retry/abort logic from [`VfsError::code`].

use libsqlite3_sys as ffi;
use std::os::raw::c_int;
use thiserror::Error;

/// Sub-kind of an I/O failure reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoErrorKind {
    Read,
    ShortRead,
    Write,
    Seek,
    Fsync,
    Delete,
    Truncate,
    Close,
}

impl IoErrorKind {
    /// Extended `SQLITE_IOERR_*` code for this kind
    pub fn code(self) -> c_int {
        match self {
            IoErrorKind::Read => ffi::SQLITE_IOERR_READ,
            IoErrorKind::ShortRead => ffi::SQLITE_IOERR_SHORT_READ,
            IoErrorKind::Write => ffi::SQLITE_IOERR_WRITE,
            IoErrorKind::Seek => ffi::SQLITE_IOERR_SEEK,
            IoErrorKind::Fsync => ffi::SQLITE_IOERR_FSYNC,
            IoErrorKind::Delete => ffi::SQLITE_IOERR_DELETE,
            IoErrorKind::Truncate => ffi::SQLITE_IOERR_TRUNCATE,
            IoErrorKind::Close => ffi::SQLITE_IOERR_CLOSE,
        }
    }
}

impl std::fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IoErrorKind::Read => "read",
            IoErrorKind::ShortRead => "short read",
            IoErrorKind::Write => "write",
            IoErrorKind::Seek => "seek",
            IoErrorKind::Fsync => "fsync",
            IoErrorKind::Delete => "delete",
            IoErrorKind::Truncate => "truncate",
            IoErrorKind::Close => "close",
        };
        f.write_str(name)
    }
}

/// Status of a failed VFS or file operation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    #[error("cannot open file")]
    CannotOpen,

    #[error("out of memory")]
    OutOfMemory,

    #[error("I/O error: {0}")]
    Io(IoErrorKind),
}

impl VfsError {
    /// Result code handed back to the engine
    pub fn code(self) -> c_int {
        match self {
            VfsError::CannotOpen => ffi::SQLITE_CANTOPEN,
            VfsError::OutOfMemory => ffi::SQLITE_NOMEM,
            VfsError::Io(kind) => kind.code(),
        }
    }

    /// Shorthand for `VfsError::Io(IoErrorKind::ShortRead)`
    pub fn is_short_read(self) -> bool {
        self == VfsError::Io(IoErrorKind::ShortRead)
    }
}

impl From<IoErrorKind> for VfsError {
    fn from(kind: IoErrorKind) -> Self {
        VfsError::Io(kind)
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;

/// Convert an operation result into the engine's return code
pub(crate) fn to_code(result: Result<()>) -> c_int {
    match result {
        Ok(()) => ffi::SQLITE_OK,
        Err(e) => e.code(),
    }
}

/// Failure reported by a [`DeviceStorage`](crate::port::DeviceStorage) port
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("bad descriptor: {0}")]
    BadDescriptor(u32),

    #[error("operation not supported by device: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(String),
}

/// Invalid or unreadable VFS configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure installing a VFS into the engine
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid VFS name: {0}")]
    InvalidName(String),

    #[error("a VFS named `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("VFS registration failed: {0}")]
    Engine(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_engine_vocabulary() {
        assert_eq!(VfsError::CannotOpen.code(), ffi::SQLITE_CANTOPEN);
        assert_eq!(VfsError::OutOfMemory.code(), ffi::SQLITE_NOMEM);
        assert_eq!(
            VfsError::Io(IoErrorKind::ShortRead).code(),
            ffi::SQLITE_IOERR_SHORT_READ
        );
        assert_eq!(IoErrorKind::Close.code(), ffi::SQLITE_IOERR_CLOSE);
    }

    #[test]
    fn test_io_codes_are_ioerr_family() {
        let kinds = [
            IoErrorKind::Read,
            IoErrorKind::ShortRead,
            IoErrorKind::Write,
            IoErrorKind::Seek,
            IoErrorKind::Fsync,
            IoErrorKind::Delete,
            IoErrorKind::Truncate,
            IoErrorKind::Close,
        ];
        for kind in kinds {
            assert_eq!(kind.code() & 0xff, ffi::SQLITE_IOERR, "{kind}");
        }
    }

    #[test]
    fn test_to_code() {
        assert_eq!(to_code(Ok(())), ffi::SQLITE_OK);
        assert_eq!(
            to_code(Err(IoErrorKind::Fsync.into())),
            ffi::SQLITE_IOERR_FSYNC
        );
    }
}
