//! Engine open flags and access kinds

use libsqlite3_sys as ffi;
use std::ops::BitOr;
use std::os::raw::c_int;

/// `SQLITE_OPEN_*` flags passed to `xOpen`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    pub const READONLY: Self = Self(ffi::SQLITE_OPEN_READONLY);
    pub const READWRITE: Self = Self(ffi::SQLITE_OPEN_READWRITE);
    pub const CREATE: Self = Self(ffi::SQLITE_OPEN_CREATE);
    pub const DELETE_ON_CLOSE: Self = Self(ffi::SQLITE_OPEN_DELETEONCLOSE);
    pub const EXCLUSIVE: Self = Self(ffi::SQLITE_OPEN_EXCLUSIVE);
    pub const MAIN_DB: Self = Self(ffi::SQLITE_OPEN_MAIN_DB);
    pub const TEMP_DB: Self = Self(ffi::SQLITE_OPEN_TEMP_DB);
    pub const MAIN_JOURNAL: Self = Self(ffi::SQLITE_OPEN_MAIN_JOURNAL);
    pub const TEMP_JOURNAL: Self = Self(ffi::SQLITE_OPEN_TEMP_JOURNAL);
    pub const SUBJOURNAL: Self = Self(ffi::SQLITE_OPEN_SUBJOURNAL);
    pub const WAL: Self = Self(ffi::SQLITE_OPEN_WAL);

    pub fn from_raw(raw: c_int) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> c_int {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_read_only(self) -> bool {
        self.contains(Self::READONLY)
    }

    pub fn is_read_write(self) -> bool {
        self.contains(Self::READWRITE)
    }

    pub fn is_main_journal(self) -> bool {
        self.contains(Self::MAIN_JOURNAL)
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// What `xAccess` is asked about. The device has no permissions, so every
/// kind reduces to existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Exists,
    ReadWrite,
    Read,
}

impl AccessKind {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            ffi::SQLITE_ACCESS_READWRITE => AccessKind::ReadWrite,
            ffi::SQLITE_ACCESS_READ => AccessKind::Read,
            _ => AccessKind::Exists,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_flags() {
        let flags = OpenFlags::READWRITE | OpenFlags::CREATE | OpenFlags::MAIN_JOURNAL;
        assert!(flags.is_main_journal());
        assert!(flags.is_read_write());
        assert!(!flags.is_read_only());
        assert!(!OpenFlags::MAIN_DB.is_main_journal());
    }

    #[test]
    fn test_raw_round_trip() {
        let flags = OpenFlags::from_raw(ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_MAIN_DB);
        assert!(flags.is_read_only());
        assert!(flags.contains(OpenFlags::MAIN_DB));
        assert_eq!(
            flags.raw(),
            ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_MAIN_DB
        );
    }

    #[test]
    fn test_access_kind() {
        assert_eq!(AccessKind::from_raw(ffi::SQLITE_ACCESS_EXISTS), AccessKind::Exists);
        assert_eq!(AccessKind::from_raw(ffi::SQLITE_ACCESS_READ), AccessKind::Read);
    }
}
