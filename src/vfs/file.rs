//! SQLite file I/O methods
//!
//! The engine allocates `szOsFile` bytes per open file and hands them to
//! `xOpen`. [`FileShell`] is that allocation: the engine's `sqlite3_file`
//! followed by a pointer to the boxed [`FileHandle`] doing the work.

use super::vfs::{device_vfs, engine_path};
use crate::error::to_code;
use crate::flags::OpenFlags;
use crate::handle::FileHandle;
use libsqlite3_sys as ffi;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

/// Engine-visible file
#[repr(C)]
pub struct FileShell {
    /// Base sqlite3_file structure (MUST be first field)
    base: ffi::sqlite3_file,
    /// Owned handle, null until open succeeds and after close
    handle: *mut FileHandle,
}

static IO_METHODS: ffi::sqlite3_io_methods = ffi::sqlite3_io_methods {
    iVersion: 1,
    xClose: Some(x_close),
    xRead: Some(x_read),
    xWrite: Some(x_write),
    xTruncate: Some(x_truncate),
    xSync: Some(x_sync),
    xFileSize: Some(x_file_size),
    xLock: Some(x_lock),
    xUnlock: Some(x_unlock),
    xCheckReservedLock: Some(x_check_reserved_lock),
    xFileControl: Some(x_file_control),
    xSectorSize: Some(x_sector_size),
    xDeviceCharacteristics: Some(x_device_characteristics),
    xShmMap: None,
    xShmLock: None,
    xShmBarrier: None,
    xShmUnmap: None,
    xFetch: None,
    xUnfetch: None,
};

unsafe fn file_handle<'a>(file: *mut ffi::sqlite3_file) -> Option<&'a mut FileHandle> {
    (*(file as *mut FileShell)).handle.as_mut()
}

// VFS open callback

pub(super) unsafe extern "C" fn x_open(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    p_out_flags: *mut c_int,
) -> c_int {
    let shell = file as *mut FileShell;
    // A null pMethods tells the engine not to call xClose on failure
    ptr::addr_of_mut!((*shell).base.pMethods).write(ptr::null());
    ptr::addr_of_mut!((*shell).handle).write(ptr::null_mut());

    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    if !z_name.is_null() && engine_path(z_name).is_none() {
        return ffi::SQLITE_CANTOPEN;
    }

    match vfs.open(engine_path(z_name), OpenFlags::from_raw(flags)) {
        Ok(handle) => {
            (*shell).handle = Box::into_raw(Box::new(handle));
            (*shell).base.pMethods = &IO_METHODS;
            if !p_out_flags.is_null() {
                *p_out_flags = flags;
            }
            ffi::SQLITE_OK
        }
        Err(e) => e.code(),
    }
}

// File I/O method implementations

unsafe extern "C" fn x_close(file: *mut ffi::sqlite3_file) -> c_int {
    let shell = file as *mut FileShell;
    let handle = std::mem::replace(&mut (*shell).handle, ptr::null_mut());
    if handle.is_null() {
        return ffi::SQLITE_OK;
    }
    to_code(Box::from_raw(handle).close())
}

unsafe extern "C" fn x_read(
    file: *mut ffi::sqlite3_file,
    buf: *mut c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    let (Some(handle), Ok(len)) = (file_handle(file), usize::try_from(amt)) else {
        return ffi::SQLITE_IOERR_READ;
    };
    let buf = std::slice::from_raw_parts_mut(buf as *mut u8, len);
    to_code(handle.read(buf, offset))
}

unsafe extern "C" fn x_write(
    file: *mut ffi::sqlite3_file,
    buf: *const c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    let (Some(handle), Ok(len)) = (file_handle(file), usize::try_from(amt)) else {
        return ffi::SQLITE_IOERR_WRITE;
    };
    let buf = std::slice::from_raw_parts(buf as *const u8, len);
    to_code(handle.write(buf, offset))
}

unsafe extern "C" fn x_truncate(file: *mut ffi::sqlite3_file, size: ffi::sqlite3_int64) -> c_int {
    match file_handle(file) {
        Some(handle) => to_code(handle.truncate(size)),
        None => ffi::SQLITE_IOERR_TRUNCATE,
    }
}

unsafe extern "C" fn x_sync(file: *mut ffi::sqlite3_file, _flags: c_int) -> c_int {
    match file_handle(file) {
        Some(handle) => to_code(handle.sync()),
        None => ffi::SQLITE_IOERR_FSYNC,
    }
}

unsafe extern "C" fn x_file_size(
    file: *mut ffi::sqlite3_file,
    p_size: *mut ffi::sqlite3_int64,
) -> c_int {
    let Some(handle) = file_handle(file) else {
        return ffi::SQLITE_IOERR_FSTAT;
    };
    match handle.file_size() {
        Ok(size) => {
            *p_size = size as ffi::sqlite3_int64;
            ffi::SQLITE_OK
        }
        Err(e) => e.code(),
    }
}

// Single connection, no locking

unsafe extern "C" fn x_lock(_file: *mut ffi::sqlite3_file, _lock_type: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_unlock(_file: *mut ffi::sqlite3_file, _lock_type: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_check_reserved_lock(
    _file: *mut ffi::sqlite3_file,
    p_res_out: *mut c_int,
) -> c_int {
    *p_res_out = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_file_control(
    _file: *mut ffi::sqlite3_file,
    _op: c_int,
    _p_arg: *mut c_void,
) -> c_int {
    ffi::SQLITE_NOTFOUND
}

unsafe extern "C" fn x_sector_size(_file: *mut ffi::sqlite3_file) -> c_int {
    0
}

unsafe extern "C" fn x_device_characteristics(_file: *mut ffi::sqlite3_file) -> c_int {
    0
}
