//! VFS descriptor and registration
//!
//! Implements the sqlite3_vfs interface on top of a [`DeviceStorage`] port.

use super::file::{x_open, FileShell};
use crate::clock::{julian_day, julian_ms, Clock, SystemClock};
use crate::config::{JournalMode, VfsConfig};
use crate::error::{to_code, IoErrorKind, RegistrationError, Result, VfsError};
use crate::flags::{AccessKind, OpenFlags};
use crate::handle::FileHandle;
use crate::heap::{HeapSnapshot, HeapStats};
use crate::port::{shared, DeviceStorage, OpenMode, SharedPort};
use crate::strategy::{DirectFile, MemoryJournal, SectorCache, Strategy};
use libsqlite3_sys as ffi;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Serializes the find-then-register sequence
static REGISTRY: Mutex<()> = Mutex::new(());

/// SQLite VFS backed by a device storage port
pub struct DeviceVfs {
    config: VfsConfig,
    port: SharedPort,
    clock: Box<dyn Clock>,
    heap: Arc<HeapStats>,
    /// Paths currently or previously served by a memory journal
    memory_journals: Mutex<HashSet<String>>,
    /// VFS name (C string)
    name: CString,
}

impl DeviceVfs {
    /// Create a VFS over `storage` using the system clock
    pub fn new<S>(config: VfsConfig, storage: S) -> std::result::Result<Self, RegistrationError>
    where
        S: DeviceStorage + 'static,
    {
        Self::with_clock(config, storage, SystemClock)
    }

    pub fn with_clock<S, C>(
        config: VfsConfig,
        storage: S,
        clock: C,
    ) -> std::result::Result<Self, RegistrationError>
    where
        S: DeviceStorage + 'static,
        C: Clock + 'static,
    {
        config.validate()?;
        let name = CString::new(config.name.as_str())
            .map_err(|_| RegistrationError::InvalidName(config.name.clone()))?;

        Ok(Self {
            heap: Arc::new(HeapStats::new(config.heap_limit)),
            port: shared(storage),
            clock: Box::new(clock),
            memory_journals: Mutex::new(HashSet::new()),
            name,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Journal heap held by this VFS right now
    pub fn heap(&self) -> HeapSnapshot {
        self.heap.snapshot()
    }

    /// Open `path` with the strategy its role calls for
    ///
    /// The main rollback journal follows the configured [`JournalMode`];
    /// every other file goes straight to the device. Anonymous temp files
    /// (`None`) are not supported.
    pub fn open(&self, path: Option<&str>, flags: OpenFlags) -> Result<FileHandle> {
        let Some(path) = path else {
            warn!("{}: open without a path refused", self.name());
            return Err(VfsError::CannotOpen);
        };

        if flags.is_main_journal() {
            match self.config.journal {
                JournalMode::Direct => {}
                JournalMode::Memory => return self.open_memory_journal(path, false),
                JournalMode::SectorCached => return self.open_memory_journal(path, true),
            }
        }

        let mode = self.open_mode(path, flags);
        let fd = self.port.lock().open(path, mode).map_err(|e| {
            warn!("{}: open {} ({}) failed: {}", self.name(), path, mode.as_str(), e);
            VfsError::CannotOpen
        })?;

        debug!("{}: opened {} ({}) on device", self.name(), path, mode.as_str());
        let direct = DirectFile::new(Arc::clone(&self.port), fd);
        Ok(FileHandle::new(path, Strategy::Direct(direct)))
    }

    fn open_mode(&self, path: &str, flags: OpenFlags) -> OpenMode {
        if flags.is_read_write() || flags.is_main_journal() {
            if self.access(path, AccessKind::Exists) {
                OpenMode::ReadWrite
            } else {
                OpenMode::Create
            }
        } else {
            OpenMode::Read
        }
    }

    fn open_memory_journal(&self, path: &str, cached: bool) -> Result<FileHandle> {
        let capacity = self.config.initial_journal_capacity();
        let journal = MemoryJournal::open(capacity, Arc::clone(&self.heap)).map_err(|e| {
            warn!("{}: memory journal for {} refused: {}", self.name(), path, e);
            e
        })?;

        let strategy = if cached {
            Strategy::SectorCached(SectorCache::new(
                journal,
                self.config.sector_size,
                self.config.coalesce,
                Arc::clone(&self.heap),
            ))
        } else {
            Strategy::MemoryJournal(journal)
        };

        self.memory_journals.lock().insert(path.to_string());
        debug!(
            "{}: journal {} kept in memory ({} bytes, sector cache: {})",
            self.name(),
            path,
            capacity,
            cached
        );
        Ok(FileHandle::new(path, strategy))
    }

    /// Remove `path` from the device
    ///
    /// A memory journal never reached the device, so deleting one only
    /// retires its record. A device file left at the same path is removed
    /// as well.
    pub fn delete(&self, path: &str) -> Result<()> {
        let was_memory = self.memory_journals.lock().remove(path);
        let mut port = self.port.lock();
        if was_memory && port.stat(path).is_none() {
            trace!("{}: retired memory journal {}", self.name(), path);
            return Ok(());
        }

        port.remove(path).map_err(|e| {
            warn!("{}: delete {} failed: {}", self.name(), path, e);
            VfsError::Io(IoErrorKind::Delete)
        })
    }

    /// Whether `path` exists on the device. Never fails.
    pub fn access(&self, path: &str, kind: AccessKind) -> bool {
        let exists = self.port.lock().stat(path).is_some();
        trace!("{}: access {} {:?} -> {}", self.name(), path, kind, exists);
        exists
    }

    /// Identity mapping, cut to fit a `max_len`-byte buffer with terminator
    pub fn full_path(&self, path: &str, max_len: usize) -> String {
        let limit = max_len.saturating_sub(1);
        if path.len() <= limit {
            return path.to_string();
        }
        let mut end = limit;
        while !path.is_char_boundary(end) {
            end -= 1;
        }
        path[..end].to_string()
    }

    /// Fill `buf` from a generator seeded with the wall-clock second.
    /// Not suitable for anything cryptographic.
    pub fn randomness(&self, buf: &mut [u8]) {
        let mut rng = StdRng::seed_from_u64(self.clock.now_secs() as u64);
        rng.fill_bytes(buf);
    }

    /// The device does not sleep; reports zero microseconds slept
    pub fn sleep(&self, _micros: i32) -> i32 {
        0
    }

    /// Current time as a Julian day number
    pub fn current_time(&self) -> f64 {
        julian_day(self.clock.now_secs())
    }

    /// Current time in Julian milliseconds
    pub fn current_time_i64(&self) -> i64 {
        julian_ms(self.clock.now_secs())
    }

    /// Open a database through this VFS. The VFS must be registered.
    pub fn connect<P: AsRef<Path>>(&self, path: P) -> rusqlite::Result<rusqlite::Connection> {
        self.connect_with_flags(path, rusqlite::OpenFlags::default())
    }

    pub fn connect_with_flags<P: AsRef<Path>>(
        &self,
        path: P,
        flags: rusqlite::OpenFlags,
    ) -> rusqlite::Result<rusqlite::Connection> {
        rusqlite::Connection::open_with_flags_and_vfs(path, flags, self.name())
    }
}

impl std::fmt::Debug for DeviceVfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceVfs")
            .field("config", &self.config)
            .field("heap", &self.heap.snapshot())
            .finish()
    }
}

/// Register a VFS over `storage` with the engine
///
/// The descriptor is leaked and stays installed for the rest of the process.
pub fn register<S>(
    config: VfsConfig,
    storage: S,
) -> std::result::Result<&'static DeviceVfs, RegistrationError>
where
    S: DeviceStorage + 'static,
{
    register_with_clock(config, storage, SystemClock)
}

pub fn register_with_clock<S, C>(
    config: VfsConfig,
    storage: S,
    clock: C,
) -> std::result::Result<&'static DeviceVfs, RegistrationError>
where
    S: DeviceStorage + 'static,
    C: Clock + 'static,
{
    let vfs = DeviceVfs::with_clock(config, storage, clock)?;

    let _guard = REGISTRY.lock();
    let existing = unsafe { ffi::sqlite3_vfs_find(vfs.name.as_ptr()) };
    if !existing.is_null() {
        return Err(RegistrationError::AlreadyRegistered(vfs.name().to_string()));
    }

    let make_default = vfs.config.make_default;
    let max_pathname = vfs.config.max_pathname as c_int;
    let vfs_ptr = Box::into_raw(Box::new(vfs));

    let sqlite_vfs = Box::new(ffi::sqlite3_vfs {
        iVersion: 2,
        szOsFile: std::mem::size_of::<FileShell>() as c_int,
        mxPathname: max_pathname,
        pNext: ptr::null_mut(),
        zName: unsafe { (*vfs_ptr).name.as_ptr() },
        pAppData: vfs_ptr as *mut c_void,
        xOpen: Some(x_open),
        xDelete: Some(x_delete),
        xAccess: Some(x_access),
        xFullPathname: Some(x_full_pathname),
        xDlOpen: Some(x_dl_open),
        xDlError: Some(x_dl_error),
        xDlSym: Some(x_dl_sym),
        xDlClose: Some(x_dl_close),
        xRandomness: Some(x_randomness),
        xSleep: Some(x_sleep),
        xCurrentTime: Some(x_current_time),
        xGetLastError: Some(x_get_last_error),
        xCurrentTimeInt64: Some(x_current_time_int64),
        xSetSystemCall: None,
        xGetSystemCall: None,
        xNextSystemCall: None,
    });
    let table_ptr = Box::into_raw(sqlite_vfs);

    unsafe {
        let rc = ffi::sqlite3_vfs_register(table_ptr, c_int::from(make_default));
        if rc != ffi::SQLITE_OK {
            drop(Box::from_raw(table_ptr));
            drop(Box::from_raw(vfs_ptr));
            return Err(RegistrationError::Engine(rc));
        }
    }

    let vfs: &'static DeviceVfs = unsafe { &*vfs_ptr };
    info!(
        "registered VFS {} (journal: {:?}, default: {})",
        vfs.name(),
        vfs.config.journal,
        make_default
    );
    Ok(vfs)
}

// VFS callback functions

/// Descriptor behind an engine VFS pointer
pub(super) unsafe fn device_vfs<'a>(vfs: *mut ffi::sqlite3_vfs) -> Option<&'a DeviceVfs> {
    if vfs.is_null() {
        return None;
    }
    ((*vfs).pAppData as *const DeviceVfs).as_ref()
}

/// Engine path as UTF-8; `None` for null or undecodable names
pub(super) unsafe fn engine_path<'a>(z_name: *const c_char) -> Option<&'a str> {
    if z_name.is_null() {
        return None;
    }
    CStr::from_ptr(z_name).to_str().ok()
}

unsafe extern "C" fn x_delete(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    _sync_dir: c_int,
) -> c_int {
    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    match engine_path(z_name) {
        Some(path) => to_code(vfs.delete(path)),
        None => ffi::SQLITE_IOERR_DELETE,
    }
}

unsafe extern "C" fn x_access(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    flags: c_int,
    p_res_out: *mut c_int,
) -> c_int {
    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    let exists = match engine_path(z_name) {
        Some(path) => vfs.access(path, AccessKind::from_raw(flags)),
        None => false,
    };
    *p_res_out = c_int::from(exists);
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_full_pathname(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    n_out: c_int,
    z_out: *mut c_char,
) -> c_int {
    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    let (Some(path), Ok(n_out)) = (engine_path(z_name), usize::try_from(n_out)) else {
        return ffi::SQLITE_CANTOPEN;
    };
    if n_out == 0 {
        return ffi::SQLITE_CANTOPEN;
    }

    let full = vfs.full_path(path, n_out);
    ptr::copy_nonoverlapping(full.as_ptr(), z_out as *mut u8, full.len());
    *z_out.add(full.len()) = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_dl_open(_vfs: *mut ffi::sqlite3_vfs, _z_path: *const c_char) -> *mut c_void {
    ptr::null_mut()
}

unsafe extern "C" fn x_dl_error(_vfs: *mut ffi::sqlite3_vfs, n_byte: c_int, z_err_msg: *mut c_char) {
    if n_byte > 0 && !z_err_msg.is_null() {
        *z_err_msg = 0;
    }
}

unsafe extern "C" fn x_dl_sym(
    _vfs: *mut ffi::sqlite3_vfs,
    _handle: *mut c_void,
    _z_symbol: *const c_char,
) -> Option<unsafe extern "C" fn(*mut ffi::sqlite3_vfs, *mut c_void, *const c_char)> {
    None
}

unsafe extern "C" fn x_dl_close(_vfs: *mut ffi::sqlite3_vfs, _handle: *mut c_void) {}

unsafe extern "C" fn x_randomness(
    vfs: *mut ffi::sqlite3_vfs,
    n_byte: c_int,
    z_out: *mut c_char,
) -> c_int {
    let (Some(vfs), Ok(len)) = (device_vfs(vfs), usize::try_from(n_byte)) else {
        return ffi::SQLITE_OK;
    };
    if len > 0 && !z_out.is_null() {
        let buf = std::slice::from_raw_parts_mut(z_out as *mut u8, len);
        vfs.randomness(buf);
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_sleep(vfs: *mut ffi::sqlite3_vfs, microseconds: c_int) -> c_int {
    match device_vfs(vfs) {
        Some(vfs) => vfs.sleep(microseconds),
        None => 0,
    }
}

unsafe extern "C" fn x_current_time(vfs: *mut ffi::sqlite3_vfs, p_time_out: *mut f64) -> c_int {
    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    *p_time_out = vfs.current_time();
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_get_last_error(
    _vfs: *mut ffi::sqlite3_vfs,
    _n_byte: c_int,
    _z_err_msg: *mut c_char,
) -> c_int {
    0
}

unsafe extern "C" fn x_current_time_int64(
    vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut ffi::sqlite3_int64,
) -> c_int {
    let Some(vfs) = device_vfs(vfs) else {
        return ffi::SQLITE_ERROR;
    };
    *p_time_out = vfs.current_time_i64();
    ffi::SQLITE_OK
}
