//! # flashvfs - SQLite VFS for flash devices
//!
//! `flashvfs` lets the embedded SQLite engine run on a device whose storage is
//! only reachable through a small file API (open/read/write/seek/size/stat/
//! remove/flush). The device side is the [`DeviceStorage`] trait; the engine
//! side is a registered `sqlite3_vfs`.
//!
//! Features:
//!
//! - **Direct I/O** for database files, one device call per engine call
//! - **Memory journal** keeping the rollback journal off the wear-limited medium
//! - **Sector write-cache** staging journal writes per flash sector
//! - **Heap accounting** with an optional limit matching the device's heap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flashvfs::{register, HostStorage, JournalMode, VfsConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VfsConfig::default().with_journal(JournalMode::SectorCached);
//! let vfs = register(config, HostStorage::new("/tmp/flash"))?;
//!
//! let conn = vfs.connect("/data.db")?;
//! conn.execute_batch("CREATE TABLE readings (t INTEGER, v REAL)")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! name = "flash"
//! journal = "memory"      # direct | memory | sector-cached
//! journal_pages = 8
//! page_size = 1024
//! sector_size = 4096
//! coalesce = true
//! heap_limit = 32768
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod flags;
pub mod handle;
pub mod heap;
pub mod port;
pub mod strategy;
pub mod vfs;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{JournalMode, VfsConfig};
pub use error::{ConfigError, DeviceError, IoErrorKind, RegistrationError, Result, VfsError};
pub use flags::{AccessKind, OpenFlags};
pub use handle::FileHandle;
pub use heap::HeapSnapshot;
pub use port::{DeviceStorage, FaultPlan, HostStorage, MemStorage};
pub use strategy::StrategyKind;
pub use vfs::{register, register_with_clock, DeviceVfs};
