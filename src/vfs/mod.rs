//! SQLite VFS over a device storage port
//!
//! [`DeviceVfs`] is the safe surface of every `sqlite3_vfs` entry point. Once
//! [`register`]ed it is leaked together with its engine table and stays
//! installed for the life of the process.

mod file;
#[allow(clippy::module_inception)]
mod vfs;


pub use vfs::{register, register_with_clock, DeviceVfs};
