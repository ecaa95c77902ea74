//! Storage drivers for Strata.
//!
//! A driver is the only component that touches bytes at rest. It exposes a
//! deliberately small, path-addressed surface: whole-object get/put, stat,
//! list, move, recursive delete, and streaming read/write at an offset.
//! Nothing above the driver may assume transactions or locks.
//!
//! # Path Rules
//!
//! Driver paths are absolute, `/`-separated strings. Components are
//! non-empty, never `.` or `..`, and use only `[A-Za-z0-9._:-]`.
//!
//! # Backends
//!
//! - [`InMemoryDriver`] -- `BTreeMap`-based driver for tests and embedding
//! - [`FilesystemDriver`] -- stores each path as a file under a host directory

pub mod error;
pub mod filesystem;
pub mod memory;
pub mod traits;

pub use error::{DriverError, DriverResult};
pub use filesystem::FilesystemDriver;
pub use memory::InMemoryDriver;
pub use traits::{validate_path, FileInfo, StorageDriver};
