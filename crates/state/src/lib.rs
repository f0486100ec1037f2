//! Persistence primitives shared by the repopicks crates.
//!
//! This crate provides:
//! - Home and data directory resolution with environment overrides.
//! - The [`KvStore`] abstraction (get/set/delete with a time-to-live).
//! - An in-memory store for tests and one-shot runs, and a JSON-file store
//!   that survives across CLI invocations.

pub mod env;
mod file;
mod memory;
mod store;

pub use env::{config_file, data_dir, default_cache_file, home_dir};
pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use store::{KvStore, StoreError};
