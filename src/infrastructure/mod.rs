//! Storage adapters implementing the domain ports.

mod checks;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
