//! Adapters for the domain ports: in-memory stores, RocksDB stores behind the
//! `storage-rocksdb` feature, the activity log and mailers.

pub mod activity_log;
pub mod in_memory;
pub mod mailer;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
