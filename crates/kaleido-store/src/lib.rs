//! Kaleido Store - persistence and coordination capabilities
//!
//! Three capabilities, each with hosted, in-process and null backends:
//! - [`BlobStore`]: generated documents, metadata and images
//! - [`KvStore`]: runtime settings, latest pointers and history
//! - [`LeaseStore`] / [`RateCounter`]: cross-instance locking and rate limits

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod blob;
pub mod error;
pub mod kv;
pub mod lease;
pub mod redis_store;

pub use blob::{BlobEntry, BlobStore, MemoryBlobStore, NullBlobStore, VercelBlobConfig, VercelBlobStore};
pub use error::StoreError;
pub use kv::{
    EdgeConfigSettings, EdgeConfigStore, KvOp, KvStore, LayeredKvStore, LocalFileStore,
    MemoryKvStore,
};
pub use lease::{
    minute_key, with_lease, Lease, LeaseError, LeasePolicy, LeaseStore, MemoryLeaseStore,
    NoopLeaseStore, RateCounter,
};
pub use redis_store::RedisLeaseStore;
