//! # ntmul-storage
//!
//! Element storage for the `ntmul` workspace.
//!
//! A [`DataStorage`] is a sequence of `u64` elements kept either in memory or in
//! a block-cached scratch file. Algorithms never touch the backing directly; they
//! lease a window of it through an [`ArrayAccess`] (or a [`JointAccess`] spanning
//! three storages) and release it when done.
#![warn(missing_docs)]

pub mod access;
pub mod block_cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod file;
pub mod stats;
pub mod storage;

// Re-exports
pub use access::{AccessMode, ArrayAccess, JointAccess};
pub use config::StorageConfig;
pub use error::StorageError;
pub use factory::StorageFactory;
pub use storage::{DataStorage, MAX_STORAGE_LEN};
