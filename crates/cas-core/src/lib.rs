//! Core types for the cas artifact cache.
//!
//! This crate holds the pieces every other crate builds on:
//! - The shared [`Error`]/[`Result`] types
//! - The fingerprinting pipeline ([`hashing`])
//! - The local-storage capability traits ([`storage`])
//!
//! Implementations of the storage traits live in `cas-storage`; the remote
//! backend protocol lives in `cas-backend`.

mod error;
pub mod hashing;
pub mod storage;

pub use error::{Error, Result};
pub use hashing::{Algorithm, HashOutput, Hasher};
pub use storage::{ReadableStorage, Storage, WritableStorage, base_name, join_path, parent_dir};
