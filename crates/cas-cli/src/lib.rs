//! Command line interface for the cas artifact cache.
//!
//! The commands are plain structs with their storage and backend injected,
//! so tests drive them against in-memory implementations exactly as the
//! binary drives them against the filesystem and a real object store.

pub mod cli;
pub mod commands;
pub mod trace;
