//! SQLite-backed storage for the worker.
//!
//! This module provides persistent storage using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Named store generations holding request/response snapshots
//! - Request identity keys using SHA-256 hashing
//! - A durable key-value store that outlives generation cutover
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod generations;
pub mod hash;
pub mod kv;
pub mod migrations;
pub mod snapshots;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use snapshots::Snapshot;
pub use store::{KeyValueStore, ResourceStore};
