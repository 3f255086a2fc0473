//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Request/response shapes and stored response snapshots
//! - Versioned store generations and a durable key-value store on SQLite
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, KeyValueStore, ResourceStore, Snapshot};
pub use config::AppConfig;
pub use error::Error;
pub use request::{Destination, Request, RequestMode, Response, ResponseType};
