//! Network side of the harbor worker.
//!
//! This crate provides the network seam, URL canonicalization against the
//! application origin, request classification, and the interception and
//! cache-eligibility rules shared by the worker and its hosts.

pub mod classify;
pub mod fetch;

pub use classify::{Classification, classify};
pub use fetch::{FetchClient, FetchConfig, Network, Scope, UrlError, canonicalize};
