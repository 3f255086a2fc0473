//! Store maintenance tools.

pub mod cleanup;
pub mod generations;

pub use cleanup::{CleanupCacheParams, cleanup_impl};
pub use generations::generations_impl;
