//! Request identity keys for store generations.

use sha2::{Digest, Sha256};

/// Compute the identity key of a request inside a store generation.
///
/// The URL is expected to be normalized already (fragment removed); the
/// method is upper-cased here so `get` and `GET` collapse to one entry.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.trim().to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
