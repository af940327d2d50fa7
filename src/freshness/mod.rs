//! Freshness detection: mtime for task outputs, blake3 for the script cache.

mod hash;
pub mod mtime;

pub use hash::{ContentHash, Fingerprint};
pub use mtime::is_fresh;
