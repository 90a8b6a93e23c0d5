//! Persistent memory and emergent identity.

mod cache;
mod keywords;
pub mod mind;
pub mod types;

pub use mind::Mind;
pub use types::{CacheEntry, CacheStats, Identity, Memory, MemoryType, Trace};

pub const PACKAGE: &str = "kore-mind";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Public names this crate exports at its root.
pub const EXPORTS: &[&str] = &[
    "Mind",
    "Memory",
    "Identity",
    "MemoryType",
    "Trace",
    "CacheEntry",
    "CacheStats",
];
