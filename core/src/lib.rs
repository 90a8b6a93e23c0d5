//! Unified entry point for the kore stack.
//!
//! Re-exports the memory layer (`kore-mind`), the LLM bridge
//! (`kore-bridge`) and the selector-complexity router (`sc-router`) under
//! one namespace, so applications depend on a single crate:
//!
//! ```ignore
//! use kore_stack::{Bridge, CallableLLM, Mind, ToolCatalog, route};
//! ```
//!
//! The re-exports are all-or-nothing: they exist only when the `mind`,
//! `bridge` and `router` features are all enabled (the default).
//! [`load_aggregator`] performs the same check at runtime.

pub mod config;
pub mod error;
pub mod factory;
pub mod namespace;

#[cfg(all(feature = "mind", feature = "bridge", feature = "router"))]
pub use kore_mind::{CacheEntry, Identity, Memory, MemoryType, Mind, Trace};

#[cfg(all(feature = "mind", feature = "bridge", feature = "router"))]
pub use kore_bridge::{
    Bridge, CallableLLM, Experiment, ExperimentResult, LLMProvider, OllamaProvider,
    RouterProvider, SCRouterProvider,
};

#[cfg(all(feature = "mind", feature = "bridge", feature = "router"))]
pub use sc_router::{Tool, ToolCatalog, route};

pub use error::StackError;
pub use namespace::{Manifest, Namespace, Subsystem, linked_manifests, load_aggregator};

pub const VERSION: &str = "0.1.0";

/// Every name the stack re-exports, grouped by subsystem.
pub const EXPORTS: [&str; 17] = [
    "Mind",
    "Memory",
    "Identity",
    "MemoryType",
    "Trace",
    "CacheEntry",
    "Bridge",
    "LLMProvider",
    "CallableLLM",
    "OllamaProvider",
    "RouterProvider",
    "SCRouterProvider",
    "Experiment",
    "ExperimentResult",
    "ToolCatalog",
    "Tool",
    "route",
];
