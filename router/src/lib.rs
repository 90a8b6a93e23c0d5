pub mod catalog;
pub mod route;
pub mod tool;

pub use catalog::{ToolCatalog, ToolMatch};
pub use route::{Routing, ScLevel, Strategy, route};
pub use tool::Tool;

pub const PACKAGE: &str = "sc-router";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EXPORTS: &[&str] = &[
    "ToolCatalog",
    "ToolMatch",
    "Tool",
    "Routing",
    "ScLevel",
    "Strategy",
    "route",
];
