pub mod bridge;
pub mod experiment;
pub mod providers;
pub mod rate_limit;
pub mod traits;

pub use bridge::{Bridge, BridgeConfig};
pub use experiment::{Experiment, ExperimentResult, VariantStats};
pub use providers::{CallableLLM, OllamaProvider, RouterProvider, SCRouterProvider};
pub use rate_limit::RateLimiter;
pub use traits::{ChatMessage, ChatResponse, LLMProvider, ProviderEvent};

pub const PACKAGE: &str = "kore-bridge";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EXPORTS: &[&str] = &[
    "Bridge",
    "BridgeConfig",
    "LLMProvider",
    "CallableLLM",
    "OllamaProvider",
    "RouterProvider",
    "SCRouterProvider",
    "Experiment",
    "ExperimentResult",
    "VariantStats",
    "RateLimiter",
    "ChatMessage",
    "ChatResponse",
    "ProviderEvent",
];
