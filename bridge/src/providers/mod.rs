pub mod callable;
pub mod ollama;
pub mod router;
pub mod sc_router;

pub use callable::CallableLLM;
pub use ollama::OllamaProvider;
pub use router::RouterProvider;
pub use sc_router::SCRouterProvider;
