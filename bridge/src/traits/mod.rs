pub mod provider;

pub use provider::{ChatMessage, ChatResponse, LLMProvider, ProviderEvent};
