use crate::traits::{ChatMessage, ChatResponse, LLMProvider};
use async_trait::async_trait;

type Callable = dyn Fn(&[ChatMessage]) -> anyhow::Result<String> + Send + Sync;

/// Adapts any function into an [`LLMProvider`]. Useful for tests, local
/// models behind an FFI call, or wrapping another client library.
pub struct CallableLLM {
    name: String,
    model: String,
    func: Box<Callable>,
}

impl CallableLLM {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: "callable".to_string(),
            model: "callable".to_string(),
            func: Box::new(func),
        }
    }

    /// Wraps a plain `prompt -> completion` function; it receives the last
    /// user message.
    pub fn from_prompt_fn<F>(func: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::new(move |messages| func(ChatMessage::last_user_content(messages)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl LLMProvider for CallableLLM {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], _temperature: f64) -> anyhow::Result<ChatResponse> {
        let text = (self.func)(messages)?;
        Ok(ChatResponse::text(text, self.model.clone()))
    }
}
