use crate::traits::{ChatMessage, ChatResponse, LLMProvider, ProviderEvent};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sc_router::{Routing, ScLevel, ToolCatalog};
use std::sync::{Arc, Mutex};

/// Sends simple queries to a cheap model and hard ones to a strong model,
/// judging difficulty by the selector complexity of the last user message
/// against a tool catalog.
pub struct SCRouterProvider {
    catalog: ToolCatalog,
    simple: Arc<dyn LLMProvider>,
    complex: Arc<dyn LLMProvider>,
    threshold: ScLevel,
    last_routing: Mutex<Option<Routing>>,
}

impl SCRouterProvider {
    pub fn new(
        catalog: ToolCatalog,
        simple: Arc<dyn LLMProvider>,
        complex: Arc<dyn LLMProvider>,
    ) -> Self {
        Self {
            catalog,
            simple,
            complex,
            threshold: ScLevel::Sc2,
            last_routing: Mutex::new(None),
        }
    }

    /// Queries at or above `threshold` go to the complex provider.
    pub fn with_threshold(mut self, threshold: ScLevel) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn last_routing(&self) -> Option<Routing> {
        self.last_routing.lock().ok().and_then(|r| r.clone())
    }

    fn select(&self, messages: &[ChatMessage]) -> &Arc<dyn LLMProvider> {
        let routing = sc_router::route(ChatMessage::last_user_content(messages), &self.catalog);
        let provider = if routing.level >= self.threshold {
            &self.complex
        } else {
            &self.simple
        };

        tracing::debug!(
            level = %routing.level,
            strategy = %routing.strategy,
            provider = provider.name(),
            model = provider.model(),
            "SC routing decision"
        );

        if let Ok(mut last) = self.last_routing.lock() {
            *last = Some(routing);
        }
        provider
    }
}

#[async_trait]
impl LLMProvider for SCRouterProvider {
    fn name(&self) -> &str {
        "sc-router"
    }

    fn model(&self) -> &str {
        self.simple.model()
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: f64) -> anyhow::Result<ChatResponse> {
        let provider = self.select(messages);
        provider.chat(messages, temperature).await
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let provider = self.select(messages);
        provider.chat_stream(messages, temperature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CallableLLM;
    use sc_router::Tool;

    fn provider() -> SCRouterProvider {
        let catalog = ToolCatalog::new()
            .with_tool(Tool::new("calculator", "Arithmetic").with_keywords(["add", "multiply"]))
            .with_tool(Tool::new("weather", "Forecast").with_keywords(["rain"]));
        SCRouterProvider::new(
            catalog,
            Arc::new(CallableLLM::new(|_| Ok("small".into())).with_model("small-1b")),
            Arc::new(CallableLLM::new(|_| Ok("large".into())).with_model("large-70b")),
        )
    }

    #[tokio::test]
    async fn simple_query_uses_simple_provider() {
        let router = provider();
        let reply = router
            .chat(&[ChatMessage::user("multiply 6 by 7")], 0.0)
            .await
            .unwrap();
        assert_eq!(reply.text, "small");
        assert_eq!(router.last_routing().unwrap().level, ScLevel::Sc0);
    }

    #[tokio::test]
    async fn open_ended_query_uses_complex_provider() {
        let router = provider();
        let reply = router
            .chat(&[ChatMessage::user("Design a migration plan for our database")], 0.0)
            .await
            .unwrap();
        assert_eq!(reply.text, "large");
        assert_eq!(router.last_routing().unwrap().level, ScLevel::Sc3);
    }

    #[tokio::test]
    async fn threshold_is_configurable() {
        let router = provider().with_threshold(ScLevel::Sc0);
        let reply = router
            .chat(&[ChatMessage::user("will it rain")], 0.0)
            .await
            .unwrap();
        assert_eq!(reply.text, "large");
        assert_eq!(router.model(), "small-1b");
    }
}
