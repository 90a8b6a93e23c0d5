use crate::traits::{ChatMessage, ChatResponse, LLMProvider, ProviderEvent};
use anyhow::anyhow;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::{Arc, Mutex};

type Selector = dyn Fn(&[ChatMessage]) -> Option<String> + Send + Sync;

struct Route {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

/// Dispatches each request to one of several named providers.
///
/// The selector picks a route by name; when it returns `None` or an unknown
/// name the default route (the first one added, unless overridden) is used.
/// If the chosen provider fails, the remaining routes are tried in order.
pub struct RouterProvider {
    routes: Vec<Route>,
    default: Option<String>,
    selector: Box<Selector>,
    last_route: Mutex<Option<String>>,
}

impl RouterProvider {
    pub fn new<F>(selector: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            routes: Vec::new(),
            default: None,
            selector: Box::new(selector),
            last_route: Mutex::new(None),
        }
    }

    /// A router that always prefers the default route and only moves on
    /// when it fails.
    pub fn failover() -> Self {
        Self::new(|_| None)
    }

    pub fn route(mut self, name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        let name = name.into();
        self.routes.retain(|r| r.name != name);
        self.routes.push(Route { name, provider });
        self
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }

    /// Name of the route that served the most recent successful request.
    pub fn last_route(&self) -> Option<String> {
        self.last_route.lock().ok().and_then(|r| r.clone())
    }

    fn default_route(&self) -> Option<&Route> {
        self.default
            .as_deref()
            .and_then(|name| self.routes.iter().find(|r| r.name == name))
            .or_else(|| self.routes.first())
    }

    /// Routes in the order they should be attempted.
    fn candidates(&self, messages: &[ChatMessage]) -> Vec<&Route> {
        let selected = (self.selector)(messages)
            .and_then(|name| self.routes.iter().find(|r| r.name == name));

        let mut ordered: Vec<&Route> = Vec::with_capacity(self.routes.len());
        for route in selected
            .into_iter()
            .chain(self.default_route())
            .chain(self.routes.iter())
        {
            if !ordered.iter().any(|r| r.name == route.name) {
                ordered.push(route);
            }
        }
        ordered
    }

    fn remember(&self, name: &str) {
        if let Ok(mut last) = self.last_route.lock() {
            *last = Some(name.to_string());
        }
    }
}

#[async_trait]
impl LLMProvider for RouterProvider {
    fn name(&self) -> &str {
        "router"
    }

    fn model(&self) -> &str {
        self.default_route().map(|r| r.provider.model()).unwrap_or("")
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: f64) -> anyhow::Result<ChatResponse> {
        let mut last_error = None;

        for route in self.candidates(messages) {
            match route.provider.chat(messages, temperature).await {
                Ok(response) => {
                    tracing::debug!(route = %route.name, "Request routed");
                    self.remember(&route.name);
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(route = %route.name, "Route failed, trying next: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("RouterProvider has no routes")))
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let mut last_error = None;

        for route in self.candidates(messages) {
            match route.provider.chat_stream(messages, temperature).await {
                Ok(stream) => {
                    self.remember(&route.name);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::warn!(route = %route.name, "Route failed, trying next: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("RouterProvider has no routes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CallableLLM;

    fn named(reply: &'static str) -> Arc<dyn LLMProvider> {
        Arc::new(CallableLLM::new(move |_| Ok(reply.to_string())).with_model(reply))
    }

    fn failing() -> Arc<dyn LLMProvider> {
        Arc::new(CallableLLM::new(|_| Err(anyhow!("down"))))
    }

    #[tokio::test]
    async fn selector_picks_route() {
        let router = RouterProvider::new(|messages| {
            ChatMessage::last_user_content(messages)
                .contains("code")
                .then(|| "coder".to_string())
        })
        .route("general", named("general"))
        .route("coder", named("coder"));

        let reply = router.chat(&[ChatMessage::user("write code")], 0.0).await.unwrap();
        assert_eq!(reply.text, "coder");
        assert_eq!(router.last_route().as_deref(), Some("coder"));

        let reply = router.chat(&[ChatMessage::user("hello")], 0.0).await.unwrap();
        assert_eq!(reply.text, "general");
    }

    #[tokio::test]
    async fn unknown_selection_uses_default() {
        let router = RouterProvider::new(|_| Some("missing".into()))
            .route("a", named("a"))
            .route("b", named("b"))
            .with_default("b");
        assert_eq!(router.model(), "b");
        let reply = router.chat(&[ChatMessage::user("x")], 0.0).await.unwrap();
        assert_eq!(reply.text, "b");
    }

    #[tokio::test]
    async fn fails_over_to_next_route() {
        let router = RouterProvider::failover()
            .route("primary", failing())
            .route("backup", named("backup"));
        let reply = router.chat(&[ChatMessage::user("x")], 0.0).await.unwrap();
        assert_eq!(reply.text, "backup");
        assert_eq!(router.last_route().as_deref(), Some("backup"));
    }

    #[tokio::test]
    async fn all_routes_failing_returns_last_error() {
        let router = RouterProvider::failover().route("only", failing());
        let err = router.chat(&[ChatMessage::user("x")], 0.0).await.unwrap_err();
        assert_eq!(err.to_string(), "down");

        let empty = RouterProvider::failover();
        assert!(empty.chat(&[ChatMessage::user("x")], 0.0).await.is_err());
    }
}
