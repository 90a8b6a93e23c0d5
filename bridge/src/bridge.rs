use crate::rate_limit::RateLimiter;
use crate::traits::{ChatMessage, LLMProvider, ProviderEvent};
use anyhow::Result;
use futures_util::stream::BoxStream;
use kore_mind::{Identity, Mind, MemoryType};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;

const BASE_SYSTEM_PROMPT: &str =
    "You are a helpful assistant with a persistent memory. Use what you remember when it is relevant.";
const EXCHANGE_SALIENCE: f64 = 0.4;
const REFLECT_MEMORIES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub temperature: f64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Calls per minute; `None` disables rate limiting.
    pub rate_limit_per_minute: Option<u32>,
    pub recall_limit: usize,
    /// Store every prompt/answer pair as an episodic memory.
    pub remember_exchanges: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            cache_enabled: true,
            cache_ttl_secs: 3600,
            cache_max_entries: 1000,
            rate_limit_per_minute: None,
            recall_limit: 5,
            remember_exchanges: true,
        }
    }
}

/// Connects a [`Mind`] to an LLM: prompts are enriched with identity and
/// recalled memories, responses are cached in the mind, calls are rate
/// limited, and exchanges become new memories.
pub struct Bridge {
    mind: Arc<Mind>,
    provider: Arc<dyn LLMProvider>,
    config: BridgeConfig,
    limiter: Option<RateLimiter>,
}

impl Bridge {
    pub fn new(mind: Arc<Mind>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            mind,
            provider,
            config: BridgeConfig::default(),
            limiter: None,
        }
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.limiter = config
            .rate_limit_per_minute
            .filter(|n| *n > 0)
            .map(RateLimiter::per_minute);
        self.config = config;
        self
    }

    pub fn mind(&self) -> &Arc<Mind> {
        &self.mind
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// System prompt carrying identity and the memories relevant to `prompt`.
    pub fn build_system_prompt(&self, prompt: &str) -> Result<String> {
        let mut system = BASE_SYSTEM_PROMPT.to_string();

        if let Some(identity) = self.mind.identity()? {
            system.push_str("\n\n");
            system.push_str(&identity.to_prompt());
        }

        let recalled = self.mind.recall(prompt, self.config.recall_limit)?;
        if !recalled.is_empty() {
            system.push_str("\n\n## Relevant Memory\n");
            for (memory, _) in &recalled {
                let _ = write!(system, "\n- [{}] {}", memory.memory_type, memory.content);
            }
        }

        Ok(system)
    }

    pub fn build_messages(&self, prompt: &str) -> Result<Vec<ChatMessage>> {
        Ok(vec![
            ChatMessage::system(self.build_system_prompt(prompt)?),
            ChatMessage::user(prompt),
        ])
    }

    async fn throttle(&self) -> Result<()> {
        match &self.limiter {
            Some(limiter) => limiter.acquire().await,
            None => Ok(()),
        }
    }

    /// Answers `prompt`, serving repeated prompts from the cache.
    pub async fn think(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("Prompt is empty");
        }

        let cache_key = Mind::cache_key(self.provider.model(), None, prompt);
        if self.config.cache_enabled
            && let Some(entry) = self.mind.cache_get(&cache_key, self.cache_ttl())?
        {
            tracing::debug!(hits = entry.hit_count, "Cache hit");
            self.mind.trace("cache_hit", &cache_key)?;
            return Ok(entry.response);
        }

        let messages = self.build_messages(prompt)?;
        self.throttle().await?;

        let started = Instant::now();
        let response = self
            .provider
            .chat(&messages, self.config.temperature)
            .await?;
        let elapsed_ms = started.elapsed().as_millis();

        tracing::info!(
            provider = self.provider.name(),
            model = %response.model,
            elapsed_ms = elapsed_ms as u64,
            tokens = ?response.total_tokens(),
            "LLM call completed"
        );
        self.mind.trace(
            "llm_call",
            &format!("{} {} {}ms", self.provider.name(), response.model, elapsed_ms),
        )?;

        if self.config.cache_enabled {
            self.mind
                .cache_put(&cache_key, self.provider.model(), &response.text)?;
            self.mind.cache_evict(self.config.cache_max_entries)?;
        }

        if self.config.remember_exchanges {
            self.mind.experience_with(
                &format!("User asked: {}\nI answered: {}", prompt, response.text),
                MemoryType::Episodic,
                Some(self.provider.name()),
                EXCHANGE_SALIENCE,
                &[],
            )?;
        }

        Ok(response.text)
    }

    /// Streams an answer. Streaming bypasses the cache and is not remembered.
    pub async fn think_stream(&self, prompt: &str) -> Result<BoxStream<'static, ProviderEvent>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("Prompt is empty");
        }

        let messages = self.build_messages(prompt)?;
        self.throttle().await?;
        self.mind.trace("llm_stream", self.provider.name())?;
        self.provider
            .chat_stream(&messages, self.config.temperature)
            .await
    }

    /// Refreshes identity. The LLM writes the summary from the strongest
    /// memories; if it fails the keyword-derived identity is kept.
    pub async fn reflect(&self) -> Result<Identity> {
        let mut identity = self.mind.reflect()?;
        if identity.memory_count == 0 {
            return Ok(identity);
        }

        let now = chrono::Utc::now();
        let mut memories = self.mind.memories(None)?;
        memories.sort_by(|a, b| b.strength(now).total_cmp(&a.strength(now)));
        memories.truncate(REFLECT_MEMORIES);

        let mut listing = String::new();
        for memory in &memories {
            let _ = writeln!(listing, "- [{}] {}", memory.memory_type, memory.content);
        }

        let messages = [
            ChatMessage::system(
                "You distill memories into a self-description. Answer with two or three sentences in the first person, no preamble.",
            ),
            ChatMessage::user(format!(
                "Memories:\n{}\nRecurring themes: {}\n\nWho are you?",
                listing,
                identity.traits.join(", ")
            )),
        ];

        self.throttle().await?;
        match self.provider.chat(&messages, self.config.temperature).await {
            Ok(response) if !response.text.trim().is_empty() => {
                identity.summary = response.text.trim().to_string();
                self.mind.set_identity(&identity)?;
                self.mind.trace("reflect", "identity written by llm")?;
            }
            Ok(_) => tracing::warn!("Empty reflection from provider, keeping derived identity"),
            Err(e) => tracing::warn!("Reflection failed, keeping derived identity: {}", e),
        }

        Ok(identity)
    }

    fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.config.cache_ttl_secs).unwrap_or(i64::MAX))
    }
}
