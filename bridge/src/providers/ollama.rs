use crate::traits::{ChatMessage, ChatResponse, LLMProvider, ProviderEvent};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models installed on the Ollama server.
    pub async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error ({}): {}", status, error_text));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    pub async fn is_available(&self) -> bool {
        self.list_models().await.is_ok()
    }

    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        stream: bool,
    ) -> anyhow::Result<reqwest::Response> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            options: OllamaOptions { temperature },
            stream,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Ollama API error ({}): {}",
                status,
                error_text
            ));
        }

        Ok(response)
    }

    fn parse_stream_line(line: &str) -> Option<ProviderEvent> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        let response = serde_json::from_str::<StreamResponse>(line).ok()?;
        if let Some(message) = response.message {
            if let Some(content) = message.content
                && !content.is_empty()
            {
                return Some(ProviderEvent::Token(content));
            }

            if let Some(thinking) = message.thinking
                && !thinking.is_empty()
            {
                return Some(ProviderEvent::Thinking(thinking));
            }
        }

        response.done.then_some(ProviderEvent::Done)
    }

    /// Sends one NDJSON line on. Returns false once the stream is finished or
    /// the receiver is gone.
    async fn forward_line(line: &[u8], tx: &mpsc::Sender<ProviderEvent>) -> bool {
        match Self::parse_stream_line(&String::from_utf8_lossy(line)) {
            Some(ProviderEvent::Done) => {
                let _ = tx.send(ProviderEvent::Done).await;
                false
            }
            Some(event) => tx.send(event).await.is_ok(),
            None => true,
        }
    }

    /// Splits raw response bytes into lines. Chunks are buffered as bytes so
    /// a character split across two chunks is decoded whole.
    async fn forward_stream<S, B, E>(stream: S, tx: mpsc::Sender<ProviderEvent>)
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]> + Send,
        E: std::fmt::Display + Send,
    {
        let mut stream = std::pin::pin!(stream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.extend_from_slice(chunk.as_ref());

                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        if !Self::forward_line(&line, &tx).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!("Ollama stream interrupted: {}", message);
                    let _ = tx.send(ProviderEvent::Error(message)).await;
                    return;
                }
            }
        }

        if !buffer.is_empty() && !Self::forward_line(&buffer, &tx).await {
            return;
        }
        let _ = tx.send(ProviderEvent::Done).await;
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: f64) -> anyhow::Result<ChatResponse> {
        let response = self.post_chat(messages, temperature, false).await?;
        let ollama_response: OllamaResponse = response.json().await?;

        let text = match ollama_response.message.content {
            Some(content) if !content.is_empty() => content,
            _ => ollama_response.message.thinking.unwrap_or_default(),
        };

        if text.is_empty() {
            anyhow::bail!("Empty response from Ollama model {}", self.model);
        }

        Ok(ChatResponse {
            text,
            model: ollama_response.model.unwrap_or_else(|| self.model.clone()),
            prompt_tokens: ollama_response.prompt_eval_count,
            completion_tokens: ollama_response.eval_count,
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let response = self.post_chat(messages, temperature, true).await?;

        let (tx, rx) = mpsc::channel::<ProviderEvent>(256);
        tokio::spawn(Self::forward_stream(response.bytes_stream(), tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_trims_base_url() {
        let provider = OllamaProvider::new()
            .with_base_url("http://gpu-box:11434/")
            .with_model("qwen2.5");
        assert_eq!(provider.base_url(), "http://gpu-box:11434");
        assert_eq!(provider.model(), "qwen2.5");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn request_serializes_messages_verbatim() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = OllamaRequest {
            model: "llama3.2",
            messages: &messages,
            options: OllamaOptions { temperature: 0.2 },
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["options"]["temperature"], 0.2);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn parses_stream_lines() {
        assert_eq!(
            OllamaProvider::parse_stream_line(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#),
            Some(ProviderEvent::Token("Hel".into()))
        );
        assert_eq!(
            OllamaProvider::parse_stream_line(r#"{"message":{"role":"assistant","content":"","thinking":"hmm"},"done":false}"#),
            Some(ProviderEvent::Thinking("hmm".into()))
        );
        assert_eq!(
            OllamaProvider::parse_stream_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#),
            Some(ProviderEvent::Done)
        );
        assert_eq!(OllamaProvider::parse_stream_line("   "), None);
        assert_eq!(OllamaProvider::parse_stream_line("not json"), None);
    }

    async fn forwarded(chunks: Vec<Result<Vec<u8>, String>>) -> Vec<ProviderEvent> {
        let (tx, rx) = mpsc::channel(16);
        OllamaProvider::forward_stream(futures_util::stream::iter(chunks), tx).await;
        ReceiverStream::new(rx).collect().await
    }

    #[tokio::test]
    async fn stream_keeps_characters_split_across_chunks() {
        let body = "{\"message\":{\"content\":\"café\"}}\n{\"done\":true}\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let events = forwarded(vec![Ok(body[..split].to_vec()), Ok(body[split..].to_vec())]).await;
        assert_eq!(
            events,
            vec![ProviderEvent::Token("café".into()), ProviderEvent::Done]
        );
    }

    #[tokio::test]
    async fn stream_parses_trailing_line_without_newline() {
        let events = forwarded(vec![
            Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
            Ok(b"{\"message\":{\"content\":\"b\"}}".to_vec()),
        ])
        .await;
        assert_eq!(
            events,
            vec![
                ProviderEvent::Token("a".into()),
                ProviderEvent::Token("b".into()),
                ProviderEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn interrupted_stream_ends_with_error() {
        let events = forwarded(vec![
            Ok(b"{\"message\":{\"content\":\"par\"}}\n".to_vec()),
            Err("connection reset".to_string()),
        ])
        .await;
        assert_eq!(
            events,
            vec![
                ProviderEvent::Token("par".into()),
                ProviderEvent::Error("connection reset".into())
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let provider = OllamaProvider::new().with_base_url("http://127.0.0.1:9");
        assert!(!provider.is_available().await);
        assert!(provider.chat(&[ChatMessage::user("hi")], 0.0).await.is_err());
    }
}
