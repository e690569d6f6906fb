//! Ollama-backed annotator.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::types::PipelineError;

use super::{split_keywords, Annotator};

const CONTEXT_SYSTEM_PROMPT: &str = "You are an assistant that extracts key information. \
Your task is to pull the most important keywords and phrases out of a text. \
Keep the answer short: at most 2-3 sentences or a keyword list. \
Focus on names, technical terms, dates, figures, and key concepts.";

const KEYWORD_SYSTEM_PROMPT: &str = "You are a helpful assistant for extracting keywords \
from text. Return ONLY a comma-separated list of keywords, nothing else.";

/// Connection settings for the Ollama chat endpoint.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub host: Url,
    pub model: String,
    /// Request timeout; generous by default since CPU inference is slow.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: usize,
}

impl OllamaConfig {
    pub fn new(host: Url, model: impl Into<String>) -> Self {
        Self {
            host,
            model: model.into(),
            timeout: Duration::from_secs(600),
            retries: 2,
        }
    }

    /// Reads `OLLAMA_HOST` (default `http://localhost:11434`) and
    /// `OLLAMA_MODEL` (default `llama3.2`).
    pub fn from_env() -> Result<Self, PipelineError> {
        let host = std::env::var("OLLAMA_HOST")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let host = Url::parse(&host)
            .map_err(|err| PipelineError::Annotation(format!("invalid OLLAMA_HOST: {err}")))?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Ok(Self::new(host, model))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }
}

/// Result of probing the Ollama server.
#[derive(Clone, Debug, Serialize)]
pub struct OllamaHealth {
    pub reachable: bool,
    pub models: Vec<String>,
}

/// Annotator that calls a local Ollama instance over its chat API.
#[derive(Clone)]
pub struct OllamaAnnotator {
    client: Client,
    config: OllamaConfig,
}

impl OllamaAnnotator {
    pub fn new(config: OllamaConfig) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Checks whether the server is reachable and which models it serves.
    pub async fn health(&self) -> OllamaHealth {
        let url = match self.config.host.join("api/tags") {
            Ok(url) => url,
            Err(_) => return OllamaHealth { reachable: false, models: Vec::new() },
        };
        match self.client.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => {
                    let tags: TagsResponse = response.json().await.unwrap_or_default();
                    OllamaHealth {
                        reachable: true,
                        models: tags.models.into_iter().map(|m| m.name).collect(),
                    }
                }
                Err(err) => {
                    warn!(error = %err, "ollama health probe rejected");
                    OllamaHealth { reachable: false, models: Vec::new() }
                }
            },
            Err(err) => {
                warn!(error = %err, "ollama unreachable");
                OllamaHealth { reachable: false, models: Vec::new() }
            }
        }
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, PipelineError> {
        let url = self
            .config
            .host
            .join("api/chat")
            .map_err(|err| PipelineError::Annotation(err.to_string()))?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            stream: false,
            // Keep the model resident between chunk annotations.
            keep_alive: "10m",
        };

        let mut last_error = String::new();
        for attempt in 0..=self.config.retries {
            debug!(
                model = %self.config.model,
                attempt = attempt + 1,
                "ollama chat request"
            );
            match self.client.post(url.clone()).json(&request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let reply: ChatResponse = response.json().await?;
                        let content = reply.message.content.trim().to_string();
                        info!(chars = content.len(), "ollama reply received");
                        return Ok(content);
                    }
                    let body = response.text().await.unwrap_or_default();
                    // Status errors (model missing, bad request) are not
                    // transient; fail without retrying.
                    return Err(PipelineError::Annotation(format!(
                        "ollama returned {status}: {body}"
                    )));
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(error = %last_error, attempt = attempt + 1, "ollama request failed");
                }
            }
            if attempt < self.config.retries {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
        Err(PipelineError::Annotation(last_error))
    }
}

#[async_trait::async_trait]
impl Annotator for OllamaAnnotator {
    async fn generate_context(&self, text: &str) -> Result<String, PipelineError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let prompt = format!(
            "Extract the key information from the section below. \
             Give only the most important keywords and phrases (max 2-3 sentences):\n\n{text}"
        );
        self.chat(CONTEXT_SYSTEM_PROMPT, prompt).await
    }

    async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let prompt = format!(
            "Extract the 5-10 most important keywords from the text below:\n\n{text}"
        );
        let reply = self.chat(KEYWORD_SYSTEM_PROMPT, prompt).await?;
        let keywords = split_keywords(&reply);
        debug!(count = keywords.len(), "generated keywords");
        Ok(keywords)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    keep_alive: &'a str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatReplyMessage,
}

#[derive(Default, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Default, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}
