use async_trait::async_trait;
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ http_stream_lines, BoxError, ChatClient, LineEvent, TokenStream };
use crate::models::chat::{ ChatMessage, GenerationParams };

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct StreamResponse {
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    content: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, completion_model: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            completion_model: completion_model.into(),
        }
    }

    /// Health check against `/api/version`. Any HTTP answer counts as reachable.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(resp) => {
                info!("Ollama is running and accessible at {} (status {})", self.base_url, resp.status());
                true
            }
            Err(e) => {
                warn!("Cannot connect to Ollama at {}: {}", self.base_url, e);
                false
            }
        }
    }
}

/// Parses one NDJSON line of an `/api/chat` streaming response.
pub fn parse_stream_line(line: &str) -> Result<LineEvent, BoxError> {
    if line.trim().is_empty() {
        return Ok(LineEvent::Skip);
    }
    let resp: StreamResponse = serde_json::from_str(line)
        .map_err(|e| format!("malformed Ollama stream line: {}", e))?;
    if let Some(err) = resp.error {
        return Err(err.into());
    }
    match resp.message.and_then(|m| m.content) {
        Some(content) if !content.is_empty() => Ok(LineEvent::Token(content)),
        _ if resp.done => Ok(LineEvent::Done),
        _ => Ok(LineEvent::Skip),
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams
    ) -> Result<TokenStream, BoxError> {
        let url = format!("{}/api/chat", self.base_url);
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: true,
            options: ChatOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };
        Ok(http_stream_lines(self.http.post(&url).json(&req), parse_stream_line))
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }
}
