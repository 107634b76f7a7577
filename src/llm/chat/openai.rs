use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_lines, BoxError, ChatClient, LineEvent, TokenStream };
use crate::models::chat::{ ChatMessage, GenerationParams };

/// Streaming client for OpenAI-compatible chat completion APIs (OpenRouter).
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIStreamError>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: Option<OpenAIDelta>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamError {
    message: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: &str,
        model: impl Into<String>,
        base_url: impl Into<String>
    ) -> Result<Self, BoxError> {
        if api_key.trim().is_empty() {
            return Err("API key is required".into());
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as BoxError)?;

        Ok(Self {
            http,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Parses one server-sent-events line of a streaming chat completion.
pub fn parse_sse_line(line: &str) -> Result<LineEvent, BoxError> {
    let Some(data) = line.strip_prefix("data:") else {
        // blank separators, `: keep-alive` comments, `event:`/`id:` fields
        return Ok(LineEvent::Skip);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(LineEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let chunk: OpenAIStreamResponse = serde_json::from_str(data)
        .map_err(|e| format!("malformed completion chunk: {}", e))?;
    if let Some(err) = chunk.error {
        return Err(err.message.into());
    }
    let content = chunk.choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty());
    Ok(content.map(LineEvent::Token).unwrap_or(LineEvent::Skip))
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams
    ) -> Result<TokenStream, BoxError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: true,
        };
        Ok(http_stream_lines(self.http.post(&url).json(&req), parse_sse_line))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
