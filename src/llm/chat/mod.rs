pub mod ollama;
pub mod openai;
pub mod router;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use std::error::Error as StdError;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::chat::{ ChatMessage, GenerationParams };

pub use self::ollama::OllamaClient;
pub use self::openai::OpenAIChatClient;
pub use self::router::CompletionRouter;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

/// A backend able to stream a chat completion for a whole conversation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams
    ) -> Result<TokenStream, BoxError>;

    fn get_model(&self) -> String;
}

/// What a single line of a streaming HTTP body means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Token(String),
    Skip,
    Done,
}

pub type LineParser = fn(&str) -> Result<LineEvent, BoxError>;

/// Sends `request` and turns its line-oriented body into a token stream.
///
/// Lines are reassembled across network chunks before `line_parser` sees them.
/// The first error (transport, status or parse) is yielded and ends the stream.
/// Work stops as soon as the receiving side is dropped.
pub fn http_stream_lines(request: reqwest::RequestBuilder, line_parser: LineParser) -> TokenStream {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(Box::new(e) as _)).await;
                return;
            }
        };

        if let Err(e) = resp.error_for_status_ref() {
            let _ = tx.send(Err(Box::new(e) as _)).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.send(Err(Box::new(e) as _)).await;
                    return;
                }
            };
            for line in buffer.push(&chunk) {
                if !forward_line(&tx, line, line_parser).await {
                    return;
                }
            }
        }

        if let Some(rest) = buffer.finish() {
            forward_line(&tx, rest, line_parser).await;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Returns false once the stream must end.
async fn forward_line(
    tx: &mpsc::Sender<Result<String, BoxError>>,
    line: Result<String, BoxError>,
    line_parser: LineParser
) -> bool {
    let event = line.and_then(|l| line_parser(&l));
    match event {
        Ok(LineEvent::Token(tok)) => {
            if tx.send(Ok(tok)).await.is_err() {
                debug!("Token receiver dropped, stopping upstream read");
                return false;
            }
            true
        }
        Ok(LineEvent::Skip) => true,
        Ok(LineEvent::Done) => false,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, BoxError>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    fn finish(&mut self) -> Option<Result<String, BoxError>> {
        if self.pending.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> Result<String, BoxError> {
    let line = std::str::from_utf8(raw).map_err(|e| Box::new(e) as BoxError)?;
    Ok(line.trim_end_matches('\r').to_string())
}
