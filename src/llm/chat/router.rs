use futures::{ stream, StreamExt };
use log::{ debug, error, info };
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::ChatClient;
use crate::llm::BackendKind;
use crate::models::chat::{ ChatMessage, GenerationParams };
use crate::models::stream::{ Fragment, FragmentStream };

pub const NO_BACKEND_MESSAGE: &str = "❌ No AI service is available.";

/// Routes completions to the backend chosen at startup.
///
/// Streams produced here always terminate cleanly: backend failures are
/// turned into a single trailing `Fragment::Error`.
#[derive(Clone)]
pub struct CompletionRouter {
    active: Option<(BackendKind, Arc<dyn ChatClient>)>,
}

impl CompletionRouter {
    pub fn new(kind: BackendKind, client: Arc<dyn ChatClient>) -> Self {
        Self { active: Some((kind, client)) }
    }

    pub fn unavailable() -> Self {
        Self { active: None }
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active.as_ref().map(|(kind, _)| *kind)
    }

    pub fn stream_completion(
        &self,
        conversation: Vec<ChatMessage>,
        params: GenerationParams
    ) -> FragmentStream {
        let Some((kind, client)) = self.active.clone() else {
            return Box::pin(stream::once(async { Fragment::Error(NO_BACKEND_MESSAGE.to_string()) }));
        };

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            debug!(
                "Streaming {} messages to {} (model {})",
                conversation.len(),
                kind,
                client.get_model()
            );
            let mut tokens = match client.stream_chat(&conversation, params).await {
                Ok(s) => s,
                Err(e) => {
                    error!("{} error: {}", kind.display_name(), e);
                    let _ = tx.send(backend_error(kind, &e)).await;
                    return;
                }
            };

            let mut emitted = 0usize;
            while let Some(item) = tokens.next().await {
                match item {
                    Ok(token) if token.is_empty() => {}
                    Ok(token) => {
                        if tx.send(Fragment::Text(token)).await.is_err() {
                            info!("Client stopped reading after {} fragments, abandoning {} stream", emitted, kind);
                            return;
                        }
                        emitted += 1;
                    }
                    Err(e) => {
                        error!("{} error after {} fragments: {}", kind.display_name(), emitted, e);
                        let _ = tx.send(backend_error(kind, &e)).await;
                        return;
                    }
                }
            }
            debug!("{} stream finished with {} fragments", kind, emitted);
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

fn backend_error(kind: BackendKind, e: &dyn std::fmt::Display) -> Fragment {
    Fragment::Error(format!("❌ {} error: {}", kind.display_name(), e))
}
