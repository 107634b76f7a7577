use log::{ error, info, warn };
use std::sync::Arc;
use std::time::Duration;

use super::chat::{ ChatClient, CompletionRouter, OllamaClient, OpenAIChatClient };
use super::{ BackendKind, ParseSelectionModeError, SelectionMode };
use crate::cli::Args;

/// Outcome of the startup probes. Each flag is determined independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub local: bool,
    pub cloud: bool,
}

impl Availability {
    fn has(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Ollama => self.local,
            BackendKind::OpenRouter => self.cloud,
        }
    }
}

/// Auto prefers the local backend; a pinned backend is used only when available.
pub fn choose_backend(mode: SelectionMode, availability: Availability) -> Option<BackendKind> {
    match mode {
        SelectionMode::Auto => {
            [BackendKind::Ollama, BackendKind::OpenRouter]
                .into_iter()
                .find(|kind| availability.has(*kind))
        }
        SelectionMode::Pinned(kind) => availability.has(kind).then_some(kind),
    }
}

/// Probes both backends and builds the process-wide completion router.
///
/// A failed probe only marks that backend unavailable. The returned router
/// is `unavailable()` when nothing usable was found; callers decide whether
/// that is fatal.
pub async fn select_backend(args: &Args) -> Result<CompletionRouter, ParseSelectionModeError> {
    let mode: SelectionMode = args.ai_method.parse()?;
    info!("Checking AI service connections...");

    let cloud_client: Option<Arc<dyn ChatClient>> = match args.openrouter_key() {
        Some(key) => {
            match OpenAIChatClient::new(key, args.openrouter_model.clone(), args.openrouter_base_url.clone()) {
                Ok(client) => {
                    info!(
                        "OpenRouter client initialized for chat: Model={}, BaseURL={}",
                        args.openrouter_model,
                        args.openrouter_base_url
                    );
                    Some(Arc::new(client))
                }
                Err(e) => {
                    error!("Failed to initialize OpenRouter client: {}", e);
                    None
                }
            }
        }
        None => {
            info!("No OpenRouter API key configured, cloud backend disabled.");
            None
        }
    };

    let local_client = OllamaClient::new(args.ollama_host.clone(), args.ollama_model.clone());
    let local_available = local_client
        .probe(Duration::from_secs(args.ollama_probe_timeout_secs)).await;

    let availability = Availability {
        local: local_available,
        cloud: cloud_client.is_some(),
    };

    let router = match (choose_backend(mode, availability), cloud_client) {
        (Some(BackendKind::Ollama), _) => {
            CompletionRouter::new(BackendKind::Ollama, Arc::new(local_client))
        }
        (Some(BackendKind::OpenRouter), Some(client)) => {
            CompletionRouter::new(BackendKind::OpenRouter, client)
        }
        _ => CompletionRouter::unavailable(),
    };

    match router.active_backend() {
        Some(kind) => info!("Using AI method for chat: {}", kind.as_str().to_uppercase()),
        None => warn!("No chat AI services available! (mode {:?}, {:?})", mode, availability),
    }

    Ok(router)
}
