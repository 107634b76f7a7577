mod whisper;

use async_trait::async_trait;
use log::{ info, warn };
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;

pub use self::whisper::WhisperTranscriber;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("audio decoding tool unavailable: {0}")]
    ToolingUnavailable(String),
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("transcription server error: {0}")]
    Upstream(String),
    #[error("audio file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Speech-to-text for an audio file on disk.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;

    fn model_name(&self) -> &str;
}

/// Builds the transcriber when a server is configured and answers the probe.
pub async fn initialize_transcriber(args: &Args) -> Option<Arc<dyn Transcriber>> {
    let Some(url) = args.whisper_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        info!("No WHISPER_URL configured, audio transcription disabled.");
        return None;
    };
    let transcriber = WhisperTranscriber::new(url, &args.whisper_model, args.ffmpeg_path.as_deref());
    if transcriber.probe(PROBE_TIMEOUT).await {
        info!("Whisper transcription ready: model '{}' at {}", args.whisper_model, url);
        Some(Arc::new(transcriber))
    } else {
        warn!("Whisper server at {} is unreachable, audio transcription disabled.", url);
        None
    }
}
