#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use medimate::llm::chat::{ BoxError, ChatClient, TokenStream };
use medimate::models::chat::{ ChatMessage, GenerationParams };
use medimate::transcription::{ Transcriber, TranscriptionError };
use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

/// Replays a fixed reply, optionally failing part way through.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    pub tokens: Vec<String>,
    pub fail_after_tokens: Option<String>,
    pub fail_on_start: Option<String>,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>>,
}

impl ScriptedClient {
    pub fn replying(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_conversation(&self) -> Vec<ChatMessage> {
        self.seen.lock().unwrap().last().map(|(c, _)| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams
    ) -> Result<TokenStream, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((messages.to_vec(), params));
        if let Some(err) = &self.fail_on_start {
            return Err(err.clone().into());
        }
        let mut items: Vec<Result<String, BoxError>> = self.tokens.iter().cloned().map(Ok).collect();
        if let Some(err) = &self.fail_after_tokens {
            items.push(Err(err.clone().into()));
            items.push(Ok("never delivered".to_string()));
        }
        Ok(Box::pin(stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}

/// Records the audio path it was given and returns a fixed transcript.
#[derive(Clone, Default)]
pub struct FakeTranscriber {
    pub transcript: String,
    pub fail_with: Option<String>,
    pub seen_paths: Arc<Mutex<Vec<PathBuf>>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        assert!(audio_path.exists(), "upload must be on disk while transcribing");
        self.seen_paths.lock().unwrap().push(audio_path.to_path_buf());
        match &self.fail_with {
            Some(msg) => Err(TranscriptionError::Decode(msg.clone())),
            None => Ok(self.transcript.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "fake-whisper"
    }
}
