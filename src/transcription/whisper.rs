use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::path::{ Path, PathBuf };
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{ Transcriber, TranscriptionError };

const WHISPER_SAMPLE_RATE: u32 = 16000;

#[cfg(windows)]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[derive(Debug, Clone, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Decodes audio with ffmpeg and sends it to a whisper-compatible server
/// (`/v1/audio/transcriptions`).
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    http: HttpClient,
    base_url: String,
    model: String,
    ffmpeg_dir: Option<PathBuf>,
}

impl WhisperTranscriber {
    pub fn new(base_url: &str, model: &str, ffmpeg_dir: Option<&str>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            ffmpeg_dir: ffmpeg_dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from),
        }
    }

    pub async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(resp) => {
                debug!("Whisper health probe answered {}", resp.status());
                true
            }
            Err(e) => {
                warn!("Whisper health probe failed: {}", e);
                false
            }
        }
    }

    fn ffmpeg_executable(&self) -> Result<PathBuf, TranscriptionError> {
        match &self.ffmpeg_dir {
            Some(dir) => {
                let exe = dir.join(FFMPEG_BINARY);
                if exe.exists() {
                    Ok(exe)
                } else {
                    Err(TranscriptionError::ToolingUnavailable(format!(
                        "{} not found in '{}'. Set FFMPEG_PATH to the ffmpeg 'bin' directory.",
                        FFMPEG_BINARY,
                        dir.display()
                    )))
                }
            }
            None => Ok(PathBuf::from(FFMPEG_BINARY)),
        }
    }

    /// Converts any input ffmpeg understands to 16 kHz mono 16-bit WAV.
    async fn decode(&self, audio_path: &Path) -> Result<Vec<u8>, TranscriptionError> {
        let ffmpeg = self.ffmpeg_executable()?;
        info!("Using ffmpeg executable at: {}", ffmpeg.display());

        let output = Command::new(&ffmpeg)
            .arg("-nostdin")
            .args(["-threads", "0", "-i"])
            .arg(audio_path)
            .args(["-f", "wav", "-ac", "1", "-acodec", "pcm_s16le", "-ar"])
            .arg(WHISPER_SAMPLE_RATE.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscriptionError::ToolingUnavailable(format!(
                "failed to run '{}': {}",
                ffmpeg.display(),
                e
            )))?;

        if !output.status.success() {
            return Err(TranscriptionError::Decode(
                String::from_utf8_lossy(&output.stderr).trim().to_string()
            ));
        }
        if output.stdout.is_empty() {
            return Err(TranscriptionError::Decode("ffmpeg produced no audio".to_string()));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        info!("Transcribing '{}' with model '{}'...", audio_path.display(), self.model);
        let wav_bytes = self.decode(audio_path).await?;

        let file_part = reqwest::multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Upstream(format!("Failed to create file part: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0.0");

        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let response = self.http
            .post(&url)
            .multipart(form)
            .send().await
            .map_err(|e| TranscriptionError::Upstream(format!("Failed to send transcription request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Upstream(format!("{} - {}", status, body)));
        }

        let result = response
            .json::<TranscriptionResponse>().await
            .map_err(|e| TranscriptionError::Upstream(format!("Failed to parse transcription response: {}", e)))?;
        let text = result.text.trim().to_string();
        info!("Transcription complete: {} chars", text.len());
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
