use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat Backend Selection ---
    /// Chat backend selection: auto (prefer ollama, then openrouter), ollama, or openrouter
    #[arg(long, env = "AI_METHOD", default_value = "auto")]
    pub ai_method: String,

    // --- Local (Ollama) Backend Args ---
    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    pub ollama_host: String,

    /// Model name used for local chat completion
    #[arg(long, env = "OLLAMA_MODEL", default_value = "gemma:7b")]
    pub ollama_model: String,

    /// Timeout in seconds for the Ollama startup health probe
    #[arg(long, env = "OLLAMA_PROBE_TIMEOUT_SECS", default_value = "5")]
    pub ollama_probe_timeout_secs: u64,

    // --- Cloud (OpenRouter) Backend Args ---
    /// API key for OpenRouter. The cloud backend is unavailable without it.
    #[arg(long, env = "OPENROUTER_API_KEY")]
    pub openrouter_api_key: Option<String>,

    /// Model name used for cloud chat completion
    #[arg(long, env = "OPENROUTER_MODEL", default_value = "meta-llama/llama-3.2-9b-instruct:free")]
    pub openrouter_model: String,

    /// Base URL of the OpenAI-compatible OpenRouter API
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub openrouter_base_url: String,

    // --- Transcription Args ---
    /// Base URL of a whisper-compatible transcription server (e.g., http://localhost:8080).
    /// Audio input is rejected when unset or unreachable.
    #[arg(long, env = "WHISPER_URL")]
    pub whisper_url: Option<String>,

    /// Whisper model name sent to the transcription server and reported by /api/status
    #[arg(long = "whisper-model", env = "LOCAL_WHISPER_MODEL", default_value = "base")]
    pub whisper_model: String,

    /// Directory containing the ffmpeg executable. Falls back to `ffmpeg` on PATH.
    #[arg(long, env = "FFMPEG_PATH")]
    pub ffmpeg_path: Option<String>,

    // --- General App Args ---
    /// Port for the HTTP server to listen on (all interfaces)
    #[arg(long, env = "SERVER_PORT", default_value = "7861")]
    pub server_port: u16,

    /// Maximum number of past conversation turns sent to the model
    #[arg(long, env = "MAX_HISTORY", default_value = "10")]
    pub max_history: usize,

    /// Directory used for temporary PDF exports
    #[arg(long, env = "CONVERSATION_DIR", default_value = "consultations")]
    pub conversation_dir: String,

    /// Enable the PDF transcript export endpoint
    #[arg(long, env = "ENABLE_PDF_EXPORT", default_value = "true", action = clap::ArgAction::Set)]
    pub enable_pdf_export: bool,

    /// Enable emergency keyword detection
    #[arg(long, env = "EMERGENCY_MODE", default_value = "true", action = clap::ArgAction::Set)]
    pub emergency_mode: bool,

    /// Maximum accepted request body size in megabytes (audio uploads)
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "25")]
    pub max_upload_mb: usize,
}

impl Args {
    pub fn openrouter_key(&self) -> Option<&str> {
        self.openrouter_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Upload limit in bytes, clamped at `usize::MAX`.
    pub fn max_body_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
