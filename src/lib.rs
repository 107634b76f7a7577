pub mod cli;
pub mod config;
pub mod consultation;
pub mod llm;
pub mod models;
pub mod report;
pub mod server;
pub mod transcription;

use cli::Args;
use config::prompt::PromptSelector;
use consultation::Consultation;
use log::{ error, info };
use report::TranscriptExporter;
use server::AppState;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("AI Method: {}", args.ai_method);
    info!("Ollama Host: {}", args.ollama_host);
    info!("Ollama Model: {}", args.ollama_model);
    info!("OpenRouter Base URL: {}", args.openrouter_base_url);
    info!("OpenRouter Model: {}", args.openrouter_model);
    info!("OpenRouter API Key: {}", if args.openrouter_key().is_some() { "set" } else { "not set" });
    info!("Whisper URL: {}", args.whisper_url.as_deref().unwrap_or("not set"));
    info!("Whisper Model: {}", args.whisper_model);
    info!("Max History: {}", args.max_history);
    info!("PDF Export Enabled: {}", args.enable_pdf_export);
    if args.enable_pdf_export {
        info!("Conversation Dir: {}", args.conversation_dir);
    }
    info!("Emergency Mode: {}", args.emergency_mode);
    info!("Server Port: {}", args.server_port);
    info!("-------------------------");

    let completions = llm::selector::select_backend(&args).await?;
    if completions.active_backend().is_none() {
        error!("MediMate cannot start - No AI chat backend is available.");
        return Err("No AI chat backend is available".into());
    }

    let transcriber = transcription::initialize_transcriber(&args).await;

    let consultation = Consultation::new(
        PromptSelector::new(args.emergency_mode),
        completions,
        args.max_history
    );
    let state = AppState {
        consultation: Arc::new(consultation),
        transcriber,
        exporter: Arc::new(TranscriptExporter::new(args.enable_pdf_export, &args.conversation_dir)),
    };

    server::start_http_server(args.server_port, state, args.max_body_bytes()).await
}
