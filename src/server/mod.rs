pub mod api;
pub mod error;

use axum::{ extract::DefaultBodyLimit, routing::{ get, post }, Router };
use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };

use crate::consultation::Consultation;
use crate::report::TranscriptExporter;
use crate::transcription::Transcriber;

/// Shared per-process state. Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub consultation: Arc<Consultation>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub exporter: Arc<TranscriptExporter>,
}

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(api::status_handler))
        .route("/api/chat", post(api::chat_handler))
        .route("/api/export/pdf", post(api::export_pdf_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_body_bytes))
        )
        .with_state(state)
}

pub async fn start_http_server(
    port: u16,
    state: AppState,
    max_body_bytes: usize
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state, max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await
        .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
    info!("MediMate backend is running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
