mod pdf;

use chrono::Local;
use log::{ error, info };
use std::io::BufWriter;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::chat::Turn;

pub use self::pdf::{ render_transcript, to_latin1_lossy, wrap_text };

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF export is disabled.")]
    Disabled,
    #[error("failed to render PDF: {0}")]
    Render(String),
    #[error("export file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders transcripts through a temporary file in the conversation directory.
/// The file never outlives the call.
#[derive(Debug, Clone)]
pub struct TranscriptExporter {
    enabled: bool,
    dir: PathBuf,
}

impl TranscriptExporter {
    pub fn new(enabled: bool, dir: impl Into<PathBuf>) -> Self {
        Self { enabled, dir: dir.into() }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn export(
        &self,
        history: Vec<Turn>,
        patient_category: String,
        is_emergency: bool
    ) -> Result<Vec<u8>, ExportError> {
        if !self.enabled {
            return Err(ExportError::Disabled);
        }
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ExportError> {
            std::fs::create_dir_all(&dir)?;
            let tmp = tempfile::Builder::new()
                .prefix("MediMate_")
                .suffix(".pdf")
                .tempfile_in(&dir)?;

            let rendered = tmp.reopen().map_err(ExportError::from).and_then(|file| {
                let mut writer = BufWriter::new(file);
                render_transcript(&history, &patient_category, is_emergency, Local::now(), &mut writer)
                    .map_err(ExportError::Render)
            });
            let bytes = rendered.and_then(|()| Ok(std::fs::read(tmp.path())?));

            let path = tmp.path().display().to_string();
            match tmp.close() {
                Ok(()) => info!("Removed temporary export file: {}", path),
                Err(e) => error!("Failed to clean up temporary file {}: {}", path, e),
            }
            let bytes = bytes?;
            info!("Consultation exported: {} turns, {} bytes", history.len(), bytes.len());
            Ok(bytes)
        }).await
            .map_err(|e| ExportError::Render(format!("export task failed: {}", e)))?
    }
}
