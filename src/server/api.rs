use axum::{
    body::{ Body, Bytes },
    extract::{ multipart::{ Multipart, MultipartRejection }, rejection::JsonRejection, State },
    http::header::{ CONTENT_DISPOSITION, CONTENT_TYPE },
    response::{ IntoResponse, Response },
    Json,
};
use chrono::Local;
use futures::StreamExt;
use log::{ error, info };
use serde::{ Deserialize, Serialize };
use std::convert::Infallible;
use std::path::Path;

use super::error::ApiError;
use super::AppState;
use crate::models::chat::Turn;
use crate::models::stream::StreamRecord;
use crate::report::ExportError;
use crate::transcription::{ Transcriber, TranscriptionError };

const NDJSON_CONTENT_TYPE: &str = "application/x-json-stream; charset=utf-8";

#[derive(Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub service_status: String,
    pub active_chat_method: Option<String>,
    pub local_transcription_model: String,
}

#[derive(Deserialize, Debug)]
pub struct ExportRequest {
    pub history: Option<Vec<Turn>>,
    pub patient_type: Option<String>,
    pub is_emergency: Option<bool>,
}

struct AudioUpload {
    file_name: String,
    bytes: Bytes,
}

#[derive(Default)]
struct ChatForm {
    history: Option<String>,
    patient_type: Option<String>,
    message: Option<String>,
    audio: Option<AudioUpload>,
}

impl ChatForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ChatForm::default();
        while let Some(field) = multipart.next_field().await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "audio_file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read audio upload: {}", e)))?;
                    form.audio = Some(AudioUpload { file_name, bytes });
                }
                "history" | "patient_type" | "message" => {
                    let text = field.text().await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e)))?;
                    match name.as_str() {
                        "history" => form.history = Some(text),
                        "patient_type" => form.patient_type = Some(text),
                        _ => form.message = Some(text),
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

pub fn parse_history(raw: &str) -> Result<Vec<Turn>, ApiError> {
    serde_json::from_str::<Vec<Turn>>(raw).map_err(|e| {
        error!("Invalid history format received: {}", raw);
        ApiError::BadRequest(format!(
            "Invalid 'history' format. Must be a JSON array of [user, assistant] pairs. Error: {}",
            e
        ))
    })
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service_status: "running".to_string(),
        active_chat_method: state.consultation.active_backend().map(|b| b.to_string()),
        local_transcription_model: state.transcriber
            .as_ref()
            .map(|t| t.model_name().to_string())
            .unwrap_or_else(|| "Not Available".to_string()),
    })
}

pub async fn chat_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    if state.consultation.active_backend().is_none() {
        return Err(ApiError::ServiceUnavailable("No AI chat service is available.".into()));
    }

    let multipart = multipart.map_err(|e| {
        ApiError::BadRequest(format!("Request must be multipart/form-data: {}", e))
    })?;
    let form = ChatForm::read(multipart).await?;
    let history = parse_history(form.history.as_deref().unwrap_or("[]"))?;

    let message = match form.audio {
        Some(upload) => {
            info!("Received audio file for transcription and chat.");
            if upload.file_name.is_empty() {
                return Err(ApiError::BadRequest("No audio file selected in 'audio_file' part.".into()));
            }
            let transcriber = state.transcriber.as_deref().ok_or_else(|| {
                ApiError::ServiceUnavailable(
                    "Local audio transcription service is not available to process the file.".into()
                )
            })?;
            transcribe_upload(transcriber, &upload).await
                .map_err(|e| ApiError::Internal(format!("Audio processing failed: {}", e)))?
        }
        None => {
            info!("Received text message for chat.");
            form.message.filter(|m| !m.trim().is_empty()).ok_or_else(|| {
                ApiError::BadRequest(
                    "Request form must contain either a 'message' text field or an 'audio_file' part.".into()
                )
            })?
        }
    };

    let fragments = state.consultation.run_consultation(&message, &history, form.patient_type.as_deref());
    let body = Body::from_stream(
        fragments.map(|f| Ok::<_, Infallible>(StreamRecord::from(f).to_line()))
    );
    Ok(([(CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body).into_response())
}

/// The upload lives in a temp file that is removed on every exit path.
async fn transcribe_upload(
    transcriber: &dyn Transcriber,
    upload: &AudioUpload
) -> Result<String, TranscriptionError> {
    let suffix = Path::new(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| ".wav".to_string());
    let tmp = tempfile::Builder::new()
        .prefix("medimate_audio_")
        .suffix(&suffix)
        .tempfile()?;

    let result = match tokio::fs::write(tmp.path(), &upload.bytes).await {
        Ok(()) => transcriber.transcribe(tmp.path()).await,
        Err(e) => Err(e.into()),
    };

    let path = tmp.path().display().to_string();
    match tmp.close() {
        Ok(()) => info!("Cleaned up temporary audio file: {}", path),
        Err(e) => error!("Failed to clean up temporary file {}: {}", path, e),
    }

    let text = result?;
    info!("Transcription successful. Message: '{}'", text);
    Ok(text)
}

pub async fn export_pdf_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !state.exporter.is_enabled() {
        return Err(ApiError::NotImplemented(ExportError::Disabled.to_string()));
    }

    let request = payload
        .map(|Json(r)| r)
        .map_err(|e| ApiError::BadRequest(format!("Request must be JSON with 'history': {}", e)))?;
    let history = request.history
        .ok_or_else(|| ApiError::BadRequest("Request must be JSON with 'history'.".into()))?;
    let patient_type = request.patient_type.unwrap_or_else(|| "standard".to_string());

    let pdf = state.exporter
        .export(history, patient_type, request.is_emergency.unwrap_or(false)).await
        .map_err(|e| match e {
            ExportError::Disabled => ApiError::NotImplemented(ExportError::Disabled.to_string()),
            other => ApiError::Internal(format!("Failed to export PDF: {}", other)),
        })?;

    let disposition = format!(
        "attachment; filename=\"MediMate_Consultation_{}.pdf\"",
        Local::now().format("%Y%m%d")
    );
    Ok(([(CONTENT_TYPE, "application/pdf".to_string()), (CONTENT_DISPOSITION, disposition)], pdf).into_response())
}
