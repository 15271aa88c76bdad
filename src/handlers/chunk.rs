//! Chunk submission endpoint.
//!
//! `POST /api/chunk` takes a multipart form: an `audio` file part plus
//! `client_ts`, `source_lang`, `target_lang` and `session_id` text fields.
//! The handler only parses the form and classifies the declared content
//! type; everything else is the pipeline's job.

use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use base64::Engine as _;
use futures_util::StreamExt;
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::media::ChunkFormat;
use crate::pipeline::ChunkRequest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub text: String,
    pub translated_text: String,
    pub audio_b64: String,
    pub mime: String,
    pub client_ts: i64,
}

/// `POST /api/chunk`
pub async fn submit_chunk(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut audio: Option<Vec<u8>> = None;
    let mut content_type = String::new();
    let mut client_ts = 0i64;
    let mut source_lang = "en".to_string();
    let mut target_lang = "hi".to_string();
    let mut session_id = String::new();

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_string();

        match field_name.as_str() {
            "audio" => {
                content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_default();
                audio = Some(read_field_bytes(&mut field).await?);
            }
            "client_ts" => {
                client_ts = read_field_string(&mut field).await?.trim().parse().unwrap_or(0);
            }
            "source_lang" => {
                source_lang = read_field_string(&mut field).await?;
            }
            "target_lang" => {
                target_lang = read_field_string(&mut field).await?;
            }
            "session_id" => {
                session_id = read_field_string(&mut field).await?;
            }
            _ => {
                // Drain unknown fields so the stream stays parseable
                read_field_bytes(&mut field).await?;
            }
        }
    }

    if session_id.is_empty() {
        return Err(AppError::BadRequest("session_id required".to_string()));
    }
    // Unknown session rejected before any decode work starts
    state.store.handle(&session_id)?;

    let audio = audio.ok_or_else(|| AppError::BadRequest("no audio field provided".to_string()))?;
    if audio.is_empty() {
        return Err(AppError::BadRequest("empty audio chunk".to_string()));
    }

    let format = ChunkFormat::from_content_type(&content_type);
    info!(
        sid = %session_id,
        content_type = %content_type,
        bytes = audio.len(),
        format = ?format,
        client_ts,
        "chunk.recv"
    );

    let outcome = state
        .pipeline
        .process(ChunkRequest {
            session_id,
            audio,
            format,
            client_ts,
            source_lang,
            target_lang,
        })
        .await?;

    let audio_b64 = if outcome.audio.is_empty() {
        String::new()
    } else {
        base64::engine::general_purpose::STANDARD.encode(&outcome.audio)
    };

    Ok(HttpResponse::Ok().json(ChunkResponse {
        text: outcome.text,
        translated_text: outcome.translated_text,
        audio_b64,
        mime: outcome.mime,
        client_ts: outcome.client_ts,
    }))
}

pub(crate) async fn read_field_bytes(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::ValidationError(format!("Multipart chunk error: {}", e)))?;
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(crate) async fn read_field_string(field: &mut Field) -> Result<String, AppError> {
    let bytes = read_field_bytes(field).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
