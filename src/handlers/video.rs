//! Video upload and render endpoints.

use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::handlers::chunk::{read_field_bytes, read_field_string};
use crate::state::AppState;

/// `POST /api/video/upload` — multipart `video` file + `session_id` field.
pub async fn upload_video(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut video: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
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
            "video" => {
                filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(|name| name.to_string());
                video = Some(read_field_bytes(&mut field).await?);
            }
            "session_id" => {
                session_id = read_field_string(&mut field).await?;
            }
            _ => {
                read_field_bytes(&mut field).await?;
            }
        }
    }

    if session_id.is_empty() {
        return Err(AppError::BadRequest("session_id required".to_string()));
    }
    state.store.handle(&session_id)?;

    let video = video.ok_or_else(|| AppError::BadRequest("no video field provided".to_string()))?;
    if video.is_empty() {
        return Err(AppError::BadRequest("empty video upload".to_string()));
    }

    let config = state.get_config();
    let ext = filename
        .as_deref()
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| ".webm".to_string());

    let name = format!("{}_{}{}", session_id, Utc::now().timestamp_millis(), ext);
    let save_path = PathBuf::from(&config.storage.video_dir).join(name);
    tokio::fs::create_dir_all(&config.storage.video_dir).await?;
    tokio::fs::write(&save_path, &video).await?;

    state.store.set_video_path(&session_id, save_path.clone())?;
    info!(
        sid = %session_id,
        path = %save_path.display(),
        size_bytes = video.len(),
        "video.saved"
    );

    let public_url = public_url(&config.storage.public_route, &config.storage_root(), &save_path);
    Ok(HttpResponse::Ok().json(json!({
        "stored_path": save_path.to_string_lossy(),
        "public_url": public_url
    })))
}

#[derive(Debug, Deserialize)]
pub struct RenderForm {
    #[serde(default)]
    pub session_id: String,
    #[serde(default = "default_burn")]
    pub burn_subs: u8,
}

fn default_burn() -> u8 {
    1
}

/// `POST /api/video/render`
pub async fn render_video(
    state: web::Data<AppState>,
    form: web::Form<RenderForm>,
) -> AppResult<HttpResponse> {
    if form.session_id.is_empty() {
        return Err(AppError::BadRequest("session_id required".to_string()));
    }

    let output = state
        .renderer
        .render(&form.session_id, true, form.burn_subs != 0)
        .await?;

    let config = state.get_config();
    let root = config.storage_root();
    let final_url = public_url(&config.storage.public_route, &root, &output.final_path);
    let caption_url = public_url(&config.storage.public_route, &root, &output.caption_path);

    Ok(HttpResponse::Ok().json(json!({
        "final_video_path": output.final_path.to_string_lossy(),
        "caption_path": output.caption_path.to_string_lossy(),
        "final_url": final_url,
        "caption_url": caption_url
    })))
}

/// Public URL for an artifact: the configured route plus the artifact's path
/// relative to the storage root. Empty when the artifact lives elsewhere.
fn public_url(public_route: &str, storage_root: &Path, artifact: &Path) -> String {
    let root = storage_root
        .canonicalize()
        .unwrap_or_else(|_| storage_root.to_path_buf());
    let artifact = artifact
        .canonicalize()
        .unwrap_or_else(|_| artifact.to_path_buf());

    match artifact.strip_prefix(&root) {
        Ok(rel) => format!(
            "{}/{}",
            public_route.trim_end_matches('/'),
            rel.to_string_lossy().replace('\\', "/")
        ),
        Err(_) => String::new(),
    }
}
