//! Session lifecycle endpoints.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionStartResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct StopForm {
    #[serde(default)]
    pub session_id: String,
}

/// `POST /api/session/start`
pub async fn start_session(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let session_id = state.store.create()?;
    info!(sid = %session_id, "session.start");
    Ok(HttpResponse::Ok().json(SessionStartResponse { session_id }))
}

/// `POST /api/session/stop`
///
/// Stopping is idempotent: a stop for an already-gone session still answers
/// `ok`, matching what a client tearing down a page expects.
pub async fn stop_session(
    state: web::Data<AppState>,
    form: web::Form<StopForm>,
) -> AppResult<HttpResponse> {
    if form.session_id.is_empty() {
        return Err(AppError::BadRequest("session_id required".to_string()));
    }
    let _ = state.store.delete(&form.session_id);
    info!(sid = %form.session_id, "session.stop");
    Ok(HttpResponse::Ok().json(StopResponse { ok: true }))
}
