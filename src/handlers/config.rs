//! Sanitized configuration echo.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::AppError;
use crate::health::mask;
use crate::state::AppState;

/// `GET /api/config` — current configuration with credentials masked.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "storage": {
                "audio_dir": config.storage.audio_dir,
                "video_dir": config.storage.video_dir,
                "public_route": config.storage.public_route
            },
            "asr": {
                "provider": config.asr.provider,
                "model": config.asr.model,
                "api_key_masked": mask(&config.asr.api_key),
                "timeout_secs": config.asr.timeout_secs
            },
            "translate": {
                "libre_urls": config.translate.libre_urls,
                "api_key_masked": mask(&config.translate.libre_api_key),
                "offline_command": config.translate.offline_command,
                "timeout_secs": config.translate.timeout_secs
            },
            "tts": {
                "endpoint": config.tts.endpoint,
                "timeout_secs": config.tts.timeout_secs
            },
            "media": {
                "ffmpeg_bin": config.media.ffmpeg_bin,
                "ffprobe_bin": config.media.ffprobe_bin,
                "transcode_timeout_secs": config.media.transcode_timeout_secs,
                "render_timeout_secs": config.media.render_timeout_secs
            },
            "pipeline": {
                "min_chunk_ms": config.pipeline.min_chunk_ms,
                "sample_rate": config.pipeline.sample_rate
            },
            "performance": {
                "max_concurrent_sessions": config.performance.max_concurrent_sessions
            }
        }
    })))
}
