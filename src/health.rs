//! Health and diagnostics endpoints.
//!
//! `health_check` / `detailed_metrics` report service status, request
//! metrics and live session counts; `translate_health` probes each
//! translation provider with a sample word so a dead chain is visible
//! before a recording session starts. API keys are masked in every response.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::process;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();
    let active_sessions = state.store.session_count();

    let memory_info = get_memory_info();
    let system_status = get_system_status(active_sessions, config.performance.max_concurrent_sessions);

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "live-dub-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_sessions": active_sessions
        },
        "memory": memory_info,
        "providers": {
            "asr": {
                "provider": state.asr_name,
                "model": config.asr.model,
                "configured": !config.asr.api_key.is_empty()
            },
            "translate": {
                "chain": state.translator.providers().iter().map(|p| p.name()).collect::<Vec<_>>()
            },
            "tts": {
                "endpoint": config.tts.endpoint
            }
        },
        "system": system_status
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_sessions": state.store.session_count(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

#[derive(Debug, Deserialize)]
pub struct TranslateHealthQuery {
    #[serde(default = "default_src")]
    pub src: String,
    #[serde(default = "default_tgt")]
    pub tgt: String,
}

fn default_src() -> String {
    "en".to_string()
}

fn default_tgt() -> String {
    "hi".to_string()
}

/// Probe every provider in the chain with a sample word.
pub async fn translate_health(
    state: web::Data<AppState>,
    query: web::Query<TranslateHealthQuery>,
) -> HttpResponse {
    let config = state.get_config();
    let sample = "hello";

    let mut providers = Vec::new();
    for provider in state.translator.providers() {
        let ok = matches!(
            provider.translate(sample, &query.src, &query.tgt).await,
            Ok(out) if !out.is_empty()
        );
        providers.push(json!({
            "name": provider.name(),
            "ok": ok
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "langpair": format!("{}|{}", query.src, query.tgt),
        "libre_urls": config.translate.libre_urls,
        "api_key_masked": mask(&config.translate.libre_api_key),
        "providers": providers
    }))
}

/// Mask a credential for display: first 3 and last 2 characters survive.
pub(crate) fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    if secret.chars().count() <= 5 {
        return "***".to_string();
    }
    let head: String = secret.chars().take(3).collect();
    let tail: String = secret
        .chars()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}***{}", head, tail)
}

fn get_memory_info() -> serde_json::Value {
    let pid = process::id();

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        vm_rss = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                    }
                } else if line.starts_with("VmSize:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        vm_size = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                    }
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false
    })
}

fn get_system_status(active_sessions: usize, max_sessions: usize) -> serde_json::Value {
    let session_usage = if max_sessions > 0 {
        active_sessions as f64 / max_sessions as f64
    } else {
        0.0
    };

    let status = if session_usage > 0.9 {
        "high_load"
    } else if session_usage > 0.7 {
        "moderate_load"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "session_usage_percent": (session_usage * 100.0).round(),
        "max_sessions": max_sessions,
        "current_sessions": active_sessions
    })
}
