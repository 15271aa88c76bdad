//! # Application State Management
//!
//! Shared state handed to every HTTP request handler: the validated
//! configuration, the request metrics registry, the session store, and the
//! pipeline components constructed from config at startup.
//!
//! ## Thread Safety Pattern:
//! `Arc<RwLock<T>>` for the mutable pieces (config snapshot, metrics);
//! the store and pipeline components are `Arc`-shared and synchronize
//! internally (registry lock, per-session work/render mutexes).
//!
//! ## Lifecycle:
//! `AppState::new` wires the whole object graph — ffmpeg runner, transcoder,
//! ASR engine, translator chain, synthesizer, pipeline, render assembler —
//! so a missing credential or unknown provider fails the process at boot
//! instead of on the first chunk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::asr;
use crate::config::AppConfig;
use crate::media::{FfmpegRunner, FfmpegTranscoder};
use crate::pipeline::ChunkPipeline;
use crate::render::RenderAssembler;
use crate::session::SessionStore;
use crate::translate::TranslatorOrchestrator;
use crate::tts::GoogleTranslateTts;

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
    pub store: Arc<SessionStore>,
    pub pipeline: Arc<ChunkPipeline>,
    pub renderer: Arc<RenderAssembler>,
    pub translator: Arc<TranslatorOrchestrator>,
    /// Label of the configured ASR engine, for health reporting.
    pub asr_name: &'static str,
}

/// Request metrics collected across all endpoints.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Detailed metrics for each API endpoint (method + path)
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Per-endpoint request statistics.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Construct the full component graph from validated configuration.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SessionStore::new(config.performance.max_concurrent_sessions));

        let runner = Arc::new(FfmpegRunner::new(
            config.media.ffmpeg_bin.clone(),
            config.media.ffprobe_bin.clone(),
        ));
        let transcoder = Arc::new(FfmpegTranscoder::new(
            runner.clone(),
            config.pipeline.sample_rate,
            Duration::from_secs(config.media.transcode_timeout_secs),
        ));

        let engine = asr::engine_from_config(&config.asr)?;
        let asr_name = engine.name();
        let translator = Arc::new(TranslatorOrchestrator::from_config(&config.translate)?);
        let tts = Arc::new(GoogleTranslateTts::new(&config.tts)?);

        let pipeline = Arc::new(ChunkPipeline::new(
            store.clone(),
            transcoder,
            engine,
            translator.clone(),
            tts,
            PathBuf::from(&config.storage.audio_dir),
            config.pipeline.min_chunk_ms,
        ));

        let renderer = Arc::new(RenderAssembler::new(
            store.clone(),
            runner,
            PathBuf::from(&config.storage.video_dir),
            Duration::from_secs(config.media.render_timeout_secs),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            store,
            pipeline,
            renderer,
            translator,
            asr_name,
        })
    }

    /// Copy of the current configuration (released lock, cheap clone).
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record one finished request for an endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for the /metrics endpoint.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average = total duration / request count.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate in [0.0, 1.0].
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_metric_averages() {
        let metric = EndpointMetric {
            request_count: 4,
            total_duration_ms: 200,
            error_count: 1,
        };
        assert_eq!(metric.average_duration_ms(), 50.0);
        assert_eq!(metric.error_rate(), 0.25);

        let empty = EndpointMetric::default();
        assert_eq!(empty.average_duration_ms(), 0.0);
        assert_eq!(empty.error_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_metrics_recording() {
        let state = AppState::new(test_config()).unwrap();
        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_endpoint_request("POST /api/chunk", 120, false);
        state.record_endpoint_request("POST /api/chunk", 80, true);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);
        let endpoint = &snapshot.endpoint_metrics["POST /api/chunk"];
        assert_eq!(endpoint.request_count, 2);
        assert_eq!(endpoint.total_duration_ms, 200);
        assert_eq!(endpoint.error_count, 1);
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        // Voxtral refuses to construct without a key; tests never call out.
        config.asr.api_key = "test-key".to_string();
        config
    }
}
