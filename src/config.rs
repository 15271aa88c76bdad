//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Well-known environment variables (`HOST`, `PORT`, `MISTRAL_API_KEY`,
//!    `LIBRETRANSLATE_URL`, `LIBRETRANSLATE_API_KEY`, `FFMPEG_BIN`,
//!    `FFPROBE_BIN`)
//! 2. Environment variables prefixed with APP_
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub asr: AsrConfig,
    pub translate: TranslateConfig,
    pub tts: TtsConfig,
    pub media: MediaConfig,
    pub pipeline: PipelineConfig,
    pub performance: PerformanceConfig,
}

/// Server bind address.
///
/// - `host = "127.0.0.1"`: localhost only (development)
/// - `host = "0.0.0.0"`: accept connections from any address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where artifacts land on disk.
///
/// Synthesized per-chunk audio goes under `audio_dir`; uploaded videos and
/// render outputs under `video_dir`. Public URLs for artifacts are built as
/// `public_route` + the path relative to the common parent of both dirs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub audio_dir: String,
    pub video_dir: String,
    pub public_route: String,
}

/// Speech-recognition capability selection.
///
/// - `provider = "voxtral"`: Mistral Voxtral via the chat-completions API
/// - `provider = "whisper_api"`: any OpenAI-compatible
///   `/audio/transcriptions` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    pub provider: String,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Translation provider chain settings.
///
/// `libre_urls` is a comma-separated list of LibreTranslate-compatible hosts
/// tried in order; the well-known public instances are appended as defaults.
/// `offline_command`, when set, names a local executable used as the last
/// chain entry (invoked as `<cmd> <source> <target>` with the text on stdin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    pub libre_urls: String,
    pub libre_api_key: String,
    pub mymemory_url: String,
    pub offline_command: String,
    pub timeout_secs: u64,
}

/// Speech-synthesis endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// External media-process binaries and execution budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub transcode_timeout_secs: u64,
    pub render_timeout_secs: u64,
}

/// Chunk pipeline tuning.
///
/// `min_chunk_ms` is the minimum timeline span any chunk consumes; very short
/// or zero-duration probes still advance the cursor by this much so the dub
/// track stays aligned with the source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub min_chunk_ms: u64,
    pub sample_rate: u32,
}

/// Capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                audio_dir: "storage/audio".to_string(),
                video_dir: "storage/videos".to_string(),
                public_route: "/files".to_string(),
            },
            asr: AsrConfig {
                provider: "voxtral".to_string(),
                api_url: "https://api.mistral.ai/v1/chat/completions".to_string(),
                api_key: String::new(),
                model: "voxtral-mini-latest".to_string(),
                timeout_secs: 45,
            },
            translate: TranslateConfig {
                libre_urls: "https://libretranslate.com".to_string(),
                libre_api_key: String::new(),
                mymemory_url: "https://api.mymemory.translated.net/get".to_string(),
                offline_command: String::new(),
                timeout_secs: 12,
            },
            tts: TtsConfig {
                endpoint: "https://translate.google.com/translate_tts".to_string(),
                timeout_secs: 20,
            },
            media: MediaConfig {
                ffmpeg_bin: "ffmpeg".to_string(),
                ffprobe_bin: "ffprobe".to_string(),
                transcode_timeout_secs: 30,
                render_timeout_secs: 600,
            },
            pipeline: PipelineConfig {
                min_chunk_ms: 200,
                sample_rate: 16000,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 50,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms set these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        // Provider credentials and binaries keep their historical names
        if let Ok(key) = env::var("MISTRAL_API_KEY") {
            settings = settings.set_override("asr.api_key", key)?;
        }
        if let Ok(urls) = env::var("LIBRETRANSLATE_URL") {
            settings = settings.set_override("translate.libre_urls", urls)?;
        }
        if let Ok(key) = env::var("LIBRETRANSLATE_API_KEY") {
            settings = settings.set_override("translate.libre_api_key", key)?;
        }
        if let Ok(bin) = env::var("FFMPEG_BIN") {
            settings = settings.set_override("media.ffmpeg_bin", bin)?;
        }
        if let Ok(bin) = env::var("FFPROBE_BIN") {
            settings = settings.set_override("media.ffprobe_bin", bin)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense before startup.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        if self.pipeline.min_chunk_ms == 0 {
            return Err(anyhow::anyhow!("Minimum chunk span must be greater than 0 ms"));
        }

        if self.storage.audio_dir.is_empty() || self.storage.video_dir.is_empty() {
            return Err(anyhow::anyhow!("Storage directories must be configured"));
        }

        if self.media.ffmpeg_bin.is_empty() || self.media.ffprobe_bin.is_empty() {
            return Err(anyhow::anyhow!("ffmpeg/ffprobe binaries must be configured"));
        }

        match self.asr.provider.as_str() {
            "voxtral" | "whisper_api" => {}
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown ASR provider '{}' (expected 'voxtral' or 'whisper_api')",
                    other
                ));
            }
        }

        Ok(())
    }

    /// Create the artifact directories if they do not exist yet.
    pub fn ensure_storage(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage.audio_dir)?;
        std::fs::create_dir_all(&self.storage.video_dir)?;
        Ok(())
    }

    /// Common parent of the artifact directories; public URLs are derived
    /// relative to this root.
    pub fn storage_root(&self) -> PathBuf {
        Path::new(&self.storage.audio_dir)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.min_chunk_ms, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.asr.provider = "vosk".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.min_chunk_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_root() {
        let config = AppConfig::default();
        assert_eq!(config.storage_root(), PathBuf::from("storage"));
    }
}
