//! # Transcription Capability
//!
//! Speech recognition runs out of process behind [`TranscriptionEngine`];
//! any conforming backend can be substituted. Two HTTP engines ship here:
//!
//! - **Voxtral**: Mistral's audio-capable chat-completions endpoint, fed the
//!   normalized WAV as base64 `input_audio`
//! - **Whisper API**: any OpenAI-compatible `/audio/transcriptions` endpoint
//!   taking a multipart WAV upload
//!
//! The factory at the bottom picks one from configuration at startup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AsrConfig;

/// First ~500 bytes of an error body, cut on a char boundary.
fn snip(body: &str) -> &str {
    let mut end = body.len().min(500);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("waveform unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Transcription capability: normalized mono WAV path in, recognized text
/// out. Empty text is a valid result (silence), not an error.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, wav_path: &Path) -> Result<String, AsrError>;

    /// Short provider label for health reporting.
    fn name(&self) -> &'static str;
}

/// ASR via Mistral's Voxtral chat-completions endpoint.
pub struct VoxtralEngine {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl VoxtralEngine {
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        if api_key.is_empty() {
            anyhow::bail!("Voxtral ASR requires an API key (MISTRAL_API_KEY)");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TranscriptionEngine for VoxtralEngine {
    async fn transcribe(&self, wav_path: &Path) -> Result<String, AsrError> {
        let audio_bytes = tokio::fs::read(wav_path).await?;
        let audio_b64 = base64::engine::general_purpose::STANDARD.encode(&audio_bytes);

        let payload = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "input_audio", "input_audio": audio_b64},
                    {"type": "text", "text": "Transcribe the audio accurately. Respond with only the transcript."}
                ]
            }]
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AsrError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AsrError::ApiRequestFailed(format!(
                "status {}: {}",
                status,
                snip(&body)
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AsrError::ApiRequestFailed(format!("body: {}", e)))?;

        let text = parse_chat_transcript(&data);
        if text.is_empty() {
            warn!("Voxtral returned an empty transcript payload");
        } else {
            debug!(chars = text.len(), "Voxtral transcription completed");
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "voxtral"
    }
}

/// Extract the transcript from a chat-completions response.
///
/// `choices[0].message.content` is either a plain string or a list of typed
/// parts; some providers also put the text directly on the message.
fn parse_chat_transcript(payload: &Value) -> String {
    let message = match payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|first| first.get("message"))
    {
        Some(message) => message,
        None => return String::new(),
    };

    match message.get("content") {
        Some(Value::String(content)) => content.trim().to_string(),
        Some(Value::Array(parts)) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter(|part| {
                    matches!(
                        part.get("type").and_then(Value::as_str),
                        Some("text") | Some("output_text")
                    )
                })
                .filter_map(|part| {
                    part.get("text")
                        .or_else(|| part.get("content"))
                        .and_then(Value::as_str)
                })
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            texts.join(" ")
        }
        _ => message
            .get("text")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
    }
}

/// ASR via an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct WhisperApiEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperApiEngine {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperApiEngine {
    async fn transcribe(&self, wav_path: &Path) -> Result<String, AsrError> {
        let audio_bytes = tokio::fs::read(wav_path).await?;

        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );

        let file_part = multipart::Part::bytes(audio_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| AsrError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AsrError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AsrError::ApiRequestFailed(format!(
                "status {}: {}",
                status,
                snip(&body)
            )));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| AsrError::ApiRequestFailed(format!("body: {}", e)))?;

        debug!(chars = transcript.len(), "Whisper API transcription completed");
        Ok(transcript.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "whisper_api"
    }
}

/// Build the configured engine. Fails fast at startup on a missing key
/// rather than on the first chunk.
pub fn engine_from_config(cfg: &AsrConfig) -> anyhow::Result<Arc<dyn TranscriptionEngine>> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    match cfg.provider.as_str() {
        "voxtral" => Ok(Arc::new(VoxtralEngine::new(
            cfg.api_url.clone(),
            cfg.api_key.clone(),
            cfg.model.clone(),
            timeout,
        )?)),
        "whisper_api" => Ok(Arc::new(WhisperApiEngine::new(
            cfg.api_url.clone(),
            cfg.api_key.clone(),
            cfg.model.clone(),
            timeout,
        )?)),
        other => anyhow::bail!("unknown ASR provider '{}'", other),
    }
}
