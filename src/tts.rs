//! # Speech Synthesis Capability
//!
//! Synthesis runs behind [`SpeechSynthesizer`] so any conforming backend can
//! substitute. The shipped implementation drives the Google Translate TTS
//! endpoint: long text is split on whitespace into request-sized pieces and
//! the returned MP3 frames are concatenated into one artifact.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::TtsConfig;

/// The endpoint rejects queries past ~100 characters, matching the limit the
/// web client enforces.
const MAX_CHARS_PER_REQUEST: usize = 100;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tts api error {status}: {body}")]
    Api { status: u16, body: String },
}

/// Speech-synthesis capability: text + language in, encoded audio out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, TtsError>;

    /// MIME type of the produced audio.
    fn mime(&self) -> &'static str;
}

pub struct GoogleTranslateTts {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslateTts {
    pub fn new(cfg: &TtsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_part(
        &self,
        part: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, TtsError> {
        let total_field = total.to_string();
        let idx_field = idx.to_string();
        let textlen_field = part.chars().count().to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("q", part),
                ("tl", lang),
                ("total", total_field.as_str()),
                ("idx", idx_field.as_str()),
                ("textlen", textlen_field.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status,
                body: body.chars().take(300).collect(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, TtsError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let parts = split_for_synthesis(text, MAX_CHARS_PER_REQUEST);
        let total = parts.len();
        let mut audio = Vec::new();
        for (idx, part) in parts.iter().enumerate() {
            let bytes = self.fetch_part(part, lang, idx, total).await?;
            audio.extend_from_slice(&bytes);
        }

        debug!(
            parts = total,
            bytes = audio.len(),
            lang,
            "Speech synthesis completed"
        );
        Ok(audio)
    }

    fn mime(&self) -> &'static str {
        "audio/mpeg"
    }
}

/// Split text into whitespace-respecting pieces of at most `max_chars`
/// characters. A single word longer than the limit is hard-split so the
/// request can never exceed it.
pub fn split_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                parts.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_part() {
        let parts = split_for_synthesis("hello world", 100);
        assert_eq!(parts, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_split_respects_word_boundaries() {
        let parts = split_for_synthesis("aaa bbb ccc ddd", 7);
        assert_eq!(
            parts,
            vec!["aaa bbb".to_string(), "ccc ddd".to_string()]
        );
        assert!(parts.iter().all(|p| p.chars().count() <= 7));
    }

    #[test]
    fn test_oversized_word_hard_split() {
        let parts = split_for_synthesis("abcdefghij", 4);
        assert_eq!(
            parts,
            vec!["abcd".to_string(), "efgh".to_string(), "ij".to_string()]
        );
    }

    #[test]
    fn test_empty_text_no_parts() {
        assert!(split_for_synthesis("", 100).is_empty());
        assert!(split_for_synthesis("   ", 100).is_empty());
    }
}
