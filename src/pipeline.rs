//! # Chunk Pipeline
//!
//! Per-chunk sequential workflow: decode → transcribe → timeline allocation
//! → translate → synthesize → persist. Stages run strictly in order, each
//! depending on the previous one succeeding.
//!
//! ## Timeline rules:
//! - The cursor advances by `max(min_chunk_ms, round(duration * 1000))`
//!   only once transcription has succeeded — including when the transcript
//!   is empty, so later chunks stay aligned with the source video.
//! - Decode or transcription failure leaves the session untouched.
//! - Synthesis failure fails the chunk after the cursor already moved; the
//!   dub timeline keeps the slot but records no segment.
//!
//! The per-session work lock is held for the whole run, so concurrent
//! submissions for one session process one at a time while other sessions
//! proceed in parallel. Decode scratch space lives in the [`DecodedAudio`]
//! guard and is released on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::asr::TranscriptionEngine;
use crate::media::{ChunkFormat, Transcoder};
use crate::session::{Segment, SessionError, SessionStore};
use crate::translate::TranslatorOrchestrator;
use crate::tts::SpeechSynthesizer;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("ASR failed: {0}")]
    Transcription(String),

    #[error("TTS failed: {0}")]
    Synthesis(String),

    #[error("artifact store failed: {0}")]
    Storage(#[from] std::io::Error),
}

/// One submitted chunk, as received at the boundary.
pub struct ChunkRequest {
    pub session_id: String,
    pub audio: Vec<u8>,
    pub format: ChunkFormat,
    pub client_ts: i64,
    pub source_lang: String,
    pub target_lang: String,
}

/// What the caller gets back. All fields are empty (and `audio` zero-length)
/// when the empty-transcript short-circuit applied.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub text: String,
    pub translated_text: String,
    pub audio: Vec<u8>,
    pub mime: String,
    /// The caller-supplied timestamp, echoed, never reinterpreted.
    pub client_ts: i64,
}

pub struct ChunkPipeline {
    store: Arc<SessionStore>,
    transcoder: Arc<dyn Transcoder>,
    asr: Arc<dyn TranscriptionEngine>,
    translator: Arc<TranslatorOrchestrator>,
    tts: Arc<dyn SpeechSynthesizer>,
    audio_dir: PathBuf,
    min_chunk_ms: u64,
}

impl ChunkPipeline {
    pub fn new(
        store: Arc<SessionStore>,
        transcoder: Arc<dyn Transcoder>,
        asr: Arc<dyn TranscriptionEngine>,
        translator: Arc<TranslatorOrchestrator>,
        tts: Arc<dyn SpeechSynthesizer>,
        audio_dir: PathBuf,
        min_chunk_ms: u64,
    ) -> Self {
        Self {
            store,
            transcoder,
            asr,
            translator,
            tts,
            audio_dir,
            min_chunk_ms,
        }
    }

    pub async fn process(&self, req: ChunkRequest) -> Result<ChunkOutcome, PipelineError> {
        let handle = self.store.handle(&req.session_id)?;
        let _work = handle.work.lock().await;

        // 1. Decode. The scratch directory inside `decoded` is dropped on
        //    every path out of this function.
        let decoded = self
            .transcoder
            .transcode(&req.audio, req.format)
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        info!(
            sid = %req.session_id,
            bytes = req.audio.len(),
            duration_secs = decoded.duration_seconds,
            "Chunk decoded"
        );

        // 2. Transcribe. Failure aborts before any session mutation.
        let text = self
            .asr
            .transcribe(&decoded.wav_path)
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;
        info!(sid = %req.session_id, text = %text, "Chunk transcribed");

        // 3. Timeline allocation. Runs even for an empty transcript so the
        //    next chunk lands at the right offset.
        let add_ms = ((decoded.duration_seconds * 1000.0).round() as u64).max(self.min_chunk_ms);
        let (start_ms, end_ms) = self.store.advance_cursor(&req.session_id, add_ms)?;

        // 4. Empty-transcript short-circuit: the slot is consumed but no
        //    segment is recorded.
        if text.is_empty() {
            info!(sid = %req.session_id, "Empty transcript, skipping translate/TTS");
            self.store.increment_chunks(&req.session_id)?;
            return Ok(ChunkOutcome {
                text: String::new(),
                translated_text: String::new(),
                audio: Vec::new(),
                mime: String::new(),
                client_ts: req.client_ts,
            });
        }

        // 5. Translate. Never fails terminally; degrades to the original.
        let translation = self
            .translator
            .translate(&text, &req.source_lang, &req.target_lang)
            .await;
        if translation.is_degraded() {
            warn!(sid = %req.session_id, "Translation degraded to original text");
        }

        // 6. Synthesize the translated text (or the original when the chain
        //    produced nothing usable).
        let speak = if translation.text.is_empty() {
            text.as_str()
        } else {
            translation.text.as_str()
        };
        let audio = self
            .tts
            .synthesize(speak, &req.target_lang)
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        // 7. Persist the artifact and record the segment.
        let audio_path = self.persist_artifact(&req.session_id, &audio).await?;
        self.store.append_segment(
            &req.session_id,
            Segment {
                start_ms,
                end_ms,
                text: text.clone(),
                translated_text: translation.text.clone(),
                audio_path,
            },
        )?;
        let chunks = self.store.increment_chunks(&req.session_id)?;
        info!(sid = %req.session_id, chunks, start_ms, end_ms, "Chunk processed");

        Ok(ChunkOutcome {
            text,
            translated_text: translation.text,
            audio,
            mime: self.tts.mime().to_string(),
            client_ts: req.client_ts,
        })
    }

    /// Store synthesized audio under `<sid>_<millis>.<ext>`. The per-session
    /// work lock makes the wall-clock name monotonically increasing within a
    /// session.
    async fn persist_artifact(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<PathBuf, std::io::Error> {
        let ext = match self.tts.mime() {
            "audio/mpeg" => "mp3",
            "audio/wav" => "wav",
            _ => "bin",
        };
        let name = format!("{}_{}.{}", session_id, Utc::now().timestamp_millis(), ext);
        let path = self.audio_dir.join(name);
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::write(&path, audio).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::AsrError;
    use crate::media::transcode::DecodedAudio;
    use crate::media::MediaError;
    use crate::tts::TtsError;
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeTranscoder {
        duration: f64,
        fail: bool,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            _bytes: &[u8],
            _format: ChunkFormat,
        ) -> Result<DecodedAudio, MediaError> {
            if self.fail {
                return Err(MediaError::Invalid("bad container".to_string()));
            }
            let scratch = tempfile::tempdir().unwrap();
            let wav_path = scratch.path().join("out.wav");
            std::fs::write(&wav_path, b"fake wav").unwrap();
            Ok(DecodedAudio::new(wav_path, self.duration, scratch))
        }
    }

    struct FakeAsr {
        text: Option<&'static str>,
    }

    #[async_trait]
    impl TranscriptionEngine for FakeAsr {
        async fn transcribe(&self, _wav_path: &Path) -> Result<String, AsrError> {
            match self.text {
                Some(text) => Ok(text.to_string()),
                None => Err(AsrError::ApiRequestFailed("asr down".to_string())),
            }
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeTts {
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeTts {
        async fn synthesize(&self, _text: &str, _lang: &str) -> Result<Vec<u8>, TtsError> {
            if self.fail {
                return Err(TtsError::Api {
                    status: 500,
                    body: "tts down".to_string(),
                });
            }
            Ok(b"MP3DATA".to_vec())
        }

        fn mime(&self) -> &'static str {
            "audio/mpeg"
        }
    }

    struct Fixture {
        store: Arc<SessionStore>,
        audio_dir: tempfile::TempDir,
    }

    fn pipeline(
        duration: f64,
        decode_fail: bool,
        asr_text: Option<&'static str>,
        tts_fail: bool,
    ) -> (ChunkPipeline, Fixture) {
        let store = Arc::new(SessionStore::new(10));
        let audio_dir = tempfile::tempdir().unwrap();
        let pipeline = ChunkPipeline::new(
            store.clone(),
            Arc::new(FakeTranscoder {
                duration,
                fail: decode_fail,
            }),
            Arc::new(FakeAsr { text: asr_text }),
            // An empty chain always degrades to the original text.
            Arc::new(TranslatorOrchestrator::new(vec![])),
            Arc::new(FakeTts { fail: tts_fail }),
            audio_dir.path().to_path_buf(),
            200,
        );
        (pipeline, Fixture { store, audio_dir })
    }

    fn request(session_id: &str) -> ChunkRequest {
        ChunkRequest {
            session_id: session_id.to_string(),
            audio: vec![1, 2, 3],
            format: ChunkFormat::Webm,
            client_ts: 42,
            source_lang: "en".to_string(),
            target_lang: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_chunk_records_segment() {
        let (pipeline, fx) = pipeline(1.0, false, Some("hello there"), false);
        let id = fx.store.create().unwrap();

        let outcome = pipeline.process(request(&id)).await.unwrap();
        assert_eq!(outcome.text, "hello there");
        assert_eq!(outcome.translated_text, "hello there"); // degraded chain
        assert_eq!(outcome.audio, b"MP3DATA");
        assert_eq!(outcome.mime, "audio/mpeg");
        assert_eq!(outcome.client_ts, 42);

        let session = fx.store.get(&id).unwrap();
        assert_eq!(session.timeline_cursor_ms, 1000);
        assert_eq!(session.chunk_count, 1);
        assert_eq!(session.segments.len(), 1);
        assert_eq!(session.segments[0].start_ms, 0);
        assert_eq!(session.segments[0].end_ms, 1000);
        assert!(session.segments[0].audio_path.exists());
        assert!(session.segments[0]
            .audio_path
            .starts_with(fx.audio_dir.path()));
    }

    #[tokio::test]
    async fn test_timeline_monotonicity_and_contiguity() {
        // Durations below the floor consume min_chunk_ms; end offsets are the
        // running sum of max(200, round(d * 1000)).
        let durations = [1.0, 0.05, 2.3];
        let expected_ends = [1000u64, 1200, 3500];

        let store = Arc::new(SessionStore::new(10));
        let audio_dir = tempfile::tempdir().unwrap();
        let id = store.create().unwrap();

        for (duration, expected_end) in durations.iter().zip(expected_ends.iter()) {
            let pipeline = ChunkPipeline::new(
                store.clone(),
                Arc::new(FakeTranscoder {
                    duration: *duration,
                    fail: false,
                }),
                Arc::new(FakeAsr { text: Some("words") }),
                Arc::new(TranslatorOrchestrator::new(vec![])),
                Arc::new(FakeTts { fail: false }),
                audio_dir.path().to_path_buf(),
                200,
            );
            pipeline.process(request(&id)).await.unwrap();
            assert_eq!(store.get(&id).unwrap().timeline_cursor_ms, *expected_end);
        }

        let session = store.get(&id).unwrap();
        assert_eq!(session.segments.len(), 3);
        for pair in session.segments.windows(2) {
            assert_eq!(pair[1].start_ms, pair[0].end_ms);
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_short_circuit() {
        let (pipeline, fx) = pipeline(1.5, false, Some(""), false);
        let id = fx.store.create().unwrap();

        let outcome = pipeline.process(request(&id)).await.unwrap();
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.translated_text, "");
        assert!(outcome.audio.is_empty());
        assert_eq!(outcome.mime, "");
        assert_eq!(outcome.client_ts, 42);

        let session = fx.store.get(&id).unwrap();
        assert_eq!(session.timeline_cursor_ms, 1500); // cursor still advanced
        assert_eq!(session.chunk_count, 1);
        assert!(session.segments.is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_session_untouched() {
        let (pipeline, fx) = pipeline(1.0, true, Some("hello"), false);
        let id = fx.store.create().unwrap();

        let err = pipeline.process(request(&id)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));

        let session = fx.store.get(&id).unwrap();
        assert_eq!(session.timeline_cursor_ms, 0);
        assert_eq!(session.chunk_count, 0);
        assert!(session.segments.is_empty());
    }

    #[tokio::test]
    async fn test_transcription_failure_leaves_cursor_untouched() {
        let (pipeline, fx) = pipeline(1.0, false, None, false);
        let id = fx.store.create().unwrap();

        let err = pipeline.process(request(&id)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transcription(_)));

        let session = fx.store.get(&id).unwrap();
        assert_eq!(session.timeline_cursor_ms, 0);
        assert_eq!(session.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_advanced_cursor() {
        // The cursor moves on transcription success and is not rolled back
        // when synthesis fails; the slot stays consumed with no segment.
        let (pipeline, fx) = pipeline(1.0, false, Some("hello"), true);
        let id = fx.store.create().unwrap();

        let err = pipeline.process(request(&id)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));

        let session = fx.store.get(&id).unwrap();
        assert_eq!(session.timeline_cursor_ms, 1000);
        assert_eq!(session.chunk_count, 0);
        assert!(session.segments.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_before_decode() {
        let (pipeline, _fx) = pipeline(1.0, false, Some("hello"), false);
        let err = pipeline.process(request("nope")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Session(SessionError::NotFound(_))
        ));
    }
}
