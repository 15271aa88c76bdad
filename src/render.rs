//! # Render Assembler
//!
//! Deferred assembly of the final dubbed video from a session's full segment
//! history plus its uploaded source video:
//!
//! 1. Write the caption file (chunk-level captions, translated or original)
//! 2. Build one dubbed audio track: every surviving synthesized clip is
//!    delayed to its timeline start and the delayed streams are summed
//! 3. Mux the original video stream with the dubbed track, optionally
//!    burning the captions into the picture
//!
//! A missing synthesized clip is skipped, not fatal — a render must not fail
//! because one artifact disappeared from disk. Subprocess failures surface
//! the process's bounded stderr and leave partial outputs in place for
//! inspection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::media::{FfmpegRunner, MediaError};
use crate::session::{Segment, SessionError, SessionStore};
use crate::subtitles::{captions_from_segments, to_srt};

/// Default burn-in styling: legible size, outline, lifted off the bottom edge.
const SUBTITLE_STYLE: &str = "Fontsize=24,Outline=1,MarginV=30";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("video not uploaded for this session")]
    MissingVideo,

    #[error("no audio segments to render")]
    NoSegments,

    #[error("no synthesized audio available from segments")]
    NoAudibleStreams,

    #[error("a render is already running for this session")]
    AlreadyRunning,

    #[error("caption file write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Media(#[from] MediaError),
}

pub struct RenderOutput {
    pub final_path: PathBuf,
    pub caption_path: PathBuf,
}

pub struct RenderAssembler {
    store: Arc<SessionStore>,
    runner: Arc<FfmpegRunner>,
    video_dir: PathBuf,
    timeout: Duration,
}

impl RenderAssembler {
    pub fn new(
        store: Arc<SessionStore>,
        runner: Arc<FfmpegRunner>,
        video_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            runner,
            video_dir,
            timeout,
        }
    }

    /// Assemble the final video for a session.
    ///
    /// Preconditions are checked before any subprocess runs; the render
    /// observes a snapshot of the segment list taken at invocation, so
    /// chunks arriving during the render do not shift its inputs.
    pub async fn render(
        &self,
        session_id: &str,
        use_translated: bool,
        burn_subtitles: bool,
    ) -> Result<RenderOutput, RenderError> {
        let handle = self.store.handle(session_id)?;
        let _render = handle
            .render
            .try_lock()
            .map_err(|_| RenderError::AlreadyRunning)?;

        let snapshot = handle.snapshot();
        let video_path = snapshot
            .video_path
            .filter(|path| path.exists())
            .ok_or(RenderError::MissingVideo)?;
        if snapshot.segments.is_empty() {
            return Err(RenderError::NoSegments);
        }

        let sid = session_prefix(&video_path);
        let caption_path = self.video_dir.join(format!("{}_subs.srt", sid));
        let dubbed_path = self.video_dir.join(format!("{}_dubbed.m4a", sid));
        let final_path = self.video_dir.join(format!("{}_final.mp4", sid));

        // 1. Caption file
        let captions = captions_from_segments(&snapshot.segments, use_translated);
        tokio::fs::write(&caption_path, to_srt(&captions)).await?;

        // 2. Dubbed audio track
        let (inputs, filter) = build_mix_filter(&snapshot.segments);
        if inputs.is_empty() {
            return Err(RenderError::NoAudibleStreams);
        }

        let mut mix_args: Vec<String> = vec!["-y".to_string()];
        for input in &inputs {
            mix_args.push("-i".to_string());
            mix_args.push(input.to_string_lossy().into_owned());
        }
        mix_args.extend([
            "-filter_complex".to_string(),
            filter,
            "-map".to_string(),
            "[aout]".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            dubbed_path.to_string_lossy().into_owned(),
        ]);
        self.runner.run_ffmpeg(&mix_args, self.timeout).await?;

        // 3. Mux; drop the video's own audio in favor of the dubbed track
        let mut mux_args: Vec<String> = vec![
            "-y".to_string(),
            "-i".to_string(),
            video_path.to_string_lossy().into_owned(),
            "-i".to_string(),
            dubbed_path.to_string_lossy().into_owned(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
        ];
        if burn_subtitles {
            let srt_escaped = caption_path.to_string_lossy().replace('\\', "\\\\");
            mux_args.extend([
                "-vf".to_string(),
                format!("subtitles='{}':force_style='{}'", srt_escaped, SUBTITLE_STYLE),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                "veryfast".to_string(),
                "-crf".to_string(),
                "22".to_string(),
            ]);
        } else {
            mux_args.extend(["-c:v".to_string(), "copy".to_string()]);
        }
        mux_args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-shortest".to_string(),
            final_path.to_string_lossy().into_owned(),
        ]);
        self.runner.run_ffmpeg(&mux_args, self.timeout).await?;

        info!(
            sid = %session_id,
            final_path = %final_path.display(),
            caption_path = %caption_path.display(),
            streams = inputs.len(),
            "Render completed"
        );

        Ok(RenderOutput {
            final_path,
            caption_path,
        })
    }
}

/// Build the delay-mix graph over every segment whose artifact still exists.
///
/// Returns the ffmpeg input paths in order and the matching filter:
/// `[i:a]adelay=<start_ms>:all=1,volume=1[ai]` per stream, summed with
/// `amix=inputs=N:normalize=0` into `[aout]`. `adelay` pads a silence prefix
/// uniformly across channels; `normalize=0` keeps unweighted summation.
pub fn build_mix_filter(segments: &[Segment]) -> (Vec<PathBuf>, String) {
    let mut inputs = Vec::new();
    let mut entries = Vec::new();
    let mut labels = String::new();

    for segment in segments {
        if !segment.audio_path.exists() {
            warn!(path = %segment.audio_path.display(), "Segment audio missing, skipping stream");
            continue;
        }
        let idx = inputs.len();
        entries.push(format!(
            "[{idx}:a]adelay={delay}:all=1,volume=1[a{idx}]",
            idx = idx,
            delay = segment.start_ms
        ));
        labels.push_str(&format!("[a{}]", idx));
        inputs.push(segment.audio_path.clone());
    }

    if inputs.is_empty() {
        return (inputs, String::new());
    }

    entries.push(format!(
        "{}amix=inputs={}:normalize=0[aout]",
        labels,
        inputs.len()
    ));
    (inputs, entries.join(";"))
}

/// Session prefix of an uploaded video's stored filename (`<sid>_<ts>.<ext>`).
fn session_prefix(video_path: &Path) -> String {
    video_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('_').next())
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or("session")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start_ms: u64, audio_path: PathBuf) -> Segment {
        Segment {
            start_ms,
            end_ms: start_ms + 1000,
            text: "text".to_string(),
            translated_text: "translated".to_string(),
            audio_path,
        }
    }

    #[test]
    fn test_mix_filter_skips_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.mp3");
        let third = dir.path().join("c.mp3");
        std::fs::write(&first, b"x").unwrap();
        std::fs::write(&third, b"x").unwrap();

        let segments = vec![
            segment(0, first.clone()),
            segment(1000, dir.path().join("gone.mp3")),
            segment(2000, third.clone()),
        ];

        let (inputs, filter) = build_mix_filter(&segments);
        assert_eq!(inputs, vec![first, third]);
        assert_eq!(
            filter,
            "[0:a]adelay=0:all=1,volume=1[a0];\
             [1:a]adelay=2000:all=1,volume=1[a1];\
             [a0][a1]amix=inputs=2:normalize=0[aout]"
        );
    }

    #[test]
    fn test_mix_filter_empty_when_everything_missing() {
        let segments = vec![segment(0, PathBuf::from("/nonexistent/a.mp3"))];
        let (inputs, filter) = build_mix_filter(&segments);
        assert!(inputs.is_empty());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_session_prefix_extraction() {
        assert_eq!(
            session_prefix(Path::new("/videos/abc123_1700000000000.webm")),
            "abc123"
        );
        assert_eq!(session_prefix(Path::new("/videos/noseparator.mp4")), "noseparator.mp4");
        assert_eq!(session_prefix(Path::new("")), "session");
    }

    fn assembler(store: Arc<SessionStore>, video_dir: PathBuf) -> RenderAssembler {
        RenderAssembler::new(
            store,
            Arc::new(FfmpegRunner::new("ffmpeg", "ffprobe")),
            video_dir,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_render_requires_uploaded_video() {
        let store = Arc::new(SessionStore::new(10));
        let id = store.create().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = assembler(store, dir.path().to_path_buf())
            .render(&id, true, true)
            .await;
        assert!(matches!(result, Err(RenderError::MissingVideo)));
    }

    #[tokio::test]
    async fn test_render_requires_segments() {
        let store = Arc::new(SessionStore::new(10));
        let id = store.create().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let video = dir.path().join(format!("{}_1.webm", id));
        std::fs::write(&video, b"video").unwrap();
        store.set_video_path(&id, video).unwrap();

        let result = assembler(store, dir.path().to_path_buf())
            .render(&id, true, true)
            .await;
        assert!(matches!(result, Err(RenderError::NoSegments)));
    }

    #[tokio::test]
    async fn test_render_rejects_unknown_session() {
        let store = Arc::new(SessionStore::new(10));
        let dir = tempfile::tempdir().unwrap();
        let result = assembler(store, dir.path().to_path_buf())
            .render("missing", true, true)
            .await;
        assert!(matches!(
            result,
            Err(RenderError::Session(SessionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_second_render_conflicts() {
        let store = Arc::new(SessionStore::new(10));
        let id = store.create().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let handle = store.handle(&id).unwrap();
        let _held = handle.render.lock().await;

        let result = assembler(store.clone(), dir.path().to_path_buf())
            .render(&id, true, true)
            .await;
        assert!(matches!(result, Err(RenderError::AlreadyRunning)));
    }
}
