//! External media-process capability.
//!
//! Wraps ffmpeg/ffprobe invocations behind one runner so every caller gets
//! the same contract: non-zero exit surfaces the process's stderr (bounded),
//! a blown deadline kills the child, and the argv that failed is logged.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

/// Longest stderr excerpt carried inside a [`MediaError`]. Render diagnostics
/// are shown to API callers, so the tail of a multi-megabyte ffmpeg log is
/// cut here.
const MAX_DIAGNOSTIC_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("{command} timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },

    #[error("unusable media output: {0}")]
    Invalid(String),

    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs ffmpeg/ffprobe commands for the transcoder and the render assembler.
pub struct FfmpegRunner {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Run ffmpeg with the given arguments under a deadline.
    ///
    /// The child is spawned with `kill_on_drop`, so hitting the deadline
    /// terminates the process rather than leaving it running detached.
    pub async fn run_ffmpeg(&self, args: &[String], timeout: Duration) -> Result<(), MediaError> {
        debug!(bin = %self.ffmpeg_bin, args = ?args, "Running ffmpeg");

        let output_fut = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, output_fut).await {
            Ok(result) => result.map_err(|source| MediaError::Spawn {
                command: self.ffmpeg_bin.clone(),
                source,
            })?,
            Err(_) => {
                error!(bin = %self.ffmpeg_bin, timeout_secs = timeout.as_secs(), "ffmpeg timed out");
                return Err(MediaError::TimedOut {
                    command: self.ffmpeg_bin.clone(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = truncate_diagnostic(&String::from_utf8_lossy(&output.stderr));
            let status = output.status.code().unwrap_or(-1);
            error!(bin = %self.ffmpeg_bin, status, stderr = %stderr, "ffmpeg failed");
            return Err(MediaError::Failed {
                command: self.ffmpeg_bin.clone(),
                status,
                stderr,
            });
        }

        Ok(())
    }

    /// Probe a media file's container duration in seconds.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let output_fut = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(15), output_fut)
            .await
            .map_err(|_| MediaError::TimedOut {
                command: self.ffprobe_bin.clone(),
                timeout_secs: 15,
            })?
            .map_err(|source| MediaError::Spawn {
                command: self.ffprobe_bin.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::Failed {
                command: self.ffprobe_bin.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: truncate_diagnostic(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let trimmed = text.trim();
        trimmed
            .parse::<f64>()
            .map_err(|_| MediaError::Invalid(format!("ffprobe duration '{}' not parseable", trimmed)))
    }
}

/// Clamp diagnostic text to [`MAX_DIAGNOSTIC_LEN`] on a char boundary.
pub fn truncate_diagnostic(text: &str) -> String {
    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_diagnostic_short_passthrough() {
        assert_eq!(truncate_diagnostic("short"), "short");
    }

    #[test]
    fn test_truncate_diagnostic_bounds_length() {
        let long = "e".repeat(5000);
        assert_eq!(truncate_diagnostic(&long).len(), MAX_DIAGNOSTIC_LEN);
    }

    #[test]
    fn test_truncate_diagnostic_respects_char_boundary() {
        let long = "ü".repeat(3000);
        let out = truncate_diagnostic(&long);
        assert!(out.len() <= MAX_DIAGNOSTIC_LEN);
        assert!(out.chars().all(|c| c == 'ü'));
    }
}
