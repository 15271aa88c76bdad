//! # Media Module
//!
//! Everything that touches ffmpeg/ffprobe or raw container formats.
//!
//! ## Key Components:
//! - **Format table**: explicit declared-media-type → decode format mapping
//! - **Runner**: the external media-process capability (spawn, bounded
//!   diagnostics, timeout with kill)
//! - **Transcoder**: chunk bytes → normalized mono 16 kHz WAV plus duration,
//!   scoped to a temp directory that is released on every exit path

pub mod format;
pub mod runner;
pub mod transcode;

pub use format::ChunkFormat;
pub use runner::{FfmpegRunner, MediaError};
pub use transcode::{DecodedAudio, FfmpegTranscoder, Transcoder};
