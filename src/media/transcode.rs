//! Decode capability: raw chunk bytes → normalized mono WAV + duration.
//!
//! Each decode works inside its own temp directory. The directory handle
//! rides inside [`DecodedAudio`], so the scratch files are released when the
//! value drops — on success, on transcription failure, on any failure after.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{LittleEndian, ReadBytesExt};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::media::format::ChunkFormat;
use crate::media::runner::{FfmpegRunner, MediaError};

/// A normalized waveform ready for the ASR capability.
///
/// Holds the scratch [`TempDir`] alive; `wav_path` points inside it.
pub struct DecodedAudio {
    pub wav_path: PathBuf,
    pub duration_seconds: f64,
    _scratch: TempDir,
}

impl DecodedAudio {
    /// Assemble from parts; `scratch` owns the waveform's directory and is
    /// released when the value drops.
    pub fn new(wav_path: PathBuf, duration_seconds: f64, scratch: TempDir) -> Self {
        Self {
            wav_path,
            duration_seconds,
            _scratch: scratch,
        }
    }
}

/// Transcode capability consumed by the chunk pipeline.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, bytes: &[u8], format: ChunkFormat) -> Result<DecodedAudio, MediaError>;
}

/// ffmpeg-backed transcoder producing mono PCM16 WAV at a fixed sample rate.
pub struct FfmpegTranscoder {
    runner: Arc<FfmpegRunner>,
    sample_rate: u32,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(runner: Arc<FfmpegRunner>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            runner,
            sample_rate,
            timeout,
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, bytes: &[u8], format: ChunkFormat) -> Result<DecodedAudio, MediaError> {
        let scratch = tempfile::Builder::new().prefix("dub_chunk_").tempdir()?;
        let in_path = scratch.path().join(format!("in.{}", format.extension()));
        let out_path = scratch.path().join("out.wav");

        tokio::fs::write(&in_path, bytes).await?;

        let mut args: Vec<String> = vec!["-y".to_string()];
        // Chunked webm/ogg often arrives without a complete header; force the
        // demuxer instead of letting probing fail on it.
        if let Some(demuxer) = format.forced_demuxer() {
            args.push("-f".to_string());
            args.push(demuxer.to_string());
        }
        args.extend([
            "-i".to_string(),
            in_path.to_string_lossy().into_owned(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            out_path.to_string_lossy().into_owned(),
        ]);

        self.runner.run_ffmpeg(&args, self.timeout).await?;

        // Duration is best-effort: probe the input container first, fall back
        // to the decoded WAV's own header, and let the pipeline's minimum
        // span cover anything that reports zero.
        let duration_seconds = match self.runner.probe_duration(&in_path).await {
            Ok(dur) if dur > 0.0 => dur,
            Ok(_) | Err(_) => match wav_duration_seconds(&out_path) {
                Ok(dur) => dur,
                Err(err) => {
                    warn!(error = %err, "Duration probe and WAV fallback both failed");
                    0.0
                }
            },
        };

        debug!(
            bytes = bytes.len(),
            format = ?format,
            duration_seconds,
            "Chunk transcoded"
        );

        Ok(DecodedAudio {
            wav_path: out_path,
            duration_seconds,
            _scratch: scratch,
        })
    }
}

/// Read a WAV file's duration from its `fmt `/`data` chunks.
pub fn wav_duration_seconds(path: &Path) -> Result<f64, MediaError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    if &tag != b"RIFF" {
        return Err(MediaError::Invalid("missing RIFF header".to_string()));
    }
    reader.read_u32::<LittleEndian>()?; // overall size, unused
    reader.read_exact(&mut tag)?;
    if &tag != b"WAVE" {
        return Err(MediaError::Invalid("not a WAVE file".to_string()));
    }

    let mut byte_rate: Option<u32> = None;
    let mut data_len: Option<u32> = None;

    while byte_rate.is_none() || data_len.is_none() {
        if reader.read_exact(&mut tag).is_err() {
            break;
        }
        let chunk_len = reader.read_u32::<LittleEndian>()?;
        match &tag {
            b"fmt " => {
                reader.read_u16::<LittleEndian>()?; // audio format
                reader.read_u16::<LittleEndian>()?; // channels
                reader.read_u32::<LittleEndian>()?; // sample rate
                byte_rate = Some(reader.read_u32::<LittleEndian>()?);
                let remaining = chunk_len.saturating_sub(12);
                skip_padded(&mut reader, remaining as i64, chunk_len)?;
            }
            b"data" => {
                data_len = Some(chunk_len);
                skip_padded(&mut reader, chunk_len as i64, chunk_len)?;
            }
            _ => {
                skip_padded(&mut reader, chunk_len as i64, chunk_len)?;
            }
        }
    }

    match (byte_rate, data_len) {
        (Some(rate), Some(len)) if rate > 0 => Ok(len as f64 / rate as f64),
        _ => Err(MediaError::Invalid("WAV missing fmt/data chunks".to_string())),
    }
}

/// Skip `len` bytes plus the pad byte RIFF adds after odd-sized chunks.
fn skip_padded<R: Seek>(reader: &mut R, len: i64, chunk_len: u32) -> std::io::Result<()> {
    let pad = if chunk_len % 2 == 1 { 1 } else { 0 };
    reader.seek(SeekFrom::Current(len + pad))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;

    /// Build a minimal mono PCM16 WAV with the given sample count.
    fn write_test_wav(path: &Path, sample_rate: u32, samples: u32) {
        let data_len = samples * 2;
        let mut buf = Vec::new();
        buf.write_all(b"RIFF").unwrap();
        buf.write_u32::<LittleEndian>(36 + data_len).unwrap();
        buf.write_all(b"WAVE").unwrap();
        buf.write_all(b"fmt ").unwrap();
        buf.write_u32::<LittleEndian>(16).unwrap();
        buf.write_u16::<LittleEndian>(1).unwrap(); // PCM
        buf.write_u16::<LittleEndian>(1).unwrap(); // mono
        buf.write_u32::<LittleEndian>(sample_rate).unwrap();
        buf.write_u32::<LittleEndian>(sample_rate * 2).unwrap(); // byte rate
        buf.write_u16::<LittleEndian>(2).unwrap(); // block align
        buf.write_u16::<LittleEndian>(16).unwrap(); // bits per sample
        buf.write_all(b"data").unwrap();
        buf.write_u32::<LittleEndian>(data_len).unwrap();
        buf.extend(std::iter::repeat(0u8).take(data_len as usize));
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn test_wav_duration_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wav");
        write_test_wav(&path, 16000, 16000); // exactly one second
        let dur = wav_duration_seconds(&path).unwrap();
        assert!((dur - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_wav_duration_half_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wav");
        write_test_wav(&path, 16000, 8000);
        let dur = wav_duration_seconds(&path).unwrap();
        assert!((dur - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_wav_duration_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wav");
        std::fs::write(&path, b"not a wav at all").unwrap();
        assert!(wav_duration_seconds(&path).is_err());
    }
}
