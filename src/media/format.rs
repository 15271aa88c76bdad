//! Declared media type → decode format classification.
//!
//! Browsers label recorded chunks inconsistently (`audio/webm;codecs=opus`,
//! `video/webm`, `audio/ogg`, ...). The table below enumerates every media
//! type we accept instead of substring-matching the header, so a type like
//! `audio/mp4` can never match two formats at once. Unrecognized types fall
//! back to WebM, the MediaRecorder default.

use serde::Serialize;

/// Container/codec classification for a submitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkFormat {
    Webm,
    Ogg,
    Wav,
    Mp3,
    Mp4,
}

impl ChunkFormat {
    /// Classify a declared content type.
    ///
    /// Parameters (`; codecs=...`) are stripped and matching is
    /// case-insensitive on the bare `type/subtype`.
    pub fn from_content_type(content_type: &str) -> ChunkFormat {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "audio/webm" | "video/webm" => ChunkFormat::Webm,
            "audio/ogg" | "application/ogg" | "audio/opus" => ChunkFormat::Ogg,
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => ChunkFormat::Wav,
            "audio/mpeg" | "audio/mp3" => ChunkFormat::Mp3,
            "audio/mp4" | "video/mp4" | "audio/m4a" | "audio/x-m4a" => ChunkFormat::Mp4,
            _ => ChunkFormat::Webm,
        }
    }

    /// File suffix used for the scratch input handed to ffmpeg.
    pub fn extension(&self) -> &'static str {
        match self {
            ChunkFormat::Webm => "webm",
            ChunkFormat::Ogg => "ogg",
            ChunkFormat::Wav => "wav",
            ChunkFormat::Mp3 => "mp3",
            ChunkFormat::Mp4 => "mp4",
        }
    }

    /// Demuxer to force with `-f`.
    ///
    /// Mid-recording WebM/Ogg chunks often lack a complete header, so format
    /// probing is bypassed for them; the remaining formats are left to
    /// ffmpeg's own detection.
    pub fn forced_demuxer(&self) -> Option<&'static str> {
        match self {
            ChunkFormat::Webm => Some("webm"),
            ChunkFormat::Ogg => Some("ogg"),
            ChunkFormat::Wav | ChunkFormat::Mp3 | ChunkFormat::Mp4 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(ChunkFormat::from_content_type("audio/webm"), ChunkFormat::Webm);
        assert_eq!(ChunkFormat::from_content_type("video/webm"), ChunkFormat::Webm);
        assert_eq!(ChunkFormat::from_content_type("audio/ogg"), ChunkFormat::Ogg);
        assert_eq!(ChunkFormat::from_content_type("application/ogg"), ChunkFormat::Ogg);
        assert_eq!(ChunkFormat::from_content_type("audio/wav"), ChunkFormat::Wav);
        assert_eq!(ChunkFormat::from_content_type("audio/x-wav"), ChunkFormat::Wav);
        assert_eq!(ChunkFormat::from_content_type("audio/mpeg"), ChunkFormat::Mp3);
        assert_eq!(ChunkFormat::from_content_type("audio/mp3"), ChunkFormat::Mp3);
        assert_eq!(ChunkFormat::from_content_type("audio/mp4"), ChunkFormat::Mp4);
        assert_eq!(ChunkFormat::from_content_type("audio/x-m4a"), ChunkFormat::Mp4);
    }

    #[test]
    fn test_parameters_stripped() {
        assert_eq!(
            ChunkFormat::from_content_type("audio/webm;codecs=opus"),
            ChunkFormat::Webm
        );
        assert_eq!(
            ChunkFormat::from_content_type("audio/ogg; codecs=vorbis"),
            ChunkFormat::Ogg
        );
        assert_eq!(ChunkFormat::from_content_type("AUDIO/WAV"), ChunkFormat::Wav);
    }

    #[test]
    fn test_unknown_defaults_to_webm() {
        assert_eq!(ChunkFormat::from_content_type(""), ChunkFormat::Webm);
        assert_eq!(ChunkFormat::from_content_type("text/plain"), ChunkFormat::Webm);
        assert_eq!(ChunkFormat::from_content_type("audio/flac"), ChunkFormat::Webm);
    }

    #[test]
    fn test_forced_demuxer_only_for_chunked_containers() {
        assert_eq!(ChunkFormat::Webm.forced_demuxer(), Some("webm"));
        assert_eq!(ChunkFormat::Ogg.forced_demuxer(), Some("ogg"));
        assert_eq!(ChunkFormat::Wav.forced_demuxer(), None);
        assert_eq!(ChunkFormat::Mp3.forced_demuxer(), None);
        assert_eq!(ChunkFormat::Mp4.forced_demuxer(), None);
    }
}
