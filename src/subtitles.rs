//! # Subtitle Builder
//!
//! Derives time-coded caption entries from two independent sources that share
//! one output shape:
//!
//! - **Word-level mode**: groups `(word, start, end)` triples into readable
//!   captions, flushing on silence gaps, span length, or character count
//! - **Chunk-level mode**: one caption per recorded segment, choosing
//!   translated or original text per flag
//!
//! Both feed the same SRT serializer. Caption generation is pure — rerunning
//! it over unchanged input yields byte-identical output.

use crate::session::Segment;

/// One caption entry; recomputed on each render, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// A recognized word with its time span in seconds.
#[derive(Debug, Clone)]
pub struct WordSpan {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Word-grouping thresholds.
#[derive(Debug, Clone)]
pub struct SubtitleOptions {
    /// Flush when the accumulated text reaches this many characters.
    pub max_chars: usize,
    /// Flush when the accumulated span reaches this many seconds.
    pub max_span_secs: f64,
    /// Flush when the silence since the previous word exceeds this.
    pub max_gap_secs: f64,
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            max_chars: 80,
            max_span_secs: 3.5,
            max_gap_secs: 0.6,
        }
    }
}

/// Span a zero-length word caption is stretched to.
const WORD_MIN_SPAN_SECS: f64 = 0.8;

/// Minimum span of a chunk-level caption, in milliseconds.
const CHUNK_MIN_SPAN_MS: u64 = 200;

/// Group word-level timestamps into captions.
pub fn captions_from_words(words: &[WordSpan], opts: &SubtitleOptions) -> Vec<Caption> {
    let mut captions = Vec::new();
    let mut current: Vec<&WordSpan> = Vec::new();
    let mut last_end: Option<f64> = None;

    fn flush(current: &mut Vec<&WordSpan>, captions: &mut Vec<Caption>) {
        if current.is_empty() {
            return;
        }
        let start = current[0].start;
        let mut end = current[current.len() - 1].end;
        if end <= start {
            end = start + WORD_MIN_SPAN_SECS;
        }
        let text = current
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        captions.push(Caption {
            start_ms: secs_to_ms(start),
            end_ms: secs_to_ms(end),
            text,
        });
        current.clear();
    }

    for word in words {
        if word.word.is_empty() {
            continue;
        }
        if let Some(prev_end) = last_end {
            if word.start - prev_end > opts.max_gap_secs {
                flush(&mut current, &mut captions);
            }
        }
        current.push(word);
        last_end = Some(word.end);

        let span = current[current.len() - 1].end - current[0].start;
        let chars: usize = current.iter().map(|w| w.word.chars().count() + 1).sum();
        if span >= opts.max_span_secs || chars >= opts.max_chars {
            flush(&mut current, &mut captions);
        }
    }

    flush(&mut current, &mut captions);
    captions
}

/// One caption per segment with non-empty text, clamped to a readable span.
pub fn captions_from_segments(segments: &[Segment], use_translated: bool) -> Vec<Caption> {
    let mut captions = Vec::new();
    for segment in segments {
        let raw = if use_translated {
            &segment.translated_text
        } else {
            &segment.text
        };
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let start_ms = segment.start_ms;
        let end_ms = segment.end_ms.max(start_ms + CHUNK_MIN_SPAN_MS);
        captions.push(Caption {
            start_ms,
            end_ms,
            text: text.to_string(),
        });
    }
    captions
}

/// Serialize captions as SRT: 1-based index, `HH:MM:SS,mmm --> HH:MM:SS,mmm`,
/// text, blank separator.
pub fn to_srt(captions: &[Caption]) -> String {
    let mut out = String::new();
    for (idx, caption) in captions.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            idx + 1,
            fmt_timestamp(caption.start_ms),
            fmt_timestamp(caption.end_ms),
            caption.text
        ));
    }
    out
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

fn fmt_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let ms = ms % 3_600_000;
    let minutes = ms / 60_000;
    let ms = ms % 60_000;
    let seconds = ms / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn word(text: &str, start: f64, end: f64) -> WordSpan {
        WordSpan {
            word: text.to_string(),
            start,
            end,
        }
    }

    fn segment(start_ms: u64, end_ms: u64, text: &str, translated: &str) -> Segment {
        Segment {
            start_ms,
            end_ms,
            text: text.to_string(),
            translated_text: translated.to_string(),
            audio_path: PathBuf::from("unused.mp3"),
        }
    }

    #[test]
    fn test_gap_splits_captions() {
        let words = vec![
            word("a", 0.0, 0.3),
            word("b", 0.3, 0.6),
            word("c", 2.0, 2.3),
        ];
        let captions = captions_from_words(&words, &SubtitleOptions::default());
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].text, "a b");
        assert_eq!(captions[1].start_ms, 2000);
        assert_eq!(captions[1].text, "c");
    }

    #[test]
    fn test_zero_span_caption_extended() {
        let words = vec![word("hi", 1.0, 1.0)];
        let captions = captions_from_words(&words, &SubtitleOptions::default());
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].start_ms, 1000);
        assert_eq!(captions[0].end_ms, 1800);
    }

    #[test]
    fn test_char_limit_flushes() {
        // 20 x 4-char words = 100 accumulated chars against a limit of 80
        let words: Vec<WordSpan> = (0..20)
            .map(|i| word("word", i as f64 * 0.1, i as f64 * 0.1 + 0.1))
            .collect();
        let captions = captions_from_words(&words, &SubtitleOptions::default());
        assert!(captions.len() > 1);
    }

    #[test]
    fn test_span_limit_flushes() {
        let words = vec![
            word("slow", 0.0, 2.0),
            word("words", 2.0, 4.0),
            word("here", 4.0, 6.0),
        ];
        let captions = captions_from_words(&words, &SubtitleOptions::default());
        assert!(captions.len() >= 2);
    }

    #[test]
    fn test_empty_words_skipped() {
        let words = vec![word("", 0.0, 0.1), word("only", 0.2, 0.5)];
        let captions = captions_from_words(&words, &SubtitleOptions::default());
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "only");
    }

    #[test]
    fn test_segments_skip_empty_text() {
        let segments = vec![
            segment(0, 1500, "hello", "namaste"),
            segment(1500, 3000, "", ""),
            segment(3000, 4500, "again", "phir se"),
        ];
        let captions = captions_from_segments(&segments, true);
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].text, "namaste");
        assert_eq!(captions[1].text, "phir se");
    }

    #[test]
    fn test_segments_choose_original_text() {
        let segments = vec![segment(0, 1500, "hello", "namaste")];
        let captions = captions_from_segments(&segments, false);
        assert_eq!(captions[0].text, "hello");
    }

    #[test]
    fn test_segment_minimum_span_clamp() {
        let segments = vec![segment(1000, 1050, "quick", "jaldi")];
        let captions = captions_from_segments(&segments, true);
        assert_eq!(captions[0].start_ms, 1000);
        assert_eq!(captions[0].end_ms, 1200);
    }

    #[test]
    fn test_srt_format() {
        let captions = vec![
            Caption {
                start_ms: 0,
                end_ms: 1500,
                text: "first line".to_string(),
            },
            Caption {
                start_ms: 3_661_123,
                end_ms: 3_662_000,
                text: "second line".to_string(),
            },
        ];
        let srt = to_srt(&captions);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nfirst line\n\n\
             2\n01:01:01,123 --> 01:01:02,000\nsecond line\n\n"
        );
    }

    #[test]
    fn test_caption_generation_is_deterministic() {
        let segments = vec![
            segment(0, 1500, "one", "ek"),
            segment(1500, 2800, "two", "do"),
        ];
        let first = to_srt(&captions_from_segments(&segments, true));
        let second = to_srt(&captions_from_segments(&segments, true));
        assert_eq!(first, second);
    }
}
