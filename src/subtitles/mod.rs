//! SRT subtitles derived from the narrated text.
//!
//! Sentences get screen time in proportion to their length. When the
//! duration of every synthesized segment is known, each segment's sentences
//! share that segment's span, which keeps long stories in sync; otherwise the
//! whole narration length is shared across all sentences.

use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// One subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// 1-based sequence number.
    pub sequence: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Spoken text of one segment and how long its audio runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTiming {
    pub text: String,
    pub duration: f64,
}

fn ends_sentence(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？' | '…')
}

fn is_wide_terminator(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？' | '…')
}

fn is_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | '\u{201D}' | '\u{2019}' | '）' | '」' | '』' | '》'
    )
}

/// Split text into subtitle lines at sentence ends.
///
/// Whitespace runs are collapsed first. A terminator ends a sentence when
/// followed by whitespace; full-width terminators end one immediately.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = WHITESPACE.replace_all(text.trim(), " ");
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        current.push(ch);
        if ends_sentence(ch) {
            let mut j = i + 1;
            while j < chars.len() && (ends_sentence(chars[j]) || is_closer(chars[j])) {
                current.push(chars[j]);
                j += 1;
            }
            let at_break = j >= chars.len() || chars[j] == ' ' || is_wide_terminator(ch);
            if at_break {
                let line = current.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
                current.clear();
            }
            i = j;
            continue;
        }
        i += 1;
    }

    let tail = current.trim();
    if !tail.is_empty() {
        lines.push(tail.to_string());
    }
    lines
}

/// Share `duration` seconds starting at `start` across `lines` by length.
fn allocate(lines: Vec<String>, start: f64, duration: f64, cues: &mut Vec<SubtitleCue>) {
    let weights: Vec<usize> = lines.iter().map(|l| l.chars().count().max(1)).collect();
    let total: usize = weights.iter().sum();
    let mut t = start;
    for (line, weight) in lines.into_iter().zip(weights) {
        let end = t + duration * weight as f64 / total.max(1) as f64;
        cues.push(SubtitleCue {
            sequence: cues.len() + 1,
            start: t,
            end,
            text: line,
        });
        t = end;
    }
}

/// Cues spread over the total narration length.
pub fn cues_for_text(text: &str, total_duration: f64) -> Vec<SubtitleCue> {
    let mut cues = Vec::new();
    allocate(split_sentences(text), 0.0, total_duration.max(0.0), &mut cues);
    cues
}

/// Cues timed segment by segment.
pub fn cues_for_segments(segments: &[SegmentTiming]) -> Vec<SubtitleCue> {
    let mut cues = Vec::new();
    let mut offset = 0.0;
    for segment in segments {
        let duration = segment.duration.max(0.0);
        allocate(split_sentences(&segment.text), offset, duration, &mut cues);
        offset += duration;
    }
    cues
}

/// `HH:MM:SS,mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms % 3_600_000) / 60_000,
        (ms % 60_000) / 1000,
        ms % 1000
    )
}

/// Render cues as an SRT document.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}",
            cue.sequence,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Once upon a time.  There was a\nfrog! \"Hello?\" he said."),
            vec!["Once upon a time.", "There was a frog!", "\"Hello?\"", "he said."]
        );
    }

    #[test]
    fn test_split_wide_punctuation() {
        assert_eq!(
            split_sentences("从前有一只青蛙。它住在井里！"),
            vec!["从前有一只青蛙。", "它住在井里！"]
        );
    }

    #[test]
    fn test_decimal_numbers_stay_together() {
        assert_eq!(split_sentences("It cost 3.50 coins."), vec!["It cost 3.50 coins."]);
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_timestamp(59.9996), "00:01:00,000");
    }

    #[test]
    fn test_cues_cover_total_duration() {
        let cues = cues_for_text("Short. A much longer sentence here.", 10.0);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, 0.0);
        assert!(cues[0].end < cues[1].end);
        assert!((cues[1].end - 10.0).abs() < 1e-9);
        assert_eq!(cues[1].sequence, 2);
    }

    #[test]
    fn test_segment_timing_offsets() {
        let cues = cues_for_segments(&[
            SegmentTiming {
                text: "One. Two.".to_string(),
                duration: 4.0,
            },
            SegmentTiming {
                text: "Three.".to_string(),
                duration: 3.0,
            },
        ]);
        assert_eq!(cues.len(), 3);
        assert!((cues[1].end - 4.0).abs() < 1e-9);
        assert!((cues[2].start - 4.0).abs() < 1e-9);
        assert!((cues[2].end - 7.0).abs() < 1e-9);
        assert_eq!(
            cues.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_render_srt() {
        let cues = cues_for_text("Hello. World.", 2.0);
        assert_eq!(
            render_srt(&cues),
            "1\n00:00:00,000 --> 00:00:01,000\nHello.\n\n2\n00:00:01,000 --> 00:00:02,000\nWorld.\n"
        );
    }

    #[test]
    fn test_empty_text_has_no_cues() {
        assert!(cues_for_text("   ", 5.0).is_empty());
        assert_eq!(render_srt(&[]), "");
    }
}
