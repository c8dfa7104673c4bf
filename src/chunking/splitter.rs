//! Boundary-aware text splitter.

use super::TextSegment;
use crate::error::{FortellError, Result};

/// Sentence terminators.
fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// Terminators that end a sentence without trailing whitespace.
fn is_wide_terminator(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？' | '…')
}

/// Closing quotes and brackets that belong to the preceding sentence.
fn is_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '）' | '」' | '』' | '》'
    )
}

/// Clause punctuation that may end a segment when no sentence end fits.
fn is_clause_mark(ch: char) -> bool {
    matches!(ch, '，' | '、' | '；' | '：' | ',' | ';' | ':')
}

/// Strength of a split point; stronger boundaries win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Clause,
    Sentence,
    Paragraph,
}

/// Last candidate cut position of each boundary class within a window.
#[derive(Debug, Default)]
struct Candidates {
    paragraph: Option<usize>,
    sentence: Option<usize>,
    clause: Option<usize>,
}

impl Candidates {
    fn record(&mut self, boundary: Boundary, at: usize) {
        let slot = match boundary {
            Boundary::Paragraph => &mut self.paragraph,
            Boundary::Sentence => &mut self.sentence,
            Boundary::Clause => &mut self.clause,
        };
        *slot = Some(at);
    }

    fn best(&self) -> Option<usize> {
        self.paragraph.or(self.sentence).or(self.clause)
    }
}

/// Splits story bodies into segments of at most `max_chars` characters.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    max_chars: usize,
}

impl ChunkSplitter {
    pub fn new(max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(FortellError::Config(
                "max_segment_chars must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chars })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split a body into ordered segments.
    ///
    /// An empty or whitespace-only body yields no segments.
    pub fn split(&self, body: &str) -> Vec<TextSegment> {
        let mut segments = Vec::new();
        if body.trim().is_empty() {
            return segments;
        }

        let mut pos = 0;
        while pos < body.len() {
            let rest = &body[pos..];
            let text_len = self.cut(rest);
            let after = &rest[text_len..];
            let separator_len = after.len() - after.trim_start().len();

            segments.push(TextSegment::new(
                segments.len(),
                &rest[..text_len],
                &after[..separator_len],
            ));
            pos += text_len + separator_len;
        }

        segments
    }

    /// Byte length of the next segment's text within `rest`.
    ///
    /// `rest` always contains non-whitespace, so the returned text does too.
    fn cut(&self, rest: &str) -> usize {
        let lead = rest.len() - rest.trim_start().len();
        let content = &rest[lead..];

        let window_end = match content.char_indices().nth(self.max_chars) {
            Some((offset, _)) => lead + offset,
            None => return rest.trim_end().len(),
        };

        scan_boundaries(rest, lead, window_end)
            .best()
            .unwrap_or(window_end)
    }
}

/// Collect split candidates `c` with `lead < c <= window_end`.
fn scan_boundaries(rest: &str, lead: usize, window_end: usize) -> Candidates {
    let mut candidates = Candidates::default();
    let mut prev: Option<char> = None;
    let mut after_terminator = false;
    let mut after_wide_terminator = false;

    for (i, ch) in rest.char_indices() {
        if i > window_end {
            break;
        }

        if i > lead {
            if let Some(p) = prev {
                if ch.is_whitespace() && !p.is_whitespace() {
                    let newlines = rest[i..]
                        .chars()
                        .take_while(|c| c.is_whitespace())
                        .filter(|c| *c == '\n')
                        .count();
                    let boundary = if newlines >= 2 {
                        Boundary::Paragraph
                    } else if newlines == 1 || after_terminator {
                        Boundary::Sentence
                    } else {
                        Boundary::Clause
                    };
                    candidates.record(boundary, i);
                } else if !ch.is_whitespace() && !is_closer(ch) {
                    if after_wide_terminator {
                        candidates.record(Boundary::Sentence, i);
                    } else if is_clause_mark(p) {
                        candidates.record(Boundary::Clause, i);
                    }
                }
            }
        }

        if is_terminator(ch) {
            after_terminator = true;
            after_wide_terminator = is_wide_terminator(ch);
        } else if !(is_closer(ch) && after_terminator) {
            after_terminator = false;
            after_wide_terminator = false;
        }
        prev = Some(ch);
    }

    candidates
}
