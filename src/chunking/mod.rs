//! Splitting story text into segments a speech service accepts in one request.
//!
//! Speech APIs cap the input size per call, so a story body is broken into
//! ordered [`TextSegment`]s. Splits prefer paragraph breaks, then sentence
//! ends, then clause or word breaks, and only cut mid-word when nothing else
//! fits. The whitespace consumed at each split is kept on the segment so the
//! original body can always be rebuilt.

mod splitter;

pub use splitter::ChunkSplitter;

use serde::{Deserialize, Serialize};

/// One ordered piece of a story body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    /// Position of this segment in the story.
    pub index: usize,
    /// Text sent to the speech service.
    pub text: String,
    /// Whitespace consumed at the split point following `text`.
    pub separator: String,
}

impl TextSegment {
    pub fn new(index: usize, text: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            separator: separator.into(),
        }
    }

    /// Length in characters of the spoken content.
    pub fn len(&self) -> usize {
        self.text.trim().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rebuild the original body from its segments.
pub fn reassemble(segments: &[TextSegment]) -> String {
    let capacity = segments
        .iter()
        .map(|s| s.text.len() + s.separator.len())
        .sum();
    let mut body = String::with_capacity(capacity);
    for segment in segments {
        body.push_str(&segment.text);
        body.push_str(&segment.separator);
    }
    body
}
