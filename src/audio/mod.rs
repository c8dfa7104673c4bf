//! In-memory PCM audio and narration assembly.
//!
//! Speech fragments arrive as 16-bit PCM. They are concatenated into a
//! narration track and optionally mixed with background music before being
//! written out as WAV artifacts.

mod assembler;
pub mod wav;

pub use assembler::{concatenate, db_to_gain, mix_background};

use crate::error::{FortellError, Result};
use std::time::Duration;

/// Interleaved signed 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl PcmAudio {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Decode raw little-endian 16-bit PCM.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(FortellError::Audio(format!(
                "PCM payload has odd length {}",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(sample_rate, channels, samples))
    }

    /// Encode as raw little-endian 16-bit PCM.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether two buffers can be joined or summed sample by sample.
    pub fn same_format(&self, other: &PcmAudio) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

/// Synthesized speech for one text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// Index of the source segment.
    pub index: usize,
    pub audio: PcmAudio,
}

impl AudioFragment {
    pub fn new(index: usize, audio: PcmAudio) -> Self {
        Self { index, audio }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.audio.duration_seconds()
    }
}
