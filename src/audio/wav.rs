//! WAV file reading and writing.

use super::PcmAudio;
use crate::error::{FortellError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::BufWriter;
use std::path::Path;

/// Header information of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u32,
}

impl WavInfo {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Read the header of a WAV file without loading the samples.
pub fn probe(path: &Path) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        frames: reader.duration(),
    })
}

/// Read a 16-bit integer PCM WAV file.
pub fn read_wav(path: &Path) -> Result<PcmAudio> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(FortellError::Audio(format!(
            "{}: expected 16-bit PCM, found {}-bit {:?}",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(PcmAudio::new(spec.sample_rate, spec.channels, samples))
}

/// Write audio as a 16-bit PCM WAV file.
///
/// The file is written next to its destination and renamed into place, so a
/// reader never observes a partially written WAV.
pub fn write_wav_atomic(path: &Path, audio: &PcmAudio) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file()), spec)?;
        for &sample in &audio.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| FortellError::Io(e.error))?;
    Ok(())
}
