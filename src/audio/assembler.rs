//! Narration assembly: fragment concatenation and background mixing.

use super::{AudioFragment, PcmAudio};
use crate::config::MixSettings;
use crate::error::{FortellError, Result};
use tracing::debug;

/// Convert decibels to a linear amplitude factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Join fragments into one track.
///
/// Fragments must be ordered with indices `0..N`, share one sample format,
/// and there must be at least one. Anything else is an invariant violation;
/// nothing is reordered or padded.
pub fn concatenate(fragments: Vec<AudioFragment>) -> Result<PcmAudio> {
    let first = fragments
        .first()
        .ok_or_else(|| FortellError::Invariant("no audio fragments to assemble".to_string()))?;
    let (sample_rate, channels) = (first.audio.sample_rate, first.audio.channels);

    for (position, fragment) in fragments.iter().enumerate() {
        if fragment.index != position {
            return Err(FortellError::Invariant(format!(
                "fragment at position {} has index {} (missing, duplicated or out of order)",
                position, fragment.index
            )));
        }
        if !fragment.audio.same_format(&first.audio) {
            return Err(FortellError::Invariant(format!(
                "fragment {} is {} Hz/{} ch, expected {} Hz/{} ch",
                fragment.index,
                fragment.audio.sample_rate,
                fragment.audio.channels,
                sample_rate,
                channels
            )));
        }
    }

    let total: usize = fragments.iter().map(|f| f.audio.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);
    let count = fragments.len();
    for fragment in fragments {
        samples.extend(fragment.audio.samples);
    }

    debug!("Assembled {} fragments into {} samples", count, total);
    Ok(PcmAudio::new(sample_rate, channels, samples))
}

/// Overlay background music under a narration.
///
/// The background is looped or truncated to the narration's exact length,
/// both signals get their configured gain, and the sum saturates at the
/// 16-bit range. An empty background leaves the narration unchanged.
pub fn mix_background(
    narration: &PcmAudio,
    background: &PcmAudio,
    settings: &MixSettings,
) -> Result<PcmAudio> {
    if !narration.same_format(background) {
        return Err(FortellError::Invariant(format!(
            "background is {} Hz/{} ch but narration is {} Hz/{} ch",
            background.sample_rate, background.channels, narration.sample_rate, narration.channels
        )));
    }

    let loop_len = background.frames() * background.channels.max(1) as usize;
    if loop_len == 0 {
        return Ok(narration.clone());
    }

    let narration_gain = db_to_gain(settings.narration_gain_db);
    let background_gain = db_to_gain(settings.background_gain_db);

    let samples = narration
        .samples
        .iter()
        .enumerate()
        .map(|(i, &voice)| {
            let music = background.samples[i % loop_len];
            let mixed = voice as f32 * narration_gain + music as f32 * background_gain;
            mixed.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect();

    Ok(PcmAudio::new(narration.sample_rate, narration.channels, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: usize, samples: Vec<i16>) -> AudioFragment {
        AudioFragment::new(index, PcmAudio::new(24_000, 1, samples))
    }

    fn flat_settings(narration_db: f32, background_db: f32) -> MixSettings {
        MixSettings {
            narration_gain_db: narration_db,
            background_gain_db: background_db,
        }
    }

    #[test]
    fn test_concatenate_in_order() {
        let fragments = vec![
            fragment(0, vec![1, 2]),
            fragment(1, vec![3]),
            fragment(2, vec![4, 5, 6]),
        ];
        let track = concatenate(fragments).unwrap();
        assert_eq!(track.samples, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(track.sample_rate, 24_000);
    }

    #[test]
    fn test_duration_is_sum_of_fragments() {
        let fragments: Vec<_> = (0..5)
            .map(|i| fragment(i, vec![0; 1200 * (i + 1)]))
            .collect();
        let expected_frames: usize = fragments.iter().map(|f| f.audio.frames()).sum();
        let expected_secs: f64 = fragments.iter().map(|f| f.duration_seconds()).sum();

        let track = concatenate(fragments).unwrap();
        assert_eq!(track.frames(), expected_frames);
        assert!((track.duration_seconds() - expected_secs).abs() < 1e-9);
    }

    #[test]
    fn test_gap_is_rejected() {
        let fragments = vec![fragment(0, vec![1]), fragment(2, vec![2])];
        assert!(matches!(
            concatenate(fragments),
            Err(FortellError::Invariant(_))
        ));
    }

    #[test]
    fn test_out_of_order_is_rejected() {
        let fragments = vec![fragment(1, vec![1]), fragment(0, vec![2])];
        assert!(concatenate(fragments).is_err());
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(concatenate(Vec::new()).is_err());
    }

    #[test]
    fn test_mismatched_format_is_rejected() {
        let fragments = vec![
            fragment(0, vec![1]),
            AudioFragment::new(1, PcmAudio::new(44_100, 1, vec![2])),
        ];
        assert!(concatenate(fragments).is_err());
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_short_background_is_looped() {
        let narration = PcmAudio::new(8, 1, vec![0; 7]);
        let background = PcmAudio::new(8, 1, vec![100, 200, 300]);
        let mixed = mix_background(&narration, &background, &flat_settings(0.0, 0.0)).unwrap();
        assert_eq!(mixed.samples, vec![100, 200, 300, 100, 200, 300, 100]);
    }

    #[test]
    fn test_long_background_is_truncated() {
        let narration = PcmAudio::new(8, 1, vec![10, 10]);
        let background = PcmAudio::new(8, 1, vec![1, 2, 3, 4, 5]);
        let mixed = mix_background(&narration, &background, &flat_settings(0.0, 0.0)).unwrap();
        assert_eq!(mixed.samples, vec![11, 12]);
        assert_eq!(mixed.frames(), narration.frames());
    }

    #[test]
    fn test_background_is_attenuated() {
        let narration = PcmAudio::new(8, 1, vec![0, 0]);
        let background = PcmAudio::new(8, 1, vec![10_000, -10_000]);
        let mixed = mix_background(&narration, &background, &flat_settings(0.0, -20.0)).unwrap();
        assert_eq!(mixed.samples, vec![1_000, -1_000]);
    }

    #[test]
    fn test_mix_saturates() {
        let narration = PcmAudio::new(8, 1, vec![30_000, -30_000]);
        let background = PcmAudio::new(8, 1, vec![30_000, -30_000]);
        let mixed = mix_background(&narration, &background, &flat_settings(0.0, 0.0)).unwrap();
        assert_eq!(mixed.samples, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_empty_background_is_passthrough() {
        let narration = PcmAudio::new(8, 1, vec![5, 6, 7]);
        let background = PcmAudio::new(8, 1, Vec::new());
        let mixed = mix_background(&narration, &background, &MixSettings::default()).unwrap();
        assert_eq!(mixed, narration);
    }

    #[test]
    fn test_stereo_loop_keeps_channels_aligned() {
        let narration = PcmAudio::new(8, 2, vec![0; 8]);
        let background = PcmAudio::new(8, 2, vec![1, -1, 2, -2]);
        let mixed = mix_background(&narration, &background, &flat_settings(0.0, 0.0)).unwrap();
        assert_eq!(mixed.samples, vec![1, -1, 2, -2, 1, -1, 2, -2]);
    }
}
