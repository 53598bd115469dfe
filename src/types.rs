use crate::error::{Error, Result};
use std::path::Path;

/// Mono audio at a fixed sample rate. Never empty, every sample finite.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    /// Wrap already-decoded samples. `origin` is only used for error reporting.
    pub fn new(samples: Vec<f32>, sample_rate: u32, origin: &Path) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::audio_load(origin, "sample rate must be positive"));
        }
        if samples.is_empty() {
            return Err(Error::audio_load(origin, "no decodable samples"));
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::audio_load(
                origin,
                format!("sample {i} is not finite ({})", samples[i]),
            ));
        }
        Ok(Self { samples, sample_rate })
    }

    /// Wrap an in-memory waveform supplied by the caller.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, Path::new("<memory>"))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decibel-scaled mel energies, `n_mels` rows by `n_frames` columns.
///
/// Row-major: `data[mel * n_frames + frame]`. Row 0 is the lowest mel band.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramMatrix {
    pub n_mels: usize,
    pub n_frames: usize,
    pub data: Vec<f32>,
}

impl SpectrogramMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.n_mels, self.n_frames)
    }

    pub fn is_empty(&self) -> bool {
        self.n_mels == 0 || self.n_frames == 0 || self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, mel: usize, frame: usize) -> f32 {
        self.data[mel * self.n_frames + frame]
    }

    pub fn row(&self, mel: usize) -> &[f32] {
        &self.data[mel * self.n_frames..(mel + 1) * self.n_frames]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_rejects_empty_and_zero_rate() {
        assert!(matches!(
            AudioClip::from_samples(vec![], 22050),
            Err(Error::AudioLoad { .. })
        ));
        assert!(matches!(
            AudioClip::from_samples(vec![0.0; 10], 0),
            Err(Error::AudioLoad { .. })
        ));
    }

    #[test]
    fn clip_rejects_non_finite_samples() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(
                AudioClip::from_samples(vec![0.0, bad, 0.5], 22050),
                Err(Error::AudioLoad { .. })
            ));
        }
    }

    #[test]
    fn clip_duration() {
        let clip = AudioClip::from_samples(vec![0.0; 44100], 22050).unwrap();
        assert_eq!(clip.duration_secs(), 2.0);
        assert_eq!(clip.len(), 44100);
    }

    #[test]
    fn matrix_indexing() {
        let m = SpectrogramMatrix {
            n_mels: 2,
            n_frames: 3,
            data: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        };
        assert_eq!(m.get(1, 0), 3.0);
        assert_eq!(m.row(0), &[0.0, 1.0, 2.0]);
        assert_eq!(m.max(), 5.0);
        assert_eq!(m.min(), 0.0);
    }
}
