//! Mel-scale triangular filterbank.

/// Hz → mel, `2595 * log10(1 + f / 700)`.
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel → Hz, inverse of [`hz_to_mel`].
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// A bank of `n_mels` triangular filters over `n_fft / 2 + 1` FFT bins.
#[derive(Clone, Debug)]
pub struct MelFilterbank {
    pub n_mels: usize,
    pub n_bins: usize,
    /// Row-major `weights[mel * n_bins + bin]`.
    weights: Vec<f32>,
}

impl MelFilterbank {
    /// Build the filterbank.
    ///
    /// Filter edges are `n_mels + 2` points spaced evenly in mel between
    /// `fmin` and `fmax`. Each triangle rises from edge `i` to peak `i + 1` and
    /// falls to edge `i + 2`, evaluated at the FFT bin centre frequencies, and
    /// is scaled by `2 / (f[i + 2] - f[i])` so every filter has roughly equal
    /// area.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..n_bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let mut weights = vec![0.0f32; n_mels * n_bins];
        let mut empty = 0usize;
        for m in 0..n_mels {
            let (left, centre, right) = (edges[m], edges[m + 1], edges[m + 2]);
            let rise = centre - left;
            let fall = right - centre;
            let norm = 2.0 / (right - left);
            let row = &mut weights[m * n_bins..(m + 1) * n_bins];
            let mut any = false;
            for (w, &f) in row.iter_mut().zip(fft_freqs.iter()) {
                let lower = (f - left) / rise;
                let upper = (right - f) / fall;
                let v = lower.min(upper).max(0.0);
                if v > 0.0 {
                    any = true;
                }
                *w = (v * norm) as f32;
            }
            if !any {
                empty += 1;
            }
        }
        if empty > 0 {
            log::warn!(
                "{empty} of {n_mels} mel filters cover no FFT bin (n_fft={n_fft}, sr={sample_rate}); \
                 consider fewer mels or a larger n_fft"
            );
        }

        Self {
            n_mels,
            n_bins,
            weights,
        }
    }

    pub fn filter(&self, mel: usize) -> &[f32] {
        &self.weights[mel * self.n_bins..(mel + 1) * self.n_bins]
    }

    /// Project one power spectrum column onto the mel bands.
    pub fn apply(&self, power: &[f32], out: &mut [f32]) {
        debug_assert_eq!(power.len(), self.n_bins);
        for (m, o) in out.iter_mut().enumerate().take(self.n_mels) {
            *o = self
                .filter(m)
                .iter()
                .zip(power.iter())
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_round_trip() {
        for hz in [0.0, 440.0, 1000.0, 8000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn filters_are_triangles_inside_range() {
        let fb = MelFilterbank::new(22050, 2048, 128, 0.0, 8000.0);
        assert_eq!(fb.n_bins, 1025);
        let bin_hz = 22050.0 / 2048.0;
        for m in 0..fb.n_mels {
            let row = fb.filter(m);
            assert!(row.iter().all(|&w| w >= 0.0));
            // Nothing above fmax.
            let first_above = (8000.0f64 / bin_hz).ceil() as usize + 1;
            assert!(row[first_above..].iter().all(|&w| w == 0.0));
        }
        // Higher filters are wider, so their peak weight is lower.
        let peak = |m: usize| fb.filter(m).iter().copied().fold(0.0f32, f32::max);
        assert!(peak(120) < peak(40));
    }

    #[test]
    fn apply_sums_weighted_power() {
        let fb = MelFilterbank::new(16000, 512, 20, 0.0, 8000.0);
        let flat = vec![1.0f32; fb.n_bins];
        let mut out = vec![0.0f32; fb.n_mels];
        fb.apply(&flat, &mut out);
        for (m, v) in out.iter().enumerate() {
            let expected: f32 = fb.filter(m).iter().sum();
            assert!((v - expected).abs() < 1e-6);
        }
    }
}
