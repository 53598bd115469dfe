//! Spectrogram parameters and typed per-call overrides.
//!
//! Overrides are merged field by field over a set of defaults: every `Some`
//! replaces the default, every `None` keeps it. The merged set is validated
//! before any work happens.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The full set of parameters used to produce one spectrogram image.
///
/// Serialized field names (`sr`, `figsize`) match the keys accepted by
/// [`SpectrogramOverrides`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramParameters {
    /// FFT window size in samples.
    pub n_fft: usize,
    /// Stride between successive windows in samples.
    pub hop_length: usize,
    /// Number of mel filter banks.
    pub n_mels: usize,
    /// Lowest filter edge (Hz).
    pub fmin: f64,
    /// Highest filter edge (Hz).
    pub fmax: f64,
    /// Sample rate the audio is analysed at (Hz).
    #[serde(rename = "sr")]
    pub sample_rate: u32,
    /// Rendering resolution, pixels per inch.
    pub dpi: u32,
    /// Image size in inches, (width, height).
    #[serde(rename = "figsize")]
    pub figure_size: (f64, f64),
}

impl Default for SpectrogramParameters {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            // bird calls sit mostly below 8 kHz
            fmax: 8000.0,
            sample_rate: 22050,
            dpi: 100,
            figure_size: (10.0, 4.0),
        }
    }
}

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = u16::MAX as u32;

/// Largest accepted canvas area, in pixels.
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

impl SpectrogramParameters {
    /// Check every invariant, returning `Error::Config` on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 {
            return Err(Error::Config("n_fft must be positive".into()));
        }
        if self.hop_length == 0 {
            return Err(Error::Config("hop_length must be positive".into()));
        }
        if self.hop_length > self.n_fft {
            return Err(Error::Config(format!(
                "hop_length ({}) must not exceed n_fft ({})",
                self.hop_length, self.n_fft
            )));
        }
        if self.n_mels == 0 {
            return Err(Error::Config("n_mels must be positive".into()));
        }
        if self.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".into()));
        }
        if !self.fmin.is_finite() || self.fmin < 0.0 {
            return Err(Error::Config(format!("fmin ({}) must be >= 0", self.fmin)));
        }
        if !self.fmax.is_finite() || self.fmax <= self.fmin {
            return Err(Error::Config(format!(
                "fmax ({}) must be greater than fmin ({})",
                self.fmax, self.fmin
            )));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if self.fmax > nyquist {
            return Err(Error::Config(format!(
                "fmax ({}) exceeds the Nyquist frequency ({nyquist}) for sr={}",
                self.fmax, self.sample_rate
            )));
        }
        if self.dpi == 0 {
            return Err(Error::Config("dpi must be positive".into()));
        }
        let (w, h) = self.figure_size;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(Error::Config(format!(
                "figsize ({w}, {h}) must be positive"
            )));
        }
        let dpi = self.dpi as f64;
        let (px_w, px_h) = ((w * dpi).round(), (h * dpi).round());
        let side = 1.0..=MAX_CANVAS_SIDE as f64;
        if !side.contains(&px_w) || !side.contains(&px_h) {
            return Err(Error::Config(format!(
                "figsize ({w}, {h}) at {} dpi gives a {px_w}x{px_h} px canvas; \
                 each side must be 1..={MAX_CANVAS_SIDE} px",
                self.dpi
            )));
        }
        if px_w * px_h > MAX_CANVAS_PIXELS as f64 {
            return Err(Error::Config(format!(
                "{px_w}x{px_h} px canvas exceeds {MAX_CANVAS_PIXELS} pixels"
            )));
        }
        Ok(())
    }

    /// Serialized copy of the parameters, as stored in `SpectrogramResult`.
    pub fn to_json(&self) -> String {
        // Plain numbers and a tuple: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Canvas size in pixels before cropping.
    pub fn canvas_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.figure_size.0 * dpi).round() as u32,
            (self.figure_size.1 * dpi).round() as u32,
        )
    }
}

/// Per-call parameter overrides. Unset fields fall back to the defaults.
///
/// Deserialization rejects unknown keys, so a misspelled `hop_lenght` in a
/// YAML file is an error rather than a silently ignored setting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectrogramOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_fft: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_mels: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmax: Option<f64>,
    #[serde(rename = "sr", default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    #[serde(rename = "figsize", default, skip_serializing_if = "Option::is_none")]
    pub figure_size: Option<(f64, f64)>,
}

impl SpectrogramOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_fft(mut self, n_fft: usize) -> Self {
        self.n_fft = Some(n_fft);
        self
    }

    pub fn hop_length(mut self, hop_length: usize) -> Self {
        self.hop_length = Some(hop_length);
        self
    }

    pub fn n_mels(mut self, n_mels: usize) -> Self {
        self.n_mels = Some(n_mels);
        self
    }

    pub fn fmin(mut self, fmin: f64) -> Self {
        self.fmin = Some(fmin);
        self
    }

    pub fn fmax(mut self, fmax: f64) -> Self {
        self.fmax = Some(fmax);
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn figure_size(mut self, width: f64, height: f64) -> Self {
        self.figure_size = Some((width, height));
        self
    }

    /// Merge over `defaults`. The result is not validated.
    pub fn merge_over(&self, defaults: &SpectrogramParameters) -> SpectrogramParameters {
        SpectrogramParameters {
            n_fft: self.n_fft.unwrap_or(defaults.n_fft),
            hop_length: self.hop_length.unwrap_or(defaults.hop_length),
            n_mels: self.n_mels.unwrap_or(defaults.n_mels),
            fmin: self.fmin.unwrap_or(defaults.fmin),
            fmax: self.fmax.unwrap_or(defaults.fmax),
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            dpi: self.dpi.unwrap_or(defaults.dpi),
            figure_size: self.figure_size.unwrap_or(defaults.figure_size),
        }
    }

    /// Layer `other` on top of `self`: fields set in `other` win.
    pub fn layered(&self, other: &SpectrogramOverrides) -> SpectrogramOverrides {
        SpectrogramOverrides {
            n_fft: other.n_fft.or(self.n_fft),
            hop_length: other.hop_length.or(self.hop_length),
            n_mels: other.n_mels.or(self.n_mels),
            fmin: other.fmin.or(self.fmin),
            fmax: other.fmax.or(self.fmax),
            sample_rate: other.sample_rate.or(self.sample_rate),
            dpi: other.dpi.or(self.dpi),
            figure_size: other.figure_size.or(self.figure_size),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        yaml_serde::from_str(text)
            .map_err(|e| Error::Config(format!("invalid parameter file: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SpectrogramParameters::default().validate().unwrap();
        assert_eq!(SpectrogramParameters::default().canvas_size(), (1000, 400));
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let defaults = SpectrogramParameters::default();
        let merged = SpectrogramOverrides::new()
            .n_fft(1024)
            .hop_length(256)
            .merge_over(&defaults);
        assert_eq!(merged.n_fft, 1024);
        assert_eq!(merged.hop_length, 256);
        assert_eq!(merged.n_mels, defaults.n_mels);
        assert_eq!(merged.fmin, defaults.fmin);
        assert_eq!(merged.fmax, defaults.fmax);
        assert_eq!(merged.sample_rate, defaults.sample_rate);
        assert_eq!(merged.dpi, defaults.dpi);
        assert_eq!(merged.figure_size, defaults.figure_size);
    }

    #[test]
    fn rejects_invalid_combinations() {
        let defaults = SpectrogramParameters::default();
        let cases = [
            SpectrogramOverrides::new().hop_length(4096),
            SpectrogramOverrides::new().fmax(12000.0),
            SpectrogramOverrides::new().fmin(8000.0),
            SpectrogramOverrides::new().fmin(-1.0),
            SpectrogramOverrides::new().n_mels(0),
            SpectrogramOverrides::new().dpi(0),
            SpectrogramOverrides::new().figure_size(0.0, 4.0),
            SpectrogramOverrides::new().figure_size(1e12, 1e12),
            SpectrogramOverrides::new().figure_size(f64::MAX, 4.0),
            SpectrogramOverrides::new().figure_size(0.001, 4.0),
            SpectrogramOverrides::new().figure_size(700.0, 4.0),
            SpectrogramOverrides::new().figure_size(600.0, 600.0),
        ];
        for case in cases {
            let merged = case.merge_over(&defaults);
            assert!(
                matches!(merged.validate(), Err(Error::Config(_))),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn canvas_cap_is_inclusive() {
        let params = SpectrogramOverrides::new()
            .dpi(1)
            .figure_size(MAX_CANVAS_SIDE as f64, 1.0)
            .merge_over(&SpectrogramParameters::default());
        params.validate().unwrap();
        assert_eq!(params.canvas_size(), (MAX_CANVAS_SIDE, 1));
    }

    #[test]
    fn json_uses_short_keys_and_parses_back() {
        let params = SpectrogramParameters::default();
        let json = params.to_json();
        assert!(json.contains("\"sr\":22050"));
        assert!(json.contains("\"figsize\":[10.0,4.0]"));
        let back: SpectrogramParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn yaml_overrides() {
        let o = SpectrogramOverrides::from_yaml_str("n_mels: 64\nsr: 16000\nfigsize: [5, 2]\n").unwrap();
        assert_eq!(o.n_mels, Some(64));
        assert_eq!(o.sample_rate, Some(16000));
        assert_eq!(o.figure_size, Some((5.0, 2.0)));
        assert_eq!(o.n_fft, None);
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        let err = SpectrogramOverrides::from_yaml_str("hop_lenght: 256\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn layering_prefers_later_values() {
        let file = SpectrogramOverrides::new().n_mels(64).dpi(50);
        let flags = SpectrogramOverrides::new().dpi(200);
        let merged = file.layered(&flags);
        assert_eq!(merged.n_mels, Some(64));
        assert_eq!(merged.dpi, Some(200));
    }
}
