//! Reproducibility record returned alongside each spectrogram image.

use crate::error::{Error, Result};
use crate::params::SpectrogramParameters;
use crate::types::AudioClip;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramResult {
    /// Width of the written PNG in pixels.
    pub image_width: u32,
    /// Height of the written PNG in pixels.
    pub image_height: u32,
    /// Sample rate the audio was analysed at.
    pub sample_rate: u32,
    pub duration_seconds: f64,
    /// JSON copy of the effective parameters, see [`SpectrogramParameters`].
    pub spectrogram_params: String,
}

impl SpectrogramResult {
    /// Parse `spectrogram_params` back into a parameter set.
    pub fn params(&self) -> Result<SpectrogramParameters> {
        serde_json::from_str(&self.spectrogram_params)
            .map_err(|e| Error::Metadata(format!("unreadable spectrogram_params: {e}")))
    }
}

/// Collects the pieces of a [`SpectrogramResult`]; every field is required.
#[derive(Default)]
pub struct MetadataBuilder<'a> {
    matrix_shape: Option<(usize, usize)>,
    clip: Option<&'a AudioClip>,
    params: Option<&'a SpectrogramParameters>,
    image_dims: Option<(u32, u32)>,
}

impl<'a> MetadataBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix_shape(mut self, shape: (usize, usize)) -> Self {
        self.matrix_shape = Some(shape);
        self
    }

    pub fn clip(mut self, clip: &'a AudioClip) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn params(mut self, params: &'a SpectrogramParameters) -> Self {
        self.params = Some(params);
        self
    }

    pub fn image_dims(mut self, width: u32, height: u32) -> Self {
        self.image_dims = Some((width, height));
        self
    }

    pub fn build(self) -> Result<SpectrogramResult> {
        let (n_mels, n_frames) = self
            .matrix_shape
            .ok_or_else(|| Error::Metadata("matrix shape not set".into()))?;
        let clip = self
            .clip
            .ok_or_else(|| Error::Metadata("audio clip not set".into()))?;
        let params = self
            .params
            .ok_or_else(|| Error::Metadata("parameters not set".into()))?;
        let (image_width, image_height) = self
            .image_dims
            .ok_or_else(|| Error::Metadata("image dimensions not set".into()))?;

        if n_mels == 0 || n_frames == 0 {
            return Err(Error::Metadata(format!(
                "degenerate matrix shape ({n_mels}, {n_frames})"
            )));
        }
        if n_mels != params.n_mels {
            return Err(Error::Metadata(format!(
                "matrix has {n_mels} mel rows but parameters say n_mels={}",
                params.n_mels
            )));
        }
        if image_width == 0 || image_height == 0 {
            return Err(Error::Metadata(format!(
                "degenerate image size {image_width}x{image_height}"
            )));
        }
        if params.sample_rate != clip.sample_rate() {
            return Err(Error::Metadata(format!(
                "parameters record sr={} but the clip is at {} Hz",
                params.sample_rate,
                clip.sample_rate()
            )));
        }

        Ok(SpectrogramResult {
            image_width,
            image_height,
            sample_rate: clip.sample_rate(),
            duration_seconds: clip.duration_secs(),
            spectrogram_params: params.to_json(),
        })
    }
}
