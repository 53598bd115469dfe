use crate::audio;
use crate::canvas;
use crate::dsp;
use crate::error::Result;
use crate::metadata::{MetadataBuilder, SpectrogramResult};
use crate::params::{SpectrogramOverrides, SpectrogramParameters};
use crate::types::AudioClip;
use std::path::Path;

/// Turns audio into mel spectrogram PNGs plus a metadata record.
///
/// The defaults are fixed at construction; each call merges its own
/// overrides over them. Holds no mutable state, so one generator can serve
/// any number of threads as long as they write to different paths.
#[derive(Clone, Debug)]
pub struct SpectrogramGenerator {
    defaults: SpectrogramParameters,
}

impl Default for SpectrogramGenerator {
    fn default() -> Self {
        Self {
            defaults: SpectrogramParameters::default(),
        }
    }
}

impl SpectrogramGenerator {
    pub fn new(defaults: SpectrogramParameters) -> Result<Self> {
        defaults.validate()?;
        Ok(Self { defaults })
    }

    /// Generator whose defaults are the built-in ones with `overrides` applied.
    pub fn with_overrides(overrides: &SpectrogramOverrides) -> Result<Self> {
        Self::new(overrides.merge_over(&SpectrogramParameters::default()))
    }

    pub fn default_params(&self) -> SpectrogramParameters {
        self.defaults.clone()
    }

    /// Merge `overrides` over the defaults and validate the result.
    pub fn effective_params(&self, overrides: &SpectrogramOverrides) -> Result<SpectrogramParameters> {
        let params = overrides.merge_over(&self.defaults);
        params.validate()?;
        Ok(params)
    }

    /// Load audio at `sample_rate` (the default rate when `None`).
    pub fn load_audio(
        &self,
        path: &Path,
        sample_rate: Option<u32>,
        max_duration: Option<f64>,
    ) -> Result<AudioClip> {
        audio::load(path, sample_rate.unwrap_or(self.defaults.sample_rate), max_duration)
    }

    /// Decode `audio_path` and write its spectrogram to `output_path`.
    pub fn generate(
        &self,
        audio_path: &Path,
        output_path: &Path,
        overrides: &SpectrogramOverrides,
    ) -> Result<SpectrogramResult> {
        let params = self.effective_params(overrides)?;
        let clip = self.load_audio(audio_path, Some(params.sample_rate), None)?;
        log::info!(
            "{}: {:.2}s @ {} Hz -> {}",
            audio_path.display(),
            clip.duration_secs(),
            clip.sample_rate(),
            output_path.display()
        );
        run(&clip, &params, output_path)
    }

    /// Write the spectrogram of an already-decoded clip to `output_path`.
    ///
    /// The clip's sample rate replaces any `sr` from defaults or overrides.
    pub fn generate_from_clip(
        &self,
        clip: &AudioClip,
        output_path: &Path,
        overrides: &SpectrogramOverrides,
    ) -> Result<SpectrogramResult> {
        let mut params = overrides.merge_over(&self.defaults);
        params.sample_rate = clip.sample_rate();
        params.validate()?;
        run(clip, &params, output_path)
    }
}

fn run(clip: &AudioClip, params: &SpectrogramParameters, output_path: &Path) -> Result<SpectrogramResult> {
    let matrix = dsp::compute(clip, params)?;
    let (width, height) = canvas::render(&matrix, params, output_path)?;
    MetadataBuilder::new()
        .matrix_shape(matrix.shape())
        .clip(clip)
        .params(params)
        .image_dims(width, height)
        .build()
}
