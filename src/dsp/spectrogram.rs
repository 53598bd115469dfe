//! Mel power spectrogram in decibels.

use crate::dsp::fft::{frame_count, power_spectrogram};
use crate::dsp::mel::MelFilterbank;
use crate::error::{Error, Result};
use crate::params::SpectrogramParameters;
use crate::types::{AudioClip, SpectrogramMatrix};

/// Floor applied before taking logarithms.
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest cell.
pub const TOP_DB: f32 = 80.0;

/// Compute the dB-scaled mel spectrogram of `clip`.
///
/// The dB reference is the loudest cell of this clip, so the result peaks at
/// exactly 0 dB and only relative levels are meaningful.
pub fn compute(clip: &AudioClip, params: &SpectrogramParameters) -> Result<SpectrogramMatrix> {
    if params.sample_rate != clip.sample_rate() {
        return Err(Error::SpectrogramCompute(format!(
            "parameters expect sr={} but the clip is at {} Hz",
            params.sample_rate,
            clip.sample_rate()
        )));
    }
    params
        .validate()
        .map_err(|e| Error::SpectrogramCompute(e.to_string()))?;
    if clip.len() < params.n_fft {
        return Err(Error::SpectrogramCompute(format!(
            "clip has {} samples, fewer than one window of n_fft={}",
            clip.len(),
            params.n_fft
        )));
    }

    let power = mel_power(clip, params);
    Ok(power_to_db(power))
}

/// Mel-band power before dB conversion, same layout as `SpectrogramMatrix`.
pub fn mel_power(clip: &AudioClip, params: &SpectrogramParameters) -> SpectrogramMatrix {
    let columns = power_spectrogram(clip.samples(), params.n_fft, params.hop_length);
    let n_frames = columns.len();
    debug_assert_eq!(n_frames, frame_count(clip.len(), params.n_fft, params.hop_length));

    let bank = MelFilterbank::new(
        clip.sample_rate(),
        params.n_fft,
        params.n_mels,
        params.fmin,
        params.fmax,
    );

    let mut data = vec![0.0f32; params.n_mels * n_frames];
    let mut mel_col = vec![0.0f32; params.n_mels];
    for (frame, col) in columns.iter().enumerate() {
        bank.apply(col, &mut mel_col);
        for (mel, &v) in mel_col.iter().enumerate() {
            data[mel * n_frames + frame] = v;
        }
    }

    SpectrogramMatrix {
        n_mels: params.n_mels,
        n_frames,
        data,
    }
}

/// Convert power to dB relative to the matrix maximum.
///
/// `db = 10·log10(max(v, AMIN)) - 10·log10(max(ref, AMIN))` with `ref` the
/// largest value, then floored at `-TOP_DB`.
pub fn power_to_db(mut matrix: SpectrogramMatrix) -> SpectrogramMatrix {
    let reference = matrix.data.iter().copied().fold(0.0f32, f32::max);
    let ref_db = 10.0 * reference.max(AMIN).log10();
    for v in matrix.data.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10() - ref_db;
    }
    let peak = matrix.max();
    let floor = peak - TOP_DB;
    for v in matrix.data.iter_mut() {
        *v = v.max(floor);
    }
    matrix
}
