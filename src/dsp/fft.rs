use realfft::RealFftPlanner;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
    static HANN_CACHE: RefCell<HashMap<usize, Arc<Vec<f32>>>> = RefCell::new(HashMap::new());
}

/// Periodic Hann window: `0.5 * (1 - cos(2πi / N))`.
///
/// The periodic form (denominator `N`, not `N - 1`) is the one used for
/// spectral analysis, so that overlapping frames sum to a constant.
pub fn hann_window(size: usize) -> Arc<Vec<f32>> {
    HANN_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(size)
            .or_insert_with(|| {
                Arc::new(
                    (0..size)
                        .map(|i| {
                            0.5 * (1.0
                                - (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos())
                                as f32
                        })
                        .collect(),
                )
            })
            .clone()
    })
}

/// Number of full frames of `fft_size` samples at stride `hop_size`.
///
/// Frames are not centred or padded: a signal of exactly `fft_size` samples
/// yields one frame, anything shorter yields none.
pub fn frame_count(len: usize, fft_size: usize, hop_size: usize) -> usize {
    if len < fft_size || hop_size == 0 {
        0
    } else {
        (len - fft_size) / hop_size + 1
    }
}

/// Short-time power spectrum.
///
/// Returns one column per frame, each holding `fft_size / 2 + 1` bins of
/// `|X[k]|²` computed through a Hann window.
pub fn power_spectrogram(samples: &[f32], fft_size: usize, hop_size: usize) -> Vec<Vec<f32>> {
    let n_frames = frame_count(samples.len(), fft_size, hop_size);
    if n_frames == 0 {
        return Vec::new();
    }

    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(fft_size));
    let window = hann_window(fft_size);

    // Pre-allocate FFT buffers once and reuse across frames
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();

    let mut columns = Vec::with_capacity(n_frames);
    for frame in 0..n_frames {
        let pos = frame * hop_size;
        for (inp, (&s, &w)) in input
            .iter_mut()
            .zip(samples[pos..pos + fft_size].iter().zip(window.iter()))
        {
            *inp = s * w;
        }
        // Buffers come from the plan itself, so lengths always match.
        fft.process_with_scratch(&mut input, &mut spectrum, &mut scratch)
            .expect("FFT failed");
        columns.push(spectrum.iter().map(|c| c.norm_sqr()).collect());
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_edges() {
        assert_eq!(frame_count(2047, 2048, 512), 0);
        assert_eq!(frame_count(2048, 2048, 512), 1);
        assert_eq!(frame_count(2559, 2048, 512), 1);
        assert_eq!(frame_count(2560, 2048, 512), 2);
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn power_peak_matches_tone() {
        let sample_rate = 22050.0f64;
        let freq = 1000.0f64;
        let fft_size = 2048;
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin() as f32)
            .collect();

        let columns = power_spectrogram(&samples, fft_size, 512);
        assert_eq!(columns.len(), frame_count(8192, fft_size, 512));
        assert_eq!(columns[0].len(), fft_size / 2 + 1);

        let peak_bin = columns[1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let peak_freq = peak_bin as f64 * sample_rate / fft_size as f64;
        let resolution = sample_rate / fft_size as f64;
        assert!(
            (peak_freq - freq).abs() < resolution * 2.0,
            "Peak at {peak_freq} Hz, expected ~{freq} Hz"
        );
    }
}
