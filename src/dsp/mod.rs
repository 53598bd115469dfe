pub mod fft;
pub mod mel;
pub mod spectrogram;

pub use spectrogram::compute;
