pub mod colors;
pub mod spectrogram_renderer;

pub use spectrogram_renderer::{read_dimensions, render, Canvas};
