//! Mel spectrogram generation for bird call recordings.
//!
//! ```no_run
//! use birdcall::{SpectrogramGenerator, SpectrogramOverrides};
//! use std::path::Path;
//!
//! let gen = SpectrogramGenerator::default();
//! let result = gen.generate(
//!     Path::new("XC12345.mp3"),
//!     Path::new("out/XC12345.png"),
//!     &SpectrogramOverrides::new().n_mels(64),
//! )?;
//! println!("{}x{} px, {:.1}s", result.image_width, result.image_height, result.duration_seconds);
//! # Ok::<(), birdcall::Error>(())
//! ```

pub mod audio;
pub mod canvas;
pub mod dsp;
pub mod error;
pub mod generator;
pub mod metadata;
pub mod params;
pub mod types;

pub use error::{Error, Result};
pub use generator::SpectrogramGenerator;
pub use metadata::{MetadataBuilder, SpectrogramResult};
pub use params::{SpectrogramOverrides, SpectrogramParameters};
pub use types::{AudioClip, SpectrogramMatrix};
