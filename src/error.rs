use std::path::{Path, PathBuf};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the spectrogram pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing, unreadable or undecodable input, or a clip with no samples.
    #[error("failed to load audio from {}: {source}", path.display())]
    AudioLoad {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Parameters and data do not fit together (e.g. clip shorter than one window).
    #[error("spectrogram computation failed: {0}")]
    SpectrogramCompute(String),

    /// I/O or encoding failure while writing the image.
    #[error("failed to render {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Invalid parameter combination.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required metadata field was missing or zero.
    #[error("incomplete spectrogram metadata: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn audio_load(path: &Path, source: impl Into<BoxError>) -> Self {
        Error::AudioLoad {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub(crate) fn render(path: &Path, source: impl Into<BoxError>) -> Self {
        Error::Render {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}
