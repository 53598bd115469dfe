#[derive(Debug, thiserror::Error)]
pub enum XcError {
    #[error(
        "an API key is required for xeno-canto API v3; pass one explicitly or set XENO_CANTO_API_KEY \
         (get a key from https://xeno-canto.org/explore/api)"
    )]
    MissingApiKey,

    #[error("at least one search term is required")]
    EmptyQuery,

    #[error("per_page must be between 50 and 500, got {0}")]
    InvalidPerPage(u32),

    #[error("recording {0} has no audio file URL")]
    NoAudioUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, XcError>;
