//! Client for the xeno-canto API v3: search, single-recording lookup, audio
//! download, and an optional on-disk response cache.

pub mod cache;
pub mod client;
pub mod error;
pub mod query;
pub mod types;

pub use cache::ResponseCache;
pub use client::{DownloadedAudio, XenoCantoClient, API_KEY_ENV, DEFAULT_BASE_URL};
pub use error::{Result, XcError};
pub use query::SearchQuery;
pub use types::{Recording, SearchResponse};
