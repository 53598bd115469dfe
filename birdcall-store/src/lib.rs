//! Object storage for downloaded recordings, rendered spectrograms and
//! metadata files.
//!
//! [`ObjectStore`] is the seam the pipeline talks to; [`LocalBucket`] keeps
//! objects in a directory tree.

pub mod error;
pub mod keys;
pub mod local;

use std::collections::BTreeMap;
use std::path::Path;

pub use error::{Result, StoreError};
pub use keys::{metadata_key, raw_audio_key, species_prefix, spectrogram_key};
pub use local::LocalBucket;

/// String metadata attached to an object.
pub type Metadata = BTreeMap<String, String>;

pub trait ObjectStore {
    /// Store the file at `local_path` under `key`, replacing any existing
    /// object and its metadata. Returns the object's URI.
    fn upload(&self, local_path: &Path, key: &str, metadata: Option<&Metadata>) -> Result<String>;

    /// Copy the object at `key` to `local_path`, creating parent directories.
    fn download(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn exists(&self, key: &str) -> bool;

    fn uri(&self, key: &str) -> String;

    /// Audio keys stored for a species.
    fn list_species(&self, species: &str) -> Result<Vec<String>> {
        self.list(&species_prefix(species))
    }
}
