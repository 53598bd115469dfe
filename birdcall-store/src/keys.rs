//! Bucket key layout.
//!
//! ```text
//! raw-audio/<species>/<recording id><ext>
//! spectrograms/<species>/<recording id>.png
//! metadata/<name><ext>
//! ```
//!
//! `<species>` is the species name lowercased with spaces replaced by
//! underscores.

use crate::error::{Result, StoreError};

pub const RAW_AUDIO_PREFIX: &str = "raw-audio";
pub const SPECTROGRAM_PREFIX: &str = "spectrograms";
pub const METADATA_PREFIX: &str = "metadata";

/// Suffix of the sidecar file holding an object's metadata.
pub const META_SUFFIX: &str = ".meta.json";

pub fn species_path(species: &str) -> String {
    species
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// `raw-audio/<species>/`, the prefix under which a species' audio lives.
pub fn species_prefix(species: &str) -> String {
    format!("{RAW_AUDIO_PREFIX}/{}/", species_path(species))
}

/// Key for a downloaded recording. An empty extension means `.mp3`.
pub fn raw_audio_key(species: &str, recording_id: &str, ext: &str) -> String {
    format!("{}{recording_id}{}", species_prefix(species), normalize_ext(ext, ".mp3"))
}

pub fn spectrogram_key(species: &str, recording_id: &str) -> String {
    format!(
        "{SPECTROGRAM_PREFIX}/{}/{recording_id}.png",
        species_path(species)
    )
}

pub fn metadata_key(name: &str, ext: &str) -> String {
    format!("{METADATA_PREFIX}/{name}{}", normalize_ext(ext, ""))
}

fn normalize_ext(ext: &str, default: &str) -> String {
    let ext = ext.trim();
    if ext.is_empty() {
        default.to_string()
    } else if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Reject keys that could escape the bucket or collide with sidecars.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = |reason| {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return invalid("empty");
    }
    if key.starts_with('/') || key.contains('\\') {
        return invalid("must be a relative path using '/'");
    }
    if key.ends_with(META_SUFFIX) {
        return invalid("reserved suffix");
    }
    for part in key.split('/') {
        match part {
            "" => return invalid("empty path component"),
            "." | ".." => return invalid("relative path component"),
            // Leading-dot names are reserved for in-flight temp files.
            p if p.starts_with('.') => return invalid("hidden path component"),
            _ => {}
        }
    }
    Ok(())
}
