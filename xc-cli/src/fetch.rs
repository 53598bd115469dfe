//! Download recordings into a bucket, optionally with spectrograms, and
//! write a metadata manifest next to them.

use anyhow::{bail, Context, Result};
use birdcall::{SpectrogramGenerator, SpectrogramOverrides, SpectrogramResult};
use birdcall_store::keys::species_path;
use birdcall_store::{metadata_key, raw_audio_key, spectrogram_key, ObjectStore};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use xc_lib::{Recording, SearchQuery, XenoCantoClient};

/// Manifest entry for one stored recording.
#[derive(Debug, Serialize)]
pub struct StoredRecording {
    pub recording: Recording,
    pub audio_uri: String,
    pub audio_sha256: String,
    pub audio_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrogram_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrogram: Option<SpectrogramResult>,
}

pub struct FetchJob<'a, S> {
    pub client: &'a XenoCantoClient,
    pub store: &'a S,
    pub work_dir: PathBuf,
    /// Render and upload a spectrogram for each recording when set.
    pub generator: Option<Arc<SpectrogramGenerator>>,
}

/// Folder name for a recording: common name if known, else scientific.
pub fn species_label(recording: &Recording) -> String {
    if recording.english_name.trim().is_empty() {
        recording.scientific_name()
    } else {
        recording.english_name.clone()
    }
}

impl<S: ObjectStore> FetchJob<'_, S> {
    pub async fn run(
        &self,
        query: &SearchQuery,
        max: Option<usize>,
        per_page: u32,
    ) -> Result<Vec<StoredRecording>> {
        let recordings = self.client.all_recordings(query, max, per_page).await?;
        let total = recordings.len();
        info!("{total} recordings to fetch");

        let mut stored = Vec::with_capacity(recordings.len());
        for recording in recordings {
            let id = recording.id.clone();
            match self.fetch_one(recording).await {
                Ok(entry) => stored.push(entry),
                Err(e) => warn!("XC{id}: {e:#}"),
            }
        }

        let manifest = self.work_dir.join("recordings_metadata.json");
        std::fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("creating {}", self.work_dir.display()))?;
        std::fs::write(&manifest, serde_json::to_string_pretty(&stored)?)
            .with_context(|| format!("writing {}", manifest.display()))?;
        let uri = self
            .store
            .upload(&manifest, &metadata_key("recordings_metadata", ".json"), None)?;
        info!("stored {} recordings, manifest at {uri}", stored.len());
        check_failures(total, stored.len())?;
        Ok(stored)
    }

    async fn fetch_one(&self, recording: Recording) -> Result<StoredRecording> {
        let species = species_label(&recording);
        let ext = recording.file_extension();
        let local = self
            .work_dir
            .join("raw-audio")
            .join(species_path(&species))
            .join(format!("{}{ext}", recording.id));

        let downloaded = self.client.download_audio(&recording, &local).await?;
        let metadata = recording.object_metadata();
        let audio_uri = self.store.upload(
            &downloaded.path,
            &raw_audio_key(&species, &recording.id, &ext),
            Some(&metadata),
        )?;

        let (spectrogram_uri, spectrogram) = match &self.generator {
            Some(generator) => {
                let png = self
                    .work_dir
                    .join("spectrograms")
                    .join(species_path(&species))
                    .join(format!("{}.png", recording.id));
                let result = render(generator.clone(), downloaded.path.clone(), png.clone()).await?;
                let mut png_meta = metadata.clone();
                png_meta.insert("spectrogram-params".to_string(), result.spectrogram_params.clone());
                let uri = self
                    .store
                    .upload(&png, &spectrogram_key(&species, &recording.id), Some(&png_meta))?;
                (Some(uri), Some(result))
            }
            None => (None, None),
        };

        Ok(StoredRecording {
            recording,
            audio_uri,
            audio_sha256: downloaded.sha256,
            audio_bytes: downloaded.bytes,
            spectrogram_uri,
            spectrogram,
        })
    }
}

/// Run spectrogram generation off the async runtime.
pub async fn render(
    generator: Arc<SpectrogramGenerator>,
    audio: PathBuf,
    output: PathBuf,
) -> Result<SpectrogramResult> {
    let result = tokio::task::spawn_blocking(move || {
        generator.generate(&audio, &output, &SpectrogramOverrides::default())
    })
    .await??;
    Ok(result)
}

/// Fail the run if any recording could not be stored.
pub fn check_failures(total: usize, stored: usize) -> Result<()> {
    if stored < total {
        bail!("{} of {total} recordings failed", total - stored);
    }
    Ok(())
}

/// `<out_dir>/<input stem>.png`
pub fn png_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrogram".to_string());
    out_dir.join(format!("{stem}.png"))
}

/// One PNG path per input. Inputs that would write the same file are
/// rejected, since they run in parallel.
pub fn output_paths(out_dir: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output = png_path(out_dir, input);
        if let Some(first) = seen.insert(output.clone(), input.as_path()) {
            bail!(
                "{} and {} would both write {}",
                first.display(),
                input.display(),
                output.display()
            );
        }
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(json: serde_json::Value) -> Recording {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn label_prefers_common_name() {
        let r = recording(serde_json::json!({"id": "1", "gen": "Turdus", "sp": "migratorius", "en": "American Robin"}));
        assert_eq!(species_label(&r), "American Robin");
        let r = recording(serde_json::json!({"id": "2", "gen": "Turdus", "sp": "migratorius"}));
        assert_eq!(species_label(&r), "Turdus migratorius");
    }

    #[test]
    fn png_path_uses_stem() {
        assert_eq!(
            png_path(Path::new("out"), Path::new("/data/XC123.mp3")),
            Path::new("out").join("XC123.png")
        );
    }

    #[test]
    fn shared_stems_are_rejected() {
        let out = Path::new("out");
        let inputs = vec![PathBuf::from("a/XC1.mp3"), PathBuf::from("b/XC1.wav")];
        let err = output_paths(out, &inputs).unwrap_err();
        assert!(err.to_string().contains("XC1.png"), "{err}");

        let inputs = vec![PathBuf::from("a/XC1.mp3"), PathBuf::from("a/XC2.mp3")];
        assert_eq!(
            output_paths(out, &inputs).unwrap(),
            vec![out.join("XC1.png"), out.join("XC2.png")]
        );
    }

    #[test]
    fn any_failed_recording_fails_the_run() {
        assert!(check_failures(3, 3).is_ok());
        assert!(check_failures(0, 0).is_ok());
        let err = check_failures(3, 2).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 recordings failed");
        assert!(check_failures(2, 0).is_err());
    }
}
