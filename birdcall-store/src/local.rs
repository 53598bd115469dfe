use crate::error::{Result, StoreError};
use crate::keys::{validate_key, META_SUFFIX};
use crate::{Metadata, ObjectStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A bucket backed by a local directory. Object keys map onto relative paths
/// under the root; metadata lives in a `<key>.meta.json` sidecar.
#[derive(Clone, Debug)]
pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn open(root: impl Into<PathBuf>, create_if_missing: bool) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            if !create_if_missing {
                return Err(StoreError::MissingBucket(root));
            }
            fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
            log::info!("created bucket {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |p, part| p.join(part))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        let path = self.object_path(key);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{name}{META_SUFFIX}"))
    }

    /// Metadata stored with `key`, empty when none was given.
    pub fn metadata(&self, key: &str) -> Result<Metadata> {
        validate_key(key)?;
        if !self.object_path(key).is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let path = self.meta_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Metadata::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Metadata {
            key: key.to_string(),
            source,
        })
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Hidden names are in-flight temp files.
            if name.starts_with('.') || name.ends_with(META_SUFFIX) {
                continue;
            }
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry.file_type().map_err(|e| StoreError::io(entry.path(), e))?;
            if file_type.is_dir() {
                self.collect_keys(&entry.path(), &key, out)?;
            } else {
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalBucket {
    fn upload(&self, local_path: &Path, key: &str, metadata: Option<&Metadata>) -> Result<String> {
        validate_key(key)?;
        if !local_path.is_file() {
            return Err(StoreError::io(
                local_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            ));
        }
        let dest = self.object_path(key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = temp_sibling(&dest);
        if let Err(e) = fs::copy(local_path, &tmp).and_then(|_| fs::rename(&tmp, &dest)) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(dest, e));
        }

        let meta_path = self.meta_path(key);
        match metadata.filter(|m| !m.is_empty()) {
            Some(m) => {
                let text = serde_json::to_string_pretty(m).map_err(|source| StoreError::Metadata {
                    key: key.to_string(),
                    source,
                })?;
                fs::write(&meta_path, text).map_err(|e| StoreError::io(&meta_path, e))?;
            }
            None => match fs::remove_file(&meta_path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    return Err(StoreError::io(meta_path, e));
                }
                _ => {}
            },
        }

        log::debug!("uploaded {} -> {key}", local_path.display());
        Ok(self.uri(key))
    }

    fn download(&self, key: &str, local_path: &Path) -> Result<()> {
        validate_key(key)?;
        let src = self.object_path(key);
        if !src.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        fs::copy(&src, local_path).map_err(|e| StoreError::io(local_path, e))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, "", &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.object_path(key).is_file()
    }

    fn uri(&self, key: &str) -> String {
        format!("file://{}", self.object_path(key).display())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}-{n}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("birdcall-store-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_bucket_requires_create_flag() {
        let dir = scratch("missing").join("bucket");
        assert!(matches!(
            LocalBucket::open(&dir, false),
            Err(StoreError::MissingBucket(_))
        ));
        let bucket = LocalBucket::open(&dir, true).unwrap();
        assert!(bucket.root().is_dir());
    }

    #[test]
    fn sidecars_and_temp_files_are_not_listed() {
        let dir = scratch("hidden");
        let bucket = LocalBucket::open(dir.join("b"), true).unwrap();
        let src = dir.join("a.wav");
        fs::write(&src, b"RIFF").unwrap();

        let mut meta = Metadata::new();
        meta.insert("xc-id".into(), "1".into());
        bucket.upload(&src, "raw-audio/x/1.wav", Some(&meta)).unwrap();
        fs::write(bucket.root().join("raw-audio/x/.2.wav.1-0.tmp"), b"").unwrap();

        assert_eq!(bucket.list("").unwrap(), vec!["raw-audio/x/1.wav".to_string()]);
        assert_eq!(bucket.metadata("raw-audio/x/1.wav").unwrap(), meta);
    }

    #[test]
    fn reupload_without_metadata_drops_sidecar() {
        let dir = scratch("reupload");
        let bucket = LocalBucket::open(dir.join("b"), true).unwrap();
        let src = dir.join("a.wav");
        fs::write(&src, b"one").unwrap();

        let mut meta = Metadata::new();
        meta.insert("k".into(), "v".into());
        bucket.upload(&src, "k/a.wav", Some(&meta)).unwrap();
        bucket.upload(&src, "k/a.wav", None).unwrap();
        assert!(bucket.metadata("k/a.wav").unwrap().is_empty());
    }
}
