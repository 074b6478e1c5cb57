use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{ObjectMeta, ObjectStore, ObjectStoreError};

/// Filesystem-backed object store.
///
/// Objects are laid out under `root` with their key used verbatim as a
/// relative path, so `42/claude-code/sess-1/chunks/t.jsonl/chunk_....jsonl`
/// becomes a real nested path on disk. This mirrors the directory-per-key
/// layout of a content-addressed store but keys on the sync engine's
/// structural chunk key rather than a content hash, since chunks need to
/// be listable by `(session, file)` prefix rather than looked up by hash.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(ObjectStoreError::Other(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Other(format!("creating {parent:?}: {e}")))?;
        }
        // Write to a sibling temp file first so a concurrent reader never
        // observes a partially written chunk.
        let tmp_path = tmp_path_for(&path);
        fs::write(&tmp_path, &data)
            .await
            .map_err(|e| ObjectStoreError::Other(format!("writing {tmp_path:?}: {e}")))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| ObjectStoreError::Other(format!("renaming into {path:?}: {e}")))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(ObjectStoreError::Other(format!("reading {path:?}: {e}"))),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError> {
        let dir = self.object_path(prefix)?;
        let mut out = Vec::new();
        collect_recursive(&dir, prefix, &mut out).await?;
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Other(format!("removing {path:?}: {e}"))),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), ObjectStoreError> {
        let dir = self.object_path(prefix)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Other(format!("removing {dir:?}: {e}"))),
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.tmp"))
}

async fn collect_recursive(
    dir: &Path,
    key_prefix: &str,
    out: &mut Vec<ObjectMeta>,
) -> Result<(), ObjectStoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ObjectStoreError::Other(format!("listing {dir:?}: {e}"))),
    };

    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ObjectStoreError::Other(format!("listing {dir:?}: {e}")))?
    {
        children.push(entry);
    }

    for entry in children {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("stat {:?}: {e}", entry.path())))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_key = format!("{key_prefix}{name}");
        if file_type.is_dir() {
            Box::pin(collect_recursive(&entry.path(), &format!("{child_key}/"), out)).await?;
        } else if file_type.is_file() {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| ObjectStoreError::Other(format!("stat {:?}: {e}", entry.path())))?;
            out.push(ObjectMeta {
                key: child_key,
                size: meta.len(),
            });
        }
    }
    Ok(())
}
