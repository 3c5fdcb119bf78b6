//! On-disk snapshot format.
//!
//! ```text
//! facts-<blake3(epoch)[..16]>.bin
//! ┌──────────────────┬──────────────────────────────────────────┐
//! │ format (u32 LE)  │ bincode { epoch, entries: [Entry] }      │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! The version prefix is checked before the payload is decoded so an old
//! layout is rejected without parsing it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{CacheError, FactValue};
use crate::runtime::Runtime;

/// Current snapshot format. Bump when [`Entry`] or [`FactValue`] change shape.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Entry {
    pub path: PathBuf,
    pub mtime: Option<u64>,
    pub facts: Vec<(String, FactValue)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    epoch: String,
    entries: Vec<Entry>,
}

/// Snapshot file for `epoch` under `dir`.
pub fn snapshot_path(dir: &Path, epoch: &str) -> PathBuf {
    let hash = blake3::hash(epoch.as_bytes()).to_hex();
    dir.join(format!("facts-{}.bin", &hash[..16]))
}

pub(super) async fn read(
    runtime: &dyn Runtime,
    file: &Path,
    epoch: &str,
) -> Result<Vec<Entry>, CacheError> {
    let bytes = runtime
        .read_file(file)
        .await
        .map_err(|e| CacheError::Io(e.to_string()))?;

    let Some((header, body)) = bytes.split_first_chunk::<4>() else {
        return Err(CacheError::Corrupted("truncated header".to_string()));
    };
    let found = u32::from_le_bytes(*header);
    if found != FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: FORMAT_VERSION,
            found,
        });
    }

    let payload: Payload =
        bincode::deserialize(body).map_err(|e| CacheError::Deserialization(e.to_string()))?;

    if payload.epoch != epoch {
        return Err(CacheError::Corrupted(format!(
            "snapshot epoch '{}' does not match '{}'",
            payload.epoch, epoch
        )));
    }

    Ok(payload.entries)
}

/// Serialize `entries` and move the file into place atomically.
pub(super) async fn write(
    runtime: &dyn Runtime,
    dir: &Path,
    epoch: &str,
    entries: Vec<Entry>,
) -> Result<PathBuf, CacheError> {
    let payload = Payload {
        epoch: epoch.to_string(),
        entries,
    };
    let body = bincode::serialize(&payload).map_err(|e| CacheError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(body.len() + 4);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);

    runtime
        .create_dir(dir, true)
        .await
        .map_err(|e| CacheError::Io(e.to_string()))?;

    let file = snapshot_path(dir, epoch);
    let tmp = file.with_extension("bin.tmp");
    runtime
        .write_file(&tmp, &bytes)
        .await
        .map_err(|e| CacheError::Io(e.to_string()))?;
    runtime
        .rename(&tmp, &file)
        .await
        .map_err(|e| CacheError::Io(e.to_string()))?;

    tracing::debug!(path = %file.display(), bytes = bytes.len(), "persisted cache snapshot");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_utils::TestRuntime;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_path_depends_on_epoch() {
        let dir = Path::new("/cache");
        assert_ne!(snapshot_path(dir, "a"), snapshot_path(dir, "b"));
        assert_eq!(snapshot_path(dir, "a"), snapshot_path(dir, "a"));
        assert!(
            snapshot_path(dir, "a")
                .to_string_lossy()
                .starts_with("/cache/facts-")
        );
    }

    #[tokio::test]
    async fn test_old_format_is_rejected() {
        let temp = TempDir::new().unwrap();
        let runtime = TestRuntime::new(temp.path().to_path_buf());
        let file = temp.path().join("facts.bin");

        let mut bytes = 99u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"payload");
        fs::write(&file, bytes).unwrap();

        let err = read(&runtime, &file, "epoch").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: 99
            }
        ));
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let runtime = TestRuntime::new(temp.path().to_path_buf());
        let dir = temp.path().join("nested/cache");

        let file = write(&runtime, &dir, "epoch", Vec::new()).await.unwrap();
        assert!(file.exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);

        let entries = read(&runtime, &file, "epoch").await.unwrap();
        assert!(entries.is_empty());
    }
}
