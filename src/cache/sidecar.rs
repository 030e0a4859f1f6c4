use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::Fps;
use crate::foundation::error::{MediaError, MediaResult};

/// Sidecar file written into every extracted frame directory.
pub const SIDECAR_FILE_NAME: &str = ".mediaprep-cache.json";

/// Current sidecar schema version. Entries with any other version are stale.
pub const SCHEMA_VERSION: &str = "1";

/// Provenance record for one extracted frame directory.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SequenceCacheEntry {
    /// Absolute path of the source the frames were extracted from.
    pub source_path: PathBuf,
    /// Source modification time at extraction, ns since the Unix epoch.
    pub source_modified_time: u64,
    /// When the entry was written, ns since the Unix epoch.
    pub created_time: u64,
    /// Schema version.
    pub version: String,
    /// Number of frame files written.
    pub frame_count: usize,
    /// Rate the frames were sampled at.
    pub frame_rate: Fps,
}

/// Path of the sidecar inside `dir`.
pub fn sidecar_path(dir: &Path) -> PathBuf {
    dir.join(SIDECAR_FILE_NAME)
}

pub(crate) fn temp_path(dir: &Path) -> PathBuf {
    dir.join(format!("{SIDECAR_FILE_NAME}.tmp"))
}

/// Read the sidecar in `dir`. `Ok(None)` when there is none.
pub fn read(dir: &Path) -> MediaResult<Option<SequenceCacheEntry>> {
    let path = sidecar_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MediaError::cache_corrupt(format!(
                "read '{}': {e}",
                path.display()
            )));
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| MediaError::cache_corrupt(format!("parse '{}': {e}", path.display())))
}

/// Write `entry` as the sidecar of `dir`, replacing any previous one atomically.
pub fn write(dir: &Path, entry: &SequenceCacheEntry) -> MediaResult<()> {
    let path = sidecar_path(dir);
    let tmp = temp_path(dir);
    let json = serde_json::to_vec_pretty(entry).context("serialize cache sidecar")?;
    std::fs::write(&tmp, json).with_context(|| format!("write '{}'", tmp.display()))?;
    std::fs::rename(&tmp, &path)
        .with_context(|| format!("rename '{}' to '{}'", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/cache/sidecar.rs"]
mod tests;
