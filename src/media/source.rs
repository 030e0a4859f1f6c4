use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::unix_nanos;
use crate::foundation::error::{MediaError, MediaResult};

/// Immutable description of an input file, captured once per load request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaSource {
    path: PathBuf,
    extension: String,
    modified_time: u64,
}

impl MediaSource {
    /// Stat `path` and capture its absolute path, lowercase extension and modification time.
    ///
    /// Fails with [`MediaError::SourceNotFound`] when the path is missing or not a file.
    pub fn from_path(path: &Path) -> MediaResult<Self> {
        let abs = std::path::absolute(path)
            .with_context(|| format!("resolve absolute path for '{}'", path.display()))?;
        let modified_time = modified_time_of(&abs)?;
        let extension = abs
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        Ok(Self {
            path: abs,
            extension,
            modified_time,
        })
    }

    /// Absolute source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the dot; empty when the file has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Modification time at capture, in nanoseconds since the Unix epoch.
    pub fn modified_time(&self) -> u64 {
        self.modified_time
    }

    /// File stem for naming derived outputs; `"source"` when the name is not valid UTF-8.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("source")
    }
}

/// Read the current modification time of `path` in nanoseconds since the Unix epoch.
pub fn modified_time_of(path: &Path) -> MediaResult<u64> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("stat '{}'", path.display()))
                .into());
        }
    };
    if !meta.is_file() {
        return Err(MediaError::SourceNotFound(path.to_path_buf()));
    }
    let modified = meta
        .modified()
        .with_context(|| format!("read modification time of '{}'", path.display()))?;
    Ok(unix_nanos(modified))
}
