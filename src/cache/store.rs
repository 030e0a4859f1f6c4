use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::cache::sidecar::{self, SCHEMA_VERSION, SequenceCacheEntry};
use crate::foundation::core::{Fps, now_unix_nanos};
use crate::foundation::error::{MediaError, MediaResult};
use crate::media::source::{MediaSource, modified_time_of};
use crate::playback::sequence::FrameSequence;

const PATH_KEY_SEED: u64 = 0x6d65_6469_6170_7270;

/// ffmpeg output pattern for extracted frames.
pub const FRAME_PATTERN: &str = "frame_%04d.png";

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^frame_(\d{4,})\.png$").expect("frame pattern is valid"));

/// On-disk cache of extracted frame sequences and converted files.
///
/// Layout under `root`:
///
/// ```text
/// sequences/<stem>-<hash>/frame_0001.png ...
/// sequences/<stem>-<hash>/.mediaprep-cache.json
/// converted/<stem>-<hash>.<ext>
/// ```
///
/// `<hash>` is an xxh3 digest of the absolute source path, so two sources with the same
/// file name in different directories never share an entry.
#[derive(Clone, Debug)]
pub struct SequenceCacheStore {
    root: PathBuf,
}

impl SequenceCacheStore {
    /// Create a store rooted at `root`. Nothing is created on disk until a job writes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic frame directory for `source`.
    pub fn frame_dir_for(&self, source: &MediaSource) -> PathBuf {
        self.root.join("sequences").join(Self::entry_name(source))
    }

    /// Deterministic converted-file path for `source` with extension `ext`.
    pub fn converted_path_for(&self, source: &MediaSource, ext: &str) -> PathBuf {
        self.root
            .join("converted")
            .join(format!("{}.{ext}", Self::entry_name(source)))
    }

    fn entry_name(source: &MediaSource) -> String {
        let key = xxh3_64_with_seed(source.path().as_os_str().as_encoded_bytes(), PATH_KEY_SEED);
        format!("{}-{key:016x}", source.stem())
    }

    /// Return `true` when `dir` holds a complete, current extraction of `source`.
    ///
    /// Any mismatch invalidates the directory (sidecar and frames are deleted).
    pub fn is_valid(&self, source: &MediaSource, dir: &Path) -> bool {
        match self.check(source, dir) {
            Ok(entry) => {
                tracing::debug!(dir = %dir.display(), frames = entry.frame_count, "sequence cache hit");
                true
            }
            Err(err) => {
                if dir.exists() {
                    tracing::info!(dir = %dir.display(), %err, "invalidating sequence cache");
                    self.invalidate(dir);
                } else {
                    tracing::debug!(dir = %dir.display(), "sequence cache miss");
                }
                false
            }
        }
    }

    fn check(&self, source: &MediaSource, dir: &Path) -> MediaResult<SequenceCacheEntry> {
        let entry = sidecar::read(dir)?
            .ok_or_else(|| MediaError::cache_corrupt("no sidecar"))?;
        if entry.version != SCHEMA_VERSION {
            return Err(MediaError::cache_corrupt(format!(
                "schema version '{}' != '{SCHEMA_VERSION}'",
                entry.version
            )));
        }
        if entry.source_path != source.path() {
            return Err(MediaError::cache_corrupt(format!(
                "sidecar belongs to '{}'",
                entry.source_path.display()
            )));
        }
        // Re-stat: the source may have changed since the MediaSource was captured.
        let current = modified_time_of(source.path())?;
        if entry.source_modified_time != current {
            return Err(MediaError::cache_corrupt(format!(
                "source modified ({} != {current})",
                entry.source_modified_time
            )));
        }
        if Self::frame_files(dir).is_empty() {
            return Err(MediaError::cache_corrupt("no frame files"));
        }
        Ok(entry)
    }

    /// Record a completed extraction of `source` into `dir`.
    ///
    /// The modification time stored is the one captured in `source` when the request started,
    /// so an edit made during extraction invalidates the entry on the next check.
    pub fn write(&self, source: &MediaSource, dir: &Path, fps: Fps) -> MediaResult<SequenceCacheEntry> {
        let frame_count = Self::frame_files(dir).len();
        if frame_count == 0 {
            return Err(MediaError::OutputMissingAfterSuccess(dir.to_path_buf()));
        }
        let entry = SequenceCacheEntry {
            source_path: source.path().to_path_buf(),
            source_modified_time: source.modified_time(),
            created_time: now_unix_nanos(),
            version: SCHEMA_VERSION.to_owned(),
            frame_count,
            frame_rate: fps,
        };
        sidecar::write(dir, &entry)?;
        tracing::info!(dir = %dir.display(), frame_count, %fps, "sequence cache written");
        Ok(entry)
    }

    /// Delete the sidecar and every frame file in `dir`, then the directory if it is empty.
    pub fn invalidate(&self, dir: &Path) {
        let sidecars = [sidecar::sidecar_path(dir), sidecar::temp_path(dir)];
        for path in sidecars.into_iter().chain(Self::frame_files(dir)) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), %e, "failed to remove cache file"),
            }
        }
        let _ = std::fs::remove_dir(dir);
    }

    /// Frame files in `dir`, ordered by frame number. Empty when `dir` is missing.
    pub fn frame_files(dir: &Path) -> Vec<PathBuf> {
        let Ok(rd) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut frames: Vec<(u64, PathBuf)> = rd
            .filter_map(Result::ok)
            .filter_map(|e| {
                let name = e.file_name();
                let n = FRAME_RE
                    .captures(name.to_str()?)?
                    .get(1)?
                    .as_str()
                    .parse::<u64>()
                    .ok()?;
                Some((n, e.path()))
            })
            .collect();
        frames.sort_by_key(|(n, _)| *n);
        frames.into_iter().map(|(_, p)| p).collect()
    }

    /// Build the playable sequence for a directory whose sidecar has been validated.
    pub fn load_sequence(&self, dir: &Path) -> MediaResult<FrameSequence> {
        let entry = sidecar::read(dir)?
            .ok_or_else(|| MediaError::cache_corrupt(format!("no sidecar in '{}'", dir.display())))?;
        let frames = Self::frame_files(dir);
        if frames.is_empty() {
            return Err(MediaError::OutputMissingAfterSuccess(dir.to_path_buf()));
        }
        if frames.len() != entry.frame_count {
            tracing::warn!(
                dir = %dir.display(),
                recorded = entry.frame_count,
                found = frames.len(),
                "frame count differs from sidecar"
            );
        }
        Ok(FrameSequence::new(dir, entry.frame_rate, frames))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
