use std::path::{Path, PathBuf};

use crate::foundation::core::Fps;

/// Ordered frame files of an extracted sequence plus the rate they were sampled at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    directory: PathBuf,
    frame_rate: Fps,
    frames: Vec<PathBuf>,
}

impl FrameSequence {
    /// Build a sequence from already ordered frame paths.
    pub fn new(directory: impl Into<PathBuf>, frame_rate: Fps, frames: Vec<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            frame_rate,
            frames,
        }
    }

    /// Directory holding the frames and the sidecar.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Playback rate.
    pub fn frame_rate(&self) -> Fps {
        self.frame_rate
    }

    /// Frame paths in display order.
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Path of frame `index`.
    pub fn frame_path(&self, index: usize) -> Option<&Path> {
        self.frames.get(index).map(PathBuf::as_path)
    }

    /// Total duration at the sampled rate.
    pub fn duration(&self) -> std::time::Duration {
        self.frame_rate.frame_duration() * u32::try_from(self.frames.len()).unwrap_or(u32::MAX)
    }
}
