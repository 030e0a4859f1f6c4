use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::store::{FRAME_PATTERN, SequenceCacheStore};
use crate::config::JobTimings;
use crate::foundation::core::Fps;
use crate::foundation::error::MediaResult;
use crate::jobs::process::CommandSpec;
use crate::jobs::supervisor::{
    JobHandle, JobKey, JobOutput, JobRequest, JobStatus, JobSupervisor, TargetKind,
};
use crate::media::classify::Classification;
use crate::media::source::MediaSource;

/// Decodes alpha-carrying sources into RGBA PNG frame sequences.
#[derive(Debug)]
pub struct AlphaExtractor {
    supervisor: Arc<JobSupervisor>,
    store: Arc<SequenceCacheStore>,
    ffmpeg: PathBuf,
    timeout: Duration,
    expected: Duration,
    default_fps: Fps,
}

impl AlphaExtractor {
    /// Create an extractor that writes through `store` and runs `ffmpeg` via `supervisor`.
    pub fn new(
        supervisor: Arc<JobSupervisor>,
        store: Arc<SequenceCacheStore>,
        ffmpeg: impl Into<PathBuf>,
        timings: &JobTimings,
        default_fps: Fps,
    ) -> Self {
        Self {
            supervisor,
            store,
            ffmpeg: ffmpeg.into(),
            timeout: timings.extraction_timeout(),
            expected: timings.expected_duration(),
            default_fps,
        }
    }

    /// Decoder that keeps the alpha plane for `codec`.
    ///
    /// ffmpeg's built-in VP8/VP9 decoders drop the WebM alpha side channel; libvpx keeps it.
    pub fn decoder_for(codec: &str) -> Option<&'static str> {
        match codec.to_ascii_lowercase().as_str() {
            "vp9" => Some("libvpx-vp9"),
            "vp8" => Some("libvpx"),
            _ => None,
        }
    }

    /// Sampling rate: the probed rate, else the configured default.
    pub fn frame_rate_for(&self, classification: &Classification) -> Fps {
        classification.frame_rate.unwrap_or(self.default_fps)
    }

    /// Extraction command writing `frame_%04d.png` into `dir`.
    pub fn build_command(&self, classification: &Classification, dir: &Path) -> CommandSpec {
        let pattern = dir.join(FRAME_PATTERN);
        let mut cmd = CommandSpec::new(&self.ffmpeg, &pattern).args(["-y", "-hide_banner"]);
        if let Some(decoder) = classification
            .codec_name
            .as_deref()
            .and_then(Self::decoder_for)
        {
            cmd = cmd.args(["-c:v", decoder]);
        }
        let fps = self.frame_rate_for(classification);
        cmd.arg("-i")
            .arg(classification.source.path())
            .arg("-vf")
            .arg(format!("fps={}", fps.to_filter_value()))
            .args(["-pix_fmt", "rgba"])
            .arg(pattern)
    }

    /// Start extracting `classification.source` into `dir` without blocking.
    ///
    /// Any previous contents of `dir` are invalidated first. On success the sidecar is
    /// written before the job reports `Succeeded`.
    #[tracing::instrument(skip_all, fields(source = %classification.source.path().display(), dir = %dir.display()))]
    pub fn extract(&self, classification: &Classification, dir: &Path) -> MediaResult<JobHandle> {
        let fps = self.frame_rate_for(classification);
        let command = self.build_command(classification, dir);
        self.supervisor.submit(JobRequest {
            key: JobKey::new(classification.source.path(), TargetKind::AlphaExtraction),
            target: dir.to_path_buf(),
            command,
            timeout: self.timeout,
            expected_duration: classification.duration.unwrap_or(self.expected),
            output: Box::new(ExtractionOutput {
                store: Arc::clone(&self.store),
                source: classification.source.clone(),
                dir: dir.to_path_buf(),
                fps,
            }),
        })
    }

    /// Current status of `handle`.
    pub fn poll(&self, handle: &JobHandle) -> JobStatus {
        handle.status()
    }

    /// Cancel `handle`; `false` when it was already terminal.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        handle.cancel()
    }
}

struct ExtractionOutput {
    store: Arc<SequenceCacheStore>,
    source: MediaSource,
    dir: PathBuf,
    fps: Fps,
}

impl JobOutput for ExtractionOutput {
    fn prepare(&mut self) -> MediaResult<()> {
        self.store.invalidate(&self.dir);
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            anyhow::Error::new(e).context(format!("create '{}'", self.dir.display()))
        })?;
        Ok(())
    }

    fn verify(&self) -> bool {
        !SequenceCacheStore::frame_files(&self.dir).is_empty()
    }

    fn finalize(&mut self) -> MediaResult<()> {
        self.store.write(&self.source, &self.dir, self.fps).map(|_| ())
    }

    fn discard(&mut self) {
        self.store.invalidate(&self.dir);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/extract.rs"]
mod tests;
