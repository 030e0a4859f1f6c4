use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{JobTimings, TranscodeSettings};
use crate::foundation::error::MediaResult;
use crate::jobs::process::CommandSpec;
use crate::jobs::supervisor::{
    JobHandle, JobKey, JobOutput, JobRequest, JobStatus, JobSupervisor, TargetKind,
};
use crate::media::source::{MediaSource, modified_time_of};

/// Runs standard transcodes into a native container.
#[derive(Debug)]
pub struct ConversionOrchestrator {
    supervisor: Arc<JobSupervisor>,
    ffmpeg: PathBuf,
    settings: TranscodeSettings,
    timeout: Duration,
    expected: Duration,
}

impl ConversionOrchestrator {
    /// Create an orchestrator that runs `ffmpeg` through `supervisor`.
    pub fn new(
        supervisor: Arc<JobSupervisor>,
        ffmpeg: impl Into<PathBuf>,
        settings: TranscodeSettings,
        timings: &JobTimings,
    ) -> Self {
        Self {
            supervisor,
            ffmpeg: ffmpeg.into(),
            settings,
            timeout: timings.transcode_timeout(),
            expected: timings.expected_duration(),
        }
    }

    /// Output settings in use.
    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    /// Temporary output path next to `target`: `clip.ogv` becomes `clip.partial.ogv`.
    pub fn partial_path(target: &Path) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match target.extension() {
            Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
            None => format!("{stem}.partial"),
        };
        target.with_file_name(name)
    }

    /// Return `true` when `target` holds a non-empty conversion of this exact `source`.
    ///
    /// A published conversion carries its source's modification time, so any edit to the
    /// source, including a restore to older content, invalidates it.
    pub fn reusable_output(source: &MediaSource, target: &Path) -> bool {
        let non_empty = std::fs::metadata(target).is_ok_and(|m| m.is_file() && m.len() > 0);
        non_empty && modified_time_of(target).is_ok_and(|t| t == source.modified_time())
    }

    /// Transcode command writing to `out`.
    pub fn build_command(&self, input: &Path, out: &Path) -> CommandSpec {
        let s = &self.settings;
        let mut cmd = CommandSpec::new(&self.ffmpeg, out)
            .args(["-y", "-hide_banner", "-i"])
            .arg(input)
            .args(["-c:v", s.video_codec.as_str()])
            .args(["-q:v", s.quality.as_str()])
            .args(["-b:v", s.bitrate.as_str()]);
        cmd = match &s.audio_codec {
            Some(codec) => cmd.args(["-c:a", codec.as_str()]),
            None => cmd.arg("-an"),
        };
        cmd.arg(out)
    }

    /// Start converting `source` into `target` without blocking.
    pub fn start(&self, source: &MediaSource, target: &Path) -> MediaResult<JobHandle> {
        self.start_with_duration(source, target, None)
    }

    /// Like [`ConversionOrchestrator::start`], estimating progress against `duration` when known.
    #[tracing::instrument(skip_all, fields(source = %source.path().display(), target = %target.display()))]
    pub fn start_with_duration(
        &self,
        source: &MediaSource,
        target: &Path,
        duration: Option<Duration>,
    ) -> MediaResult<JobHandle> {
        let partial = Self::partial_path(target);
        let command = self.build_command(source.path(), &partial);
        self.supervisor.submit(JobRequest {
            key: JobKey::new(source.path(), TargetKind::StandardTranscode),
            target: target.to_path_buf(),
            command,
            timeout: self.timeout,
            expected_duration: duration.unwrap_or(self.expected),
            output: Box::new(TranscodeOutput {
                partial,
                target: target.to_path_buf(),
                source_modified: UNIX_EPOCH + Duration::from_nanos(source.modified_time()),
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

/// Partial file beside the target, renamed into place on success.
#[derive(Debug)]
struct TranscodeOutput {
    partial: PathBuf,
    target: PathBuf,
    /// Stamped onto the published file as its modification time.
    source_modified: SystemTime,
}

impl JobOutput for TranscodeOutput {
    fn prepare(&mut self) -> MediaResult<()> {
        if let Some(parent) = self.target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::Error::new(e).context(format!("create '{}'", parent.display()))
            })?;
        }
        remove_if_present(&self.partial);
        Ok(())
    }

    fn verify(&self) -> bool {
        std::fs::metadata(&self.partial).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    fn finalize(&mut self) -> MediaResult<()> {
        std::fs::File::options()
            .write(true)
            .open(&self.partial)
            .and_then(|f| f.set_modified(self.source_modified))
            .map_err(|e| {
                anyhow::Error::new(e).context(format!("stamp '{}'", self.partial.display()))
            })?;
        std::fs::rename(&self.partial, &self.target).map_err(|e| {
            anyhow::Error::new(e)
                .context(format!(
                    "publish '{}' as '{}'",
                    self.partial.display(),
                    self.target.display()
                ))
                .into()
        })
    }

    fn discard(&mut self) {
        remove_if_present(&self.partial);
        remove_if_present(&self.target);
    }
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), %e, "failed to remove output"),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/transcode.rs"]
mod tests;
