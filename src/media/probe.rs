use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::foundation::core::Fps;
use crate::foundation::error::{MediaError, MediaResult};

/// Codec and pixel-format facts about the first video stream of a file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeReport {
    /// Codec name as reported by the probe (`vp9`, `h264`, `prores`, ...).
    pub codec_name: Option<String>,
    /// Pixel format name (`yuva420p`, `yuv420p`, ...).
    pub pixel_format: Option<String>,
    /// Stream frame rate, when the probe reported a usable one.
    pub frame_rate: Option<Fps>,
    /// Stream duration, when known up front.
    pub duration: Option<Duration>,
    /// `alpha_mode=1` stream tag (VP8/VP9 in WebM advertise alpha this way).
    pub alpha_mode: bool,
}

/// Media-probe seam used by the classifier.
pub trait MediaProber: Send + Sync {
    /// Read codec and pixel format of the first video stream in `path`.
    ///
    /// Any failure (tool missing, non-zero exit, empty output) is reported as
    /// [`MediaError::ProbeUnavailable`].
    fn probe(&self, path: &Path) -> MediaResult<ProbeReport>;
}

/// [`MediaProber`] backed by the `ffprobe` executable.
#[derive(Clone, Debug)]
pub struct FfprobeProber {
    program: PathBuf,
}

impl FfprobeProber {
    /// Create a prober that runs `program` (a bare name is resolved through `PATH`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments preceding the input path.
    pub fn args() -> [&'static str; 8] {
        [
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name,pix_fmt,r_frame_rate,duration:stream_tags=alpha_mode",
            "-of",
            "compact=p=0",
        ]
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> MediaResult<ProbeReport> {
        let out = Command::new(&self.program)
            .args(Self::args())
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                MediaError::probe_unavailable(format!(
                    "failed to run '{}': {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            return Err(MediaError::probe_unavailable(format!(
                "probe failed for '{}' ({}): {}",
                path.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        parse_compact(&String::from_utf8_lossy(&out.stdout))
    }
}

/// Parse `ffprobe -of compact=p=0` output for a single stream.
///
/// Expected shape: `codec_name=vp9|pix_fmt=yuva420p|r_frame_rate=30/1|duration=4.0|tag:alpha_mode=1`.
/// Only the first non-empty line is read.
pub fn parse_compact(stdout: &str) -> MediaResult<ProbeReport> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| MediaError::probe_unavailable("probe returned empty output"))?;

    let mut report = ProbeReport::default();
    for field in line.split('|') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "N/A" {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "codec_name" => report.codec_name = Some(value.to_owned()),
            "pix_fmt" => report.pixel_format = Some(value.to_owned()),
            "r_frame_rate" => report.frame_rate = Fps::parse(value),
            "duration" => {
                report.duration = value
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .map(Duration::from_secs_f64);
            }
            "tag:alpha_mode" => report.alpha_mode = value == "1",
            _ => {}
        }
    }

    if report.codec_name.is_none() && report.pixel_format.is_none() {
        return Err(MediaError::probe_unavailable(format!(
            "probe output has no codec or pixel format: '{line}'"
        )));
    }
    Ok(report)
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
