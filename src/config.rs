//! Pipeline configuration.
//!
//! Every field has a default, so a JSON config file only needs to name what it overrides:
//!
//! ```json
//! { "cache_root": "/var/cache/mediaprep", "jobs": { "transcode_timeout_secs": 300 } }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::{DEFAULT_FPS, Fps};
use crate::foundation::error::{MediaError, MediaResult};

/// Top-level configuration shared by the classifier, job runners, cache store and players.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory for converted files and extracted frame sequences.
    pub cache_root: PathBuf,
    /// External tool locations.
    pub tools: ToolPaths,
    /// Extension and codec allow-lists used by the classifier.
    pub formats: FormatLists,
    /// Supervision timings for external jobs.
    pub jobs: JobTimings,
    /// Output settings for the standard transcode path.
    pub transcode: TranscodeSettings,
    /// Frame playback defaults.
    pub playback: PlaybackSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().join("mediaprep-cache"),
            tools: ToolPaths::default(),
            formats: FormatLists::default(),
            jobs: JobTimings::default(),
            transcode: TranscodeSettings::default(),
            playback: PlaybackSettings::default(),
        }
    }
}

/// Locations of the external media tools. Bare names are resolved through `PATH`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    /// Transcoder / frame extractor executable.
    pub ffmpeg: PathBuf,
    /// Media-probe executable.
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Classification allow-lists. Extensions are compared lowercase without the leading dot.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatLists {
    /// Extensions the playback layer loads directly.
    pub native_extensions: Vec<String>,
    /// Extensions that can be converted through the transcoder.
    pub transcodable_extensions: Vec<String>,
    /// Containers assumed to carry alpha when the probe is unavailable.
    pub alpha_extensions: Vec<String>,
    /// Codec names that always carry an alpha plane.
    pub alpha_codecs: Vec<String>,
    /// Substrings of a pixel format name that mark an alpha plane.
    pub alpha_pixel_markers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for FormatLists {
    fn default() -> Self {
        Self {
            native_extensions: strings(&["ogv"]),
            transcodable_extensions: strings(&[
                "mp4", "m4v", "mov", "webm", "mkv", "avi", "wmv", "flv", "mpg", "mpeg", "gif",
            ]),
            alpha_extensions: strings(&["mov", "webm"]),
            alpha_codecs: strings(&["qtrle", "png", "apng"]),
            alpha_pixel_markers: strings(&[
                "yuva", "rgba", "bgra", "argb", "abgr", "gbrap", "ya8", "ya16",
            ]),
        }
    }
}

impl FormatLists {
    /// Return `true` when `ext` is in the native allow-list.
    pub fn is_native(&self, ext: &str) -> bool {
        contains_ignore_case(&self.native_extensions, ext)
    }

    /// Return `true` when `ext` is in the transcodable allow-list.
    pub fn is_transcodable(&self, ext: &str) -> bool {
        contains_ignore_case(&self.transcodable_extensions, ext)
    }

    /// Return `true` when `ext` is a container historically used for alpha-capable codecs.
    pub fn is_alpha_container(&self, ext: &str) -> bool {
        contains_ignore_case(&self.alpha_extensions, ext)
    }

    /// Return `true` when `codec` always carries alpha.
    pub fn is_alpha_codec(&self, codec: &str) -> bool {
        contains_ignore_case(&self.alpha_codecs, codec)
    }

    /// Return `true` when `pix_fmt` contains an alpha-plane marker.
    pub fn pixel_format_has_alpha(&self, pix_fmt: &str) -> bool {
        let pix_fmt = pix_fmt.to_ascii_lowercase();
        self.alpha_pixel_markers
            .iter()
            .any(|m| pix_fmt.contains(&m.to_ascii_lowercase()))
    }
}

fn contains_ignore_case(list: &[String], needle: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(needle))
}

/// Supervision timings for external jobs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobTimings {
    /// Liveness poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum wait for a standard transcode, in seconds.
    pub transcode_timeout_secs: u64,
    /// Maximum wait for an alpha frame extraction, in seconds.
    pub extraction_timeout_secs: u64,
    /// Assumed source duration for progress estimates when the probe did not report one.
    pub expected_duration_secs: u64,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            transcode_timeout_secs: 120,
            extraction_timeout_secs: 180,
            expected_duration_secs: 30,
        }
    }
}

impl JobTimings {
    /// Liveness poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Transcode timeout.
    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    /// Extraction timeout.
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Expected duration used for elapsed-time progress.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs(self.expected_duration_secs)
    }
}

/// Output settings for the standard transcode path.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscodeSettings {
    /// Extension of the converted file; must be in the native allow-list.
    pub container_extension: String,
    /// Video encoder name passed to `-c:v`.
    pub video_codec: String,
    /// Quality passed to `-q:v`.
    pub quality: String,
    /// Bitrate passed to `-b:v`.
    pub bitrate: String,
    /// Audio encoder name passed to `-c:a`; `None` drops audio.
    pub audio_codec: Option<String>,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            container_extension: "ogv".to_owned(),
            video_codec: "libtheora".to_owned(),
            quality: "7".to_owned(),
            bitrate: "8M".to_owned(),
            audio_codec: Some("libvorbis".to_owned()),
        }
    }
}

/// Frame playback defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackSettings {
    /// Maximum decoded frames kept per player.
    pub frame_cache_capacity: usize,
    /// Extraction and playback rate when the source rate is unknown.
    pub default_frame_rate: Fps,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            frame_cache_capacity: 30,
            default_frame_rate: DEFAULT_FPS,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> MediaResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes).map_err(|e| {
            MediaError::config(format!("parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return a copy with a different cache root.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> MediaResult<()> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(MediaError::config("cache_root must be non-empty"));
        }
        if self.tools.ffmpeg.as_os_str().is_empty() || self.tools.ffprobe.as_os_str().is_empty()
        {
            return Err(MediaError::config("tool paths must be non-empty"));
        }
        if self.jobs.poll_interval_ms == 0 {
            return Err(MediaError::config("jobs.poll_interval_ms must be > 0"));
        }
        if self.jobs.transcode_timeout_secs == 0 || self.jobs.extraction_timeout_secs == 0 {
            return Err(MediaError::config("job timeouts must be > 0"));
        }
        if self.jobs.expected_duration_secs == 0 {
            return Err(MediaError::config("jobs.expected_duration_secs must be > 0"));
        }
        if self.playback.frame_cache_capacity == 0 {
            return Err(MediaError::config(
                "playback.frame_cache_capacity must be > 0",
            ));
        }
        Fps::new(
            self.playback.default_frame_rate.num,
            self.playback.default_frame_rate.den,
        )?;

        let native: BTreeSet<String> = self
            .formats
            .native_extensions
            .iter()
            .map(|e| e.to_ascii_lowercase())
            .collect();
        if let Some(dup) = self
            .formats
            .transcodable_extensions
            .iter()
            .find(|e| native.contains(&e.to_ascii_lowercase()))
        {
            return Err(MediaError::config(format!(
                "extension '{dup}' is listed as both native and transcodable"
            )));
        }
        if !self.formats.is_native(&self.transcode.container_extension) {
            return Err(MediaError::config(format!(
                "transcode.container_extension '{}' is not a native extension",
                self.transcode.container_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
