use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FormatLists;
use crate::foundation::core::Fps;
use crate::foundation::error::MediaResult;
use crate::media::probe::{MediaProber, ProbeReport};
use crate::media::source::MediaSource;

/// Handling strategy chosen for a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassificationKind {
    /// The playback layer can load the file directly.
    NativePlayable,
    /// Convert to a native format through the transcoder.
    NeedsTranscode,
    /// Decode to an RGBA frame sequence to preserve the alpha plane.
    NeedsAlphaExtraction,
    /// Neither native nor transcodable.
    Unsupported,
}

/// How the alpha decision was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMethod {
    /// Decided from the extension alone; no probe was run.
    Extension,
    /// Decided from the probe report.
    Probe,
    /// The probe failed; the container extension heuristic was used.
    Heuristic,
}

/// Result of inspecting a [`MediaSource`].
#[derive(Clone, Debug)]
pub struct Classification {
    /// The inspected source.
    pub source: MediaSource,
    /// Chosen handling strategy.
    pub kind: ClassificationKind,
    /// Whether the source is treated as carrying an alpha plane.
    pub has_alpha: bool,
    /// Raw codec name from the probe, for diagnostics.
    pub codec_name: Option<String>,
    /// Raw pixel format from the probe, for diagnostics.
    pub pixel_format: Option<String>,
    /// Detected stream frame rate.
    pub frame_rate: Option<Fps>,
    /// Detected stream duration.
    pub duration: Option<Duration>,
    /// How `has_alpha` was decided.
    pub method: DetectionMethod,
}

/// Extension allow-lists plus an optional probe, with a heuristic fallback.
#[derive(Clone)]
pub struct Classifier {
    formats: FormatLists,
    prober: Arc<dyn MediaProber>,
}

impl Classifier {
    /// Create a classifier over `formats` that probes through `prober`.
    pub fn new(formats: FormatLists, prober: Arc<dyn MediaProber>) -> Self {
        Self { formats, prober }
    }

    /// Allow-lists in use.
    pub fn formats(&self) -> &FormatLists {
        &self.formats
    }

    /// Stat and classify `path`. Fails only with `SourceNotFound` (or an IO error on stat).
    pub fn classify(&self, path: &Path) -> MediaResult<Classification> {
        let source = MediaSource::from_path(path)?;
        Ok(self.classify_source(source))
    }

    /// Classify an already captured source. Never fails: probe errors degrade to the heuristic.
    #[tracing::instrument(skip(self, source), fields(path = %source.path().display()))]
    pub fn classify_source(&self, source: MediaSource) -> Classification {
        let ext = source.extension().to_owned();

        if self.formats.is_native(&ext) {
            tracing::debug!(%ext, "native extension, skipping probe");
            return Self::without_probe(source, ClassificationKind::NativePlayable, false);
        }
        if !self.formats.is_transcodable(&ext) {
            tracing::debug!(%ext, "extension not in any allow-list");
            return Self::without_probe(source, ClassificationKind::Unsupported, false);
        }

        match self.prober.probe(source.path()) {
            Ok(report) => {
                let has_alpha = self.report_has_alpha(&report);
                tracing::debug!(
                    codec = report.codec_name.as_deref().unwrap_or("?"),
                    pix_fmt = report.pixel_format.as_deref().unwrap_or("?"),
                    has_alpha,
                    "probe succeeded"
                );
                let ProbeReport {
                    codec_name,
                    pixel_format,
                    frame_rate,
                    duration,
                    ..
                } = report;
                Classification {
                    source,
                    kind: Self::route(has_alpha),
                    has_alpha,
                    codec_name,
                    pixel_format,
                    frame_rate,
                    duration,
                    method: DetectionMethod::Probe,
                }
            }
            Err(err) => {
                let has_alpha = self.formats.is_alpha_container(&ext);
                tracing::warn!(%err, has_alpha, "probe unavailable, using extension heuristic");
                Classification {
                    source,
                    kind: Self::route(has_alpha),
                    has_alpha,
                    codec_name: None,
                    pixel_format: None,
                    frame_rate: None,
                    duration: None,
                    method: DetectionMethod::Heuristic,
                }
            }
        }
    }

    fn report_has_alpha(&self, report: &ProbeReport) -> bool {
        report.alpha_mode
            || report
                .pixel_format
                .as_deref()
                .is_some_and(|p| self.formats.pixel_format_has_alpha(p))
            || report
                .codec_name
                .as_deref()
                .is_some_and(|c| self.formats.is_alpha_codec(c))
    }

    fn route(has_alpha: bool) -> ClassificationKind {
        if has_alpha {
            ClassificationKind::NeedsAlphaExtraction
        } else {
            ClassificationKind::NeedsTranscode
        }
    }

    fn without_probe(
        source: MediaSource,
        kind: ClassificationKind,
        has_alpha: bool,
    ) -> Classification {
        Classification {
            source,
            kind,
            has_alpha,
            codec_name: None,
            pixel_format: None,
            frame_rate: None,
            duration: None,
            method: DetectionMethod::Extension,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/classify.rs"]
mod tests;
