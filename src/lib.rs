//! mediaprep prepares video sources for playback.
//!
//! A load request flows through four stages:
//!
//! - classify the source by extension and an optional `ffprobe` pass ([`Classifier`])
//! - play native files directly, or convert them with a supervised `ffmpeg` job
//!   ([`ConversionOrchestrator`])
//! - decode alpha-carrying sources into RGBA PNG frame sequences ([`AlphaExtractor`]) that are
//!   cached on disk with a provenance sidecar ([`SequenceCacheStore`])
//! - play frame sequences through a bounded decoded-frame cache ([`SequencePlayer`])
//!
//! [`MediaPipeline`] ties the stages together behind a non-blocking `request_load` API.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod config;
mod foundation;
mod jobs;
mod media;
mod pipeline;
mod playback;

pub use crate::cache::sidecar::{SCHEMA_VERSION, SIDECAR_FILE_NAME, SequenceCacheEntry};
pub use crate::cache::store::{FRAME_PATTERN, SequenceCacheStore};
pub use crate::config::{
    FormatLists, JobTimings, PipelineConfig, PlaybackSettings, ToolPaths, TranscodeSettings,
};
pub use crate::foundation::core::{DEFAULT_FPS, Fps, now_unix_nanos, unix_nanos};
pub use crate::foundation::error::{ErrorKind, FailureReason, MediaError, MediaResult};
pub use crate::jobs::extract::AlphaExtractor;
pub use crate::jobs::process::{
    CommandSpec, ExitOutcome, ProcessLauncher, RunningProcess, SystemLauncher,
};
pub use crate::jobs::progress::{ProgressEstimator, parse_progress_time};
pub use crate::jobs::supervisor::{
    JobHandle, JobId, JobKey, JobOutput, JobRequest, JobSnapshot, JobStatus, JobSupervisor,
    TargetKind,
};
pub use crate::jobs::transcode::ConversionOrchestrator;
pub use crate::media::classify::{
    Classification, ClassificationKind, Classifier, DetectionMethod,
};
pub use crate::media::probe::{FfprobeProber, MediaProber, ProbeReport, parse_compact};
pub use crate::media::source::{MediaSource, modified_time_of};
pub use crate::pipeline::facade::MediaPipeline;
pub use crate::pipeline::load::{
    Asset, LoadEvent, LoadFailure, LoadState, LoadTarget, LoadTicket,
};
pub use crate::playback::cursor::{CursorStep, PlaybackCursor, PlaybackState};
pub use crate::playback::frame_cache::{FrameCache, FrameImage, FrameLoader, ImageFileLoader};
pub use crate::playback::player::{PlayerTick, SequencePlayer};
pub use crate::playback::sequence::FrameSequence;
