use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::cache::store::SequenceCacheStore;
use crate::config::PipelineConfig;
use crate::foundation::error::{ErrorKind, MediaError, MediaResult};
use crate::jobs::extract::AlphaExtractor;
use crate::jobs::process::{ProcessLauncher, SystemLauncher};
use crate::jobs::supervisor::{JobHandle, JobStatus, JobSupervisor};
use crate::jobs::transcode::ConversionOrchestrator;
use crate::media::classify::{Classification, ClassificationKind, Classifier};
use crate::media::probe::{FfprobeProber, MediaProber};
use crate::pipeline::load::{Asset, LoadFailure, LoadShared, LoadState, LoadTarget, LoadTicket};
use crate::playback::player::SequencePlayer;
use crate::playback::sequence::FrameSequence;

/// Entry point for collaborators: classify a source, route it, and report the asset.
///
/// Loads run on background threads; [`MediaPipeline::request_load`] returns immediately.
/// Requests for a source that is already loading share the in-flight load.
#[derive(Clone, Debug)]
pub struct MediaPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    store: Arc<SequenceCacheStore>,
    classifier: Classifier,
    supervisor: Arc<JobSupervisor>,
    orchestrator: ConversionOrchestrator,
    extractor: AlphaExtractor,
    inflight: Mutex<HashMap<PathBuf, Arc<LoadShared>>>,
    next_load: AtomicU64,
}

impl std::fmt::Debug for PipelineInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineInner")
            .field("cache_root", &self.store.root())
            .field("inflight", &self.inflight.lock().len())
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    /// Pipeline using `ffprobe` and `ffmpeg` from `config.tools`.
    pub fn new(config: PipelineConfig, store: Arc<SequenceCacheStore>) -> MediaResult<Self> {
        let prober = Arc::new(FfprobeProber::new(config.tools.ffprobe.clone()));
        Self::with_tools(config, store, prober, Arc::new(SystemLauncher::new()))
    }

    /// Pipeline with explicit probe and process-launch implementations.
    pub fn with_tools(
        config: PipelineConfig,
        store: Arc<SequenceCacheStore>,
        prober: Arc<dyn MediaProber>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> MediaResult<Self> {
        config.validate()?;
        let supervisor = Arc::new(JobSupervisor::new(launcher, config.jobs.poll_interval()));
        let orchestrator = ConversionOrchestrator::new(
            Arc::clone(&supervisor),
            config.tools.ffmpeg.clone(),
            config.transcode.clone(),
            &config.jobs,
        );
        let extractor = AlphaExtractor::new(
            Arc::clone(&supervisor),
            Arc::clone(&store),
            config.tools.ffmpeg.clone(),
            &config.jobs,
            config.playback.default_frame_rate,
        );
        let classifier = Classifier::new(config.formats.clone(), prober);
        Ok(Self {
            inner: Arc::new(PipelineInner {
                config,
                store,
                classifier,
                supervisor,
                orchestrator,
                extractor,
                inflight: Mutex::new(HashMap::new()),
                next_load: AtomicU64::new(1),
            }),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Cache store shared with the extractor.
    pub fn store(&self) -> &Arc<SequenceCacheStore> {
        &self.inner.store
    }

    /// Classify `path` synchronously without loading it.
    pub fn classify(&self, path: &Path) -> MediaResult<Classification> {
        self.inner.classifier.classify(path)
    }

    /// Start loading `path` for `target`, or attach to the load already running for it.
    pub fn request_load(&self, path: impl AsRef<Path>, target: LoadTarget) -> LoadTicket {
        let path = path.as_ref();
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let mut inflight = self.inner.inflight.lock();
        if let Some(shared) = inflight.get(&key).filter(|s| !s.is_terminal()) {
            tracing::debug!(source = %key.display(), surface = %target.surface, "attaching to in-flight load");
            return LoadTicket::new(Arc::clone(shared), target);
        }

        let shared = LoadShared::new(key.clone());
        inflight.insert(key.clone(), Arc::clone(&shared));
        let ticket = LoadTicket::new(Arc::clone(&shared), target);
        drop(inflight);

        let n = self.inner.next_load.fetch_add(1, Ordering::Relaxed);
        tracing::info!(load = n, source = %key.display(), surface = %ticket.target().surface, "load requested");
        let inner = Arc::clone(&self.inner);
        let worker_shared = Arc::clone(&shared);
        let spawned = std::thread::Builder::new()
            .name(format!("mediaprep-load-{n}"))
            .spawn(move || inner.run_load(&worker_shared));
        if let Err(e) = spawned {
            shared.finish(Err(LoadFailure::new(
                ErrorKind::SpawnFailed,
                format!("load worker: {e}"),
            )));
            self.inner.forget(&shared);
        }
        ticket
    }

    /// Cancel the in-flight load for `path`. Returns `false` when nothing was loading.
    ///
    /// The load fails with `ProcessCancelled` immediately; process cleanup continues in
    /// the background.
    pub fn cancel(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let shared = self.inner.inflight.lock().get(&key).cloned();
        match shared {
            Some(shared) => {
                let cancelled = shared.cancel();
                if cancelled {
                    tracing::info!(source = %key.display(), "load cancelled");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Cancel every load and job and wait for process cleanup.
    pub fn shutdown(&self) {
        let loads: Vec<Arc<LoadShared>> = self.inner.inflight.lock().values().cloned().collect();
        for shared in &loads {
            shared.cancel();
        }
        self.inner.supervisor.cancel_all();
        tracing::info!(cancelled = loads.len(), "pipeline shut down");
    }

    /// Player for an extracted sequence, sized by the configured frame cache capacity.
    pub fn open_player(&self, sequence: Arc<FrameSequence>, looping: bool) -> SequencePlayer {
        SequencePlayer::new(
            sequence,
            self.inner.config.playback.frame_cache_capacity,
            looping,
        )
    }
}

impl PipelineInner {
    fn run_load(&self, shared: &Arc<LoadShared>) {
        let outcome = self.drive(shared);
        match &outcome {
            Ok(asset) => tracing::info!(source = %shared.source().display(), ?asset, "load ready"),
            Err(failure) => {
                tracing::warn!(source = %shared.source().display(), %failure, "load failed")
            }
        }
        shared.finish(outcome);
        self.forget(shared);
    }

    fn forget(&self, shared: &Arc<LoadShared>) {
        let mut inflight = self.inflight.lock();
        if inflight
            .get(shared.source())
            .is_some_and(|s| Arc::ptr_eq(s, shared))
        {
            inflight.remove(shared.source());
        }
    }

    fn drive(&self, shared: &LoadShared) -> Result<Asset, LoadFailure> {
        shared.transition(LoadState::Classifying)?;
        let classification = self.classifier.classify(shared.source())?;

        match classification.kind {
            ClassificationKind::NativePlayable => {
                shared.transition(LoadState::DirectLoad)?;
                let path = classification.source.path().to_path_buf();
                if !path.is_file() {
                    return Err(MediaError::SourceNotFound(path).into());
                }
                Ok(Asset::DirectStream(path))
            }
            ClassificationKind::Unsupported => Err(MediaError::unsupported(format!(
                "'{}' (.{})",
                classification.source.path().display(),
                classification.source.extension()
            ))
            .into()),
            ClassificationKind::NeedsTranscode => {
                shared.transition(LoadState::Converting)?;
                self.convert(shared, &classification)
            }
            ClassificationKind::NeedsAlphaExtraction => {
                shared.transition(LoadState::Extracting)?;
                self.extract(shared, &classification)
            }
        }
    }

    fn convert(
        &self,
        shared: &LoadShared,
        classification: &Classification,
    ) -> Result<Asset, LoadFailure> {
        let source = &classification.source;
        let target = self
            .store
            .converted_path_for(source, &self.config.transcode.container_extension);
        if ConversionOrchestrator::reusable_output(source, &target) {
            tracing::info!(target = %target.display(), "reusing converted file");
            return Ok(Asset::DirectStream(target));
        }

        let job = self
            .orchestrator
            .start_with_duration(source, &target, classification.duration)?;
        self.follow(shared, &job)?;

        if !target.is_file() {
            return Err(LoadFailure {
                job_status: Some(JobStatus::Succeeded),
                ..LoadFailure::from(MediaError::OutputMissingAfterSuccess(target))
            });
        }
        Ok(Asset::DirectStream(target))
    }

    fn extract(
        &self,
        shared: &LoadShared,
        classification: &Classification,
    ) -> Result<Asset, LoadFailure> {
        let source = &classification.source;
        let dir = self.store.frame_dir_for(source);
        if self.store.is_valid(source, &dir) {
            let sequence = self.store.load_sequence(&dir)?;
            return Ok(Asset::FrameSequence(Arc::new(sequence)));
        }

        let job = self.extractor.extract(classification, &dir)?;
        self.follow(shared, &job)?;

        let sequence = self.store.load_sequence(&dir).map_err(|e| LoadFailure {
            job_status: Some(JobStatus::Succeeded),
            ..LoadFailure::from(e)
        })?;
        Ok(Asset::FrameSequence(Arc::new(sequence)))
    }

    /// Forward job progress until the job ends; `Ok` only for `Succeeded`.
    fn follow(&self, shared: &LoadShared, job: &JobHandle) -> Result<(), LoadFailure> {
        shared.attach_job(job)?;
        let poll = self.config.jobs.poll_interval();
        let snapshot = loop {
            if let Some(snapshot) = job.wait_timeout(poll) {
                break snapshot;
            }
            if shared.is_terminal() {
                job.cancel();
                break job.wait();
            }
            shared.report_progress(job.progress());
        };
        match snapshot.status {
            JobStatus::Succeeded => Ok(()),
            status => Err(LoadFailure::from_job(status, snapshot.failure)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/facade.rs"]
mod tests;
