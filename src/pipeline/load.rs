use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::foundation::error::{ErrorKind, FailureReason, MediaError};
use crate::jobs::supervisor::{JobHandle, JobStatus};
use crate::playback::sequence::FrameSequence;

/// A loaded, playable asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Asset {
    /// A file the playback layer opens directly (native source or converted output).
    DirectStream(PathBuf),
    /// An extracted RGBA frame sequence.
    FrameSequence(Arc<FrameSequence>),
}

/// Progress of one load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Accepted, not started.
    Idle,
    /// Running the format classifier.
    Classifying,
    /// Source is natively playable.
    DirectLoad,
    /// Waiting on a standard transcode.
    Converting,
    /// Waiting on an alpha frame extraction (or validating a cached one).
    Extracting,
    /// Asset available.
    Ready,
    /// Load failed or was cancelled.
    Failed,
}

impl LoadState {
    /// Return `true` for `Ready` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Return `true` when moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;
        match (self, next) {
            (Ready | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Classifying) => true,
            (Classifying, DirectLoad | Converting | Extracting) => true,
            (DirectLoad | Converting | Extracting, Ready) => true,
            _ => false,
        }
    }
}

/// Why a load failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadFailure {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Terminal status of the conversion job, when a job was involved.
    pub job_status: Option<JobStatus>,
}

impl LoadFailure {
    /// Failure without an associated job.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            job_status: None,
        }
    }

    /// Failure reported by a terminal job.
    pub fn from_job(status: JobStatus, reason: Option<FailureReason>) -> Self {
        let reason = reason.unwrap_or_else(|| {
            FailureReason::new(ErrorKind::ProcessFailed, format!("job ended {status:?}"))
        });
        Self {
            kind: reason.kind,
            message: reason.message,
            job_status: Some(status),
        }
    }

    pub(crate) fn cancelled(source: &Path) -> Self {
        Self::new(
            ErrorKind::ProcessCancelled,
            format!("load of '{}' cancelled", source.display()),
        )
    }
}

impl From<MediaError> for LoadFailure {
    fn from(err: MediaError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(status) = self.job_status {
            write!(f, " (job {status:?})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadFailure {}

/// Event stream delivered to every subscriber of a load.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    /// Best-effort percent while a job runs.
    Progress(u8),
    /// Terminal: the asset is ready.
    Ready(Asset),
    /// Terminal: the load failed.
    Failed(LoadFailure),
}

/// Describes the playback surface a load is for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadTarget {
    /// Caller-chosen surface name, used in logs.
    pub surface: String,
    /// Whether a frame sequence should loop when played on this surface.
    pub looping: bool,
}

impl LoadTarget {
    /// Target named `surface`, looping.
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            looping: true,
        }
    }
}

pub(crate) type LoadOutcome = Result<Asset, LoadFailure>;

#[derive(Debug)]
struct LoadInner {
    state: LoadState,
    progress: u8,
    outcome: Option<LoadOutcome>,
    subscribers: Vec<Sender<LoadEvent>>,
    job: Option<JobHandle>,
}

/// State shared by the load worker and every ticket for one source.
#[derive(Debug)]
pub(crate) struct LoadShared {
    source: PathBuf,
    inner: Mutex<LoadInner>,
    changed: Condvar,
}

impl LoadShared {
    pub(crate) fn new(source: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            source,
            inner: Mutex::new(LoadInner {
                state: LoadState::Idle,
                progress: 0,
                outcome: None,
                subscribers: Vec::new(),
                job: None,
            }),
            changed: Condvar::new(),
        })
    }

    pub(crate) fn source(&self) -> &Path {
        &self.source
    }

    pub(crate) fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.inner.lock().state.is_terminal()
    }

    /// New event receiver. Late subscribers get the terminal event right away.
    pub(crate) fn subscribe(&self) -> Receiver<LoadEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut inner = self.inner.lock();
        match &inner.outcome {
            Some(outcome) => {
                let _ = tx.send(terminal_event(outcome));
            }
            None => {
                if inner.progress > 0 {
                    let _ = tx.send(LoadEvent::Progress(inner.progress));
                }
                inner.subscribers.push(tx);
            }
        }
        rx
    }

    /// Move to `next`. Fails with a cancellation when the load already ended.
    pub(crate) fn transition(&self, next: LoadState) -> Result<(), LoadFailure> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return Err(LoadFailure::cancelled(&self.source));
        }
        if !inner.state.can_transition_to(next) {
            tracing::error!(from = ?inner.state, to = ?next, "illegal load transition");
            return Err(LoadFailure::new(
                ErrorKind::Other,
                format!("illegal load transition {:?} -> {next:?}", inner.state),
            ));
        }
        tracing::debug!(source = %self.source.display(), from = ?inner.state, to = ?next, "load state");
        inner.state = next;
        drop(inner);
        self.changed.notify_all();
        Ok(())
    }

    /// Record the running job so a cancel can reach it.
    pub(crate) fn attach_job(&self, job: &JobHandle) -> Result<(), LoadFailure> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            drop(inner);
            job.cancel();
            return Err(LoadFailure::cancelled(&self.source));
        }
        inner.job = Some(job.clone());
        Ok(())
    }

    pub(crate) fn report_progress(&self, pct: u8) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() || pct <= inner.progress {
            return;
        }
        inner.progress = pct;
        inner
            .subscribers
            .retain(|tx| tx.send(LoadEvent::Progress(pct)).is_ok());
    }

    /// Publish the terminal outcome. Returns `false` when one was already published.
    pub(crate) fn finish(&self, outcome: LoadOutcome) -> bool {
        let mut inner = self.inner.lock();
        let published = Self::publish(&mut inner, outcome);
        drop(inner);
        if published {
            self.changed.notify_all();
        }
        published
    }

    /// Fail the load immediately and cancel its job, if any.
    ///
    /// The terminal state and the job are settled under one lock, so a job attached
    /// concurrently is either taken here or refused by [`LoadShared::attach_job`].
    pub(crate) fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return false;
        }
        let job = inner.job.take();
        let failure = LoadFailure {
            job_status: job.as_ref().map(|_| JobStatus::Cancelled),
            ..LoadFailure::cancelled(&self.source)
        };
        Self::publish(&mut inner, Err(failure));
        drop(inner);
        self.changed.notify_all();
        if let Some(job) = job {
            job.cancel();
        }
        true
    }

    fn publish(inner: &mut LoadInner, outcome: LoadOutcome) -> bool {
        if inner.state.is_terminal() {
            return false;
        }
        let next = if outcome.is_ok() {
            LoadState::Ready
        } else {
            LoadState::Failed
        };
        if !inner.state.can_transition_to(next) {
            tracing::error!(from = ?inner.state, to = ?next, "illegal load transition");
        }
        inner.state = next;
        if outcome.is_ok() {
            inner.progress = 100;
        }
        let event = terminal_event(&outcome);
        for tx in inner.subscribers.drain(..) {
            let _ = tx.send(event.clone());
        }
        inner.outcome = Some(outcome);
        inner.job = None;
        true
    }

    fn progress(&self) -> u8 {
        self.inner.lock().progress
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Option<LoadOutcome> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = &inner.outcome {
                return Some(outcome.clone());
            }
            match deadline {
                Some(d) => {
                    if self.changed.wait_until(&mut inner, d).timed_out() {
                        return inner.outcome.clone();
                    }
                }
                None => self.changed.wait(&mut inner),
            }
        }
    }
}

fn terminal_event(outcome: &LoadOutcome) -> LoadEvent {
    match outcome {
        Ok(asset) => LoadEvent::Ready(asset.clone()),
        Err(failure) => LoadEvent::Failed(failure.clone()),
    }
}

/// Caller-side view of a load request.
///
/// Every ticket for the same source observes the same load and the same terminal event.
#[derive(Debug)]
pub struct LoadTicket {
    shared: Arc<LoadShared>,
    events: Receiver<LoadEvent>,
    target: LoadTarget,
}

impl LoadTicket {
    pub(crate) fn new(shared: Arc<LoadShared>, target: LoadTarget) -> Self {
        let events = shared.subscribe();
        Self {
            shared,
            events,
            target,
        }
    }

    /// Progress and terminal events for this subscriber.
    pub fn events(&self) -> &Receiver<LoadEvent> {
        &self.events
    }

    /// Absolute source path.
    pub fn source(&self) -> &Path {
        self.shared.source()
    }

    /// Target this ticket was requested for.
    pub fn target(&self) -> &LoadTarget {
        &self.target
    }

    /// Current state.
    pub fn state(&self) -> LoadState {
        self.shared.state()
    }

    /// Last reported progress percent.
    pub fn progress(&self) -> u8 {
        self.shared.progress()
    }

    /// Return `true` when this ticket shares its load with `other`.
    pub fn same_load(&self, other: &LoadTicket) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Block until the load is `Ready` or `Failed`.
    pub fn wait(&self) -> Result<Asset, LoadFailure> {
        self.shared
            .wait_until(None)
            .unwrap_or_else(|| Err(LoadFailure::cancelled(self.source())))
    }

    /// Like [`LoadTicket::wait`], returning `None` if still running after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Asset, LoadFailure>> {
        self.shared.wait_until(Some(Instant::now() + timeout))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/load.rs"]
mod tests;
