use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::foundation::error::{ErrorKind, FailureReason, MediaError, MediaResult};
use crate::jobs::process::{CommandSpec, ExitOutcome, ProcessLauncher, RunningProcess};
use crate::jobs::progress::ProgressEstimator;

/// What a job produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Single converted file in a native container.
    StandardTranscode,
    /// Directory of RGBA frames plus a cache sidecar.
    AlphaExtraction,
}

/// Lifecycle of a conversion job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Created, process not yet started.
    Pending,
    /// Process running.
    Running,
    /// Process exited successfully and the output was published.
    Succeeded,
    /// Process failed, or exited successfully without usable output.
    Failed,
    /// Process exceeded its maximum wait and was killed.
    TimedOut,
    /// Cancelled by the caller.
    Cancelled,
}

impl JobStatus {
    /// Return `true` for states a job never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

/// Single-flight key: at most one non-terminal job exists per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Absolute source path.
    pub source: PathBuf,
    /// Output kind.
    pub kind: TargetKind,
}

impl JobKey {
    /// Key for `source` producing `kind`.
    pub fn new(source: impl Into<PathBuf>, kind: TargetKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }
}

/// Process-unique job identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Point-in-time view of a job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSnapshot {
    /// Job id.
    pub id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Best-effort percent, 0..=100; 100 only once succeeded.
    pub progress: u8,
    /// Wall time since launch, frozen once terminal.
    pub elapsed: Duration,
    /// Set for `Failed`, `TimedOut` and `Cancelled`.
    pub failure: Option<FailureReason>,
}

/// Output lifecycle hooks driven by the supervisor.
///
/// `prepare` runs before launch, then exactly one of `finalize` (after a
/// successful exit with `verify() == true`) or `discard` runs.
pub trait JobOutput: Send {
    /// Create directories and clear stale partial output.
    fn prepare(&mut self) -> MediaResult<()>;
    /// Return `true` when the process left usable output behind.
    fn verify(&self) -> bool;
    /// Publish the output (rename into place, write metadata).
    fn finalize(&mut self) -> MediaResult<()>;
    /// Remove everything the job wrote. Must tolerate missing files.
    fn discard(&mut self);
}

/// Everything needed to run one supervised job.
pub struct JobRequest {
    /// Single-flight key.
    pub key: JobKey,
    /// Final output path (file or directory), reported on the handle.
    pub target: PathBuf,
    /// Process to run.
    pub command: CommandSpec,
    /// Maximum wait before the process is killed.
    pub timeout: Duration,
    /// Expected media duration, for progress estimates.
    pub expected_duration: Duration,
    /// Output hooks.
    pub output: Box<dyn JobOutput>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    progress: u8,
    started: Instant,
    finished: Option<Duration>,
    failure: Option<FailureReason>,
    cleaned: bool,
}

impl JobState {
    fn finish(&mut self, status: JobStatus, failure: Option<FailureReason>) {
        self.status = status;
        self.failure = failure;
        self.finished = Some(self.started.elapsed());
        if status == JobStatus::Succeeded {
            self.progress = 100;
        }
    }
}

#[derive(Debug)]
struct JobInner {
    id: JobId,
    key: JobKey,
    target: PathBuf,
    state: Mutex<JobState>,
    changed: Condvar,
    cancel_tx: Sender<()>,
}

/// Shared handle to a supervised job. Cloning is cheap; all clones observe the same job.
#[derive(Clone, Debug)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl JobHandle {
    fn new(id: JobId, key: JobKey, target: PathBuf, cancel_tx: Sender<()>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id,
                key,
                target,
                state: Mutex::new(JobState {
                    status: JobStatus::Pending,
                    progress: 0,
                    started: Instant::now(),
                    finished: None,
                    failure: None,
                    cleaned: false,
                }),
                changed: Condvar::new(),
                cancel_tx,
            }),
        }
    }

    /// Job id.
    pub fn id(&self) -> JobId {
        self.inner.id
    }

    /// Single-flight key.
    pub fn key(&self) -> &JobKey {
        &self.inner.key
    }

    /// Final output path.
    pub fn target(&self) -> &Path {
        &self.inner.target
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.inner.state.lock().status
    }

    /// Current progress percent.
    pub fn progress(&self) -> u8 {
        self.inner.state.lock().progress
    }

    /// Wall time since launch, frozen once terminal.
    pub fn elapsed(&self) -> Duration {
        let st = self.inner.state.lock();
        st.finished.unwrap_or_else(|| st.started.elapsed())
    }

    /// Consistent view of status, progress, elapsed time and failure.
    pub fn snapshot(&self) -> JobSnapshot {
        let st = self.inner.state.lock();
        Self::snapshot_of(self.inner.id, &st)
    }

    fn snapshot_of(id: JobId, st: &JobState) -> JobSnapshot {
        JobSnapshot {
            id,
            status: st.status,
            progress: st.progress,
            elapsed: st.finished.unwrap_or_else(|| st.started.elapsed()),
            failure: st.failure.clone(),
        }
    }

    /// Block until the job is terminal and its process and partial outputs are cleaned up.
    pub fn wait(&self) -> JobSnapshot {
        let mut st = self.inner.state.lock();
        while !st.cleaned {
            self.inner.changed.wait(&mut st);
        }
        Self::snapshot_of(self.inner.id, &st)
    }

    /// Like [`JobHandle::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut st = self.inner.state.lock();
        while !st.cleaned {
            if self
                .inner
                .changed
                .wait_until(&mut st, deadline)
                .timed_out()
            {
                return st
                    .cleaned
                    .then(|| Self::snapshot_of(self.inner.id, &st));
            }
        }
        Some(Self::snapshot_of(self.inner.id, &st))
    }

    /// Request cancellation. Returns `false` when the job was already terminal.
    ///
    /// The status flips to `Cancelled` immediately; the supervisor then kills the
    /// process and discards partial output.
    pub fn cancel(&self) -> bool {
        {
            let mut st = self.inner.state.lock();
            if st.status.is_terminal() {
                return false;
            }
            st.finish(
                JobStatus::Cancelled,
                Some(FailureReason::from(&MediaError::ProcessCancelled(
                    self.inner.id.to_string(),
                ))),
            );
        }
        self.inner.changed.notify_all();
        // Capacity 1; a pending signal is enough.
        let _ = self.inner.cancel_tx.try_send(());
        true
    }

    fn set_running(&self) {
        let mut st = self.inner.state.lock();
        if st.status == JobStatus::Pending {
            st.status = JobStatus::Running;
            st.started = Instant::now();
        }
    }

    fn set_progress(&self, pct: u8) {
        let mut st = self.inner.state.lock();
        if st.status == JobStatus::Running && pct > st.progress {
            st.progress = pct;
        }
    }

    fn mark_cleaned(&self) {
        self.inner.state.lock().cleaned = true;
        self.inner.changed.notify_all();
    }
}

enum Stop {
    Exited(ExitOutcome),
    TimedOut,
    Cancelled,
    WaitFailed(std::io::Error),
}

type Registry = Arc<Mutex<HashMap<JobKey, JobHandle>>>;

/// Launches external processes as jobs and supervises them to a terminal state.
///
/// Submitting a key that already has a running job attaches to that job
/// instead of spawning another process.
pub struct JobSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    poll_interval: Duration,
    registry: Registry,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JobSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSupervisor")
            .field("poll_interval", &self.poll_interval)
            .field("active", &self.registry.lock().len())
            .finish_non_exhaustive()
    }
}

impl JobSupervisor {
    /// Create a supervisor that spawns through `launcher` and polls liveness every `poll_interval`.
    pub fn new(launcher: Arc<dyn ProcessLauncher>, poll_interval: Duration) -> Self {
        Self {
            launcher,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Return `true` when `program` can be launched.
    pub fn tool_available(&self, program: &Path) -> bool {
        self.launcher.is_available(program)
    }

    /// Launch `req`, or attach to the running job with the same key.
    pub fn submit(&self, req: JobRequest) -> MediaResult<JobHandle> {
        let JobRequest {
            key,
            target,
            command,
            timeout,
            expected_duration,
            mut output,
        } = req;

        if !self.launcher.is_available(&command.program) {
            return Err(MediaError::tool_unavailable(format!(
                "'{}' is not runnable",
                command.program.display()
            )));
        }

        loop {
            let mut registry = self.registry.lock();
            if let Some(existing) = registry.get(&key).cloned() {
                if !existing.status().is_terminal() {
                    tracing::debug!(id = %existing.id(), source = %key.source.display(), "attaching to running job");
                    return Ok(existing);
                }
                // Terminal but still cleaning up; its discard must not race our prepare.
                drop(registry);
                existing.wait();
                continue;
            }

            let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(1);
            let handle = JobHandle::new(id, key.clone(), target.clone(), cancel_tx);

            output.prepare()?;
            let process = match self.launcher.launch(&command) {
                Ok(p) => p,
                Err(e) => {
                    output.discard();
                    return Err(if e.kind() == std::io::ErrorKind::NotFound {
                        MediaError::tool_unavailable(format!(
                            "'{}': {e}",
                            command.program.display()
                        ))
                    } else {
                        MediaError::spawn_failed(format!("{}: {e}", command.display()))
                    });
                }
            };
            handle.set_running();
            tracing::info!(%id, pid = process.id(), kind = ?key.kind, source = %key.source.display(), "job started");
            tracing::debug!(%id, command = %command.display());

            registry.insert(key.clone(), handle.clone());
            drop(registry);

            let ctx = SuperviseCtx {
                handle: handle.clone(),
                timeout,
                expected: expected_duration,
                poll: self.poll_interval,
                cancel_rx,
                registry: Arc::clone(&self.registry),
            };
            let spawned = std::thread::Builder::new()
                .name(format!("mediaprep-{id}"))
                .spawn(move || ctx.run(process, output));
            if let Err(e) = spawned {
                // The closure (and with it the process) was dropped; nothing supervises this job.
                self.registry.lock().remove(&key);
                handle.inner.state.lock().finish(
                    JobStatus::Failed,
                    Some(FailureReason::new(ErrorKind::SpawnFailed, e.to_string())),
                );
                handle.mark_cleaned();
                return Err(MediaError::spawn_failed(format!(
                    "supervisor thread for {id}: {e}"
                )));
            }
            return Ok(handle);
        }
    }

    /// Non-terminal job currently registered for `key`.
    pub fn active(&self, key: &JobKey) -> Option<JobHandle> {
        self.registry
            .lock()
            .get(key)
            .filter(|h| !h.status().is_terminal())
            .cloned()
    }

    /// Number of registered jobs, including ones still cleaning up.
    pub fn active_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Cancel every job and wait for each to clean up.
    pub fn cancel_all(&self) {
        let handles: Vec<JobHandle> = self.registry.lock().values().cloned().collect();
        for h in &handles {
            h.cancel();
        }
        for h in &handles {
            h.wait();
        }
    }
}

struct SuperviseCtx {
    handle: JobHandle,
    timeout: Duration,
    expected: Duration,
    poll: Duration,
    cancel_rx: Receiver<()>,
    registry: Registry,
}

impl SuperviseCtx {
    fn run(self, mut process: Box<dyn RunningProcess>, mut output: Box<dyn JobOutput>) {
        let id = self.handle.id();
        let stop = self.watch(process.as_mut());

        match stop {
            Stop::Exited(exit) => self.on_exit(exit, process.as_ref(), output.as_mut()),
            Stop::TimedOut => {
                kill(id, process.as_mut());
                output.discard();
                let reason = FailureReason::from(&MediaError::ProcessTimedOut(format!(
                    "{id} exceeded {:?}",
                    self.timeout
                )));
                tracing::warn!(%id, timeout = ?self.timeout, "job timed out");
                self.finish_unless_terminal(JobStatus::TimedOut, reason);
            }
            Stop::Cancelled => {
                kill(id, process.as_mut());
                output.discard();
                tracing::info!(%id, "job cancelled");
            }
            Stop::WaitFailed(e) => {
                kill(id, process.as_mut());
                output.discard();
                tracing::warn!(%id, %e, "lost track of job process");
                self.finish_unless_terminal(
                    JobStatus::Failed,
                    FailureReason::new(ErrorKind::Other, format!("wait on {id}: {e}")),
                );
            }
        }

        {
            let mut registry = self.registry.lock();
            if registry
                .get(self.handle.key())
                .is_some_and(|h| h.id() == id)
            {
                registry.remove(self.handle.key());
            }
        }
        self.handle.mark_cleaned();
    }

    fn watch(&self, process: &mut dyn RunningProcess) -> Stop {
        let mut estimator = ProgressEstimator::new(self.expected);
        let started = Instant::now();
        loop {
            match process.try_wait() {
                Ok(Some(exit)) => return Stop::Exited(exit),
                Ok(None) => {}
                Err(e) => return Stop::WaitFailed(e),
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Stop::TimedOut;
            }
            self.handle
                .set_progress(estimator.update(elapsed, process.reported_time()));

            let wait = self.poll.min(self.timeout - elapsed);
            match self.cancel_rx.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return Stop::Cancelled,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    fn on_exit(&self, exit: ExitOutcome, process: &dyn RunningProcess, output: &mut dyn JobOutput) {
        let id = self.handle.id();
        // Held across finalize so a concurrent cancel sees either Running or Succeeded.
        let mut st = self.handle.inner.state.lock();
        if st.status == JobStatus::Cancelled {
            drop(st);
            output.discard();
            return;
        }

        let failure = if !exit.success {
            let tail = process.stderr_tail();
            Some(FailureReason::from(&MediaError::process_failed(
                match exit.code {
                    Some(code) => format!("{id} exited with code {code}: {tail}"),
                    None => format!("{id} terminated by signal: {tail}"),
                },
            )))
        } else if !output.verify() {
            Some(FailureReason::from(&MediaError::OutputMissingAfterSuccess(
                self.handle.target().to_path_buf(),
            )))
        } else {
            output.finalize().err().map(|e| FailureReason::from(&e))
        };

        match failure {
            None => {
                st.finish(JobStatus::Succeeded, None);
                tracing::info!(%id, elapsed = ?st.finished, "job succeeded");
            }
            Some(reason) => {
                output.discard();
                tracing::warn!(%id, kind = ?reason.kind, message = %reason.message, "job failed");
                st.finish(JobStatus::Failed, Some(reason));
            }
        }
        drop(st);
        self.handle.inner.changed.notify_all();
    }

    fn finish_unless_terminal(&self, status: JobStatus, reason: FailureReason) {
        let mut st = self.handle.inner.state.lock();
        if !st.status.is_terminal() {
            st.finish(status, Some(reason));
        }
        drop(st);
        self.handle.inner.changed.notify_all();
    }
}

fn kill(id: JobId, process: &mut dyn RunningProcess) {
    if let Err(e) = process.kill() {
        tracing::warn!(%id, pid = process.id(), %e, "failed to kill job process");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/supervisor.rs"]
mod tests;
