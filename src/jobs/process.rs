use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::jobs::progress::parse_progress_time;

const STDERR_TAIL_LINES: usize = 16;
/// How long an exited process's stderr drain may take to reach EOF.
const STDERR_SETTLE: Duration = Duration::from_millis(250);

/// A fully specified external command plus the path it is expected to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// File or pattern the command writes; used for diagnostics and by test launchers.
    pub output: PathBuf,
}

impl CommandSpec {
    /// Start a command for `program` producing `output`.
    pub fn new(program: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: output.into(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag`, if present (e.g. `-c:v`).
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).and_then(|v| v.to_str())
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut s = self.program.display().to_string();
        for a in &self.args {
            s.push(' ');
            s.push_str(&a.to_string_lossy());
        }
        s
    }
}

/// How a finished process exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit status reported success.
    pub success: bool,
    /// Exit code, when the platform reported one.
    pub code: Option<i32>,
}

/// A spawned external process as seen by the job supervisor.
pub trait RunningProcess: Send {
    /// OS process id.
    fn id(&self) -> u32;
    /// Non-blocking liveness check; `Some` once the process has exited.
    fn try_wait(&mut self) -> std::io::Result<Option<ExitOutcome>>;
    /// Kill the process and reap it. Killing an already exited process is not an error.
    fn kill(&mut self) -> std::io::Result<()>;
    /// Latest media timestamp parsed from the tool's status output.
    fn reported_time(&self) -> Option<Duration> {
        None
    }
    /// Last few lines of diagnostic output, for failure messages.
    fn stderr_tail(&self) -> String {
        String::new()
    }
}

/// Process spawning seam used by the job supervisor.
pub trait ProcessLauncher: Send + Sync {
    /// Return `true` when `program` can be run.
    fn is_available(&self, program: &Path) -> bool;
    /// Spawn `spec` without waiting for it.
    fn launch(&self, spec: &CommandSpec) -> std::io::Result<Box<dyn RunningProcess>>;
}

/// [`ProcessLauncher`] that runs real OS processes.
#[derive(Debug, Default)]
pub struct SystemLauncher {
    availability: Mutex<HashMap<PathBuf, bool>>,
}

impl SystemLauncher {
    /// Create a launcher with an empty availability cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessLauncher for SystemLauncher {
    fn is_available(&self, program: &Path) -> bool {
        if let Some(&known) = self.availability.lock().get(program) {
            return known;
        }
        let ok = Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        self.availability.lock().insert(program.to_path_buf(), ok);
        ok
    }

    fn launch(&self, spec: &CommandSpec) -> std::io::Result<Box<dyn RunningProcess>> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let status = Arc::new(Mutex::new(StderrStatus::default()));
        let mut drained = None;
        if let Some(stderr) = child.stderr.take() {
            let sink = Arc::clone(&status);
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
            // Detached: the drain ends at EOF once the child exits or is killed.
            let spawned = std::thread::Builder::new()
                .name(format!("stderr-{}", child.id()))
                .spawn(move || {
                    drain_stderr(stderr, &sink);
                    drop(done_tx);
                });
            match spawned {
                Ok(_) => drained = Some(done_rx),
                Err(e) => {
                    tracing::warn!(%e, "could not start stderr drain; progress will be time based")
                }
            }
        }

        Ok(Box::new(SystemProcess {
            child,
            status,
            drained,
        }))
    }
}

#[derive(Debug, Default)]
struct StderrStatus {
    last_time: Option<Duration>,
    tail: VecDeque<String>,
}

impl StderrStatus {
    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if let Some(t) = parse_progress_time(line) {
            self.last_time = Some(t);
        }
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_owned());
    }
}

// ffmpeg rewrites its status line with '\r', so both separators end a line.
fn drain_stderr(mut stderr: impl Read, status: &Mutex<StderrStatus>) {
    let mut buf = [0u8; 4096];
    let mut pending = Vec::<u8>::new();
    loop {
        let n = match stderr.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &b in &buf[..n] {
            if b == b'\n' || b == b'\r' {
                if !pending.is_empty() {
                    status.lock().push_line(&String::from_utf8_lossy(&pending));
                    pending.clear();
                }
            } else {
                pending.push(b);
            }
        }
    }
    if !pending.is_empty() {
        status.lock().push_line(&String::from_utf8_lossy(&pending));
    }
}

struct SystemProcess {
    child: Child,
    status: Arc<Mutex<StderrStatus>>,
    drained: Option<Receiver<()>>,
}

impl SystemProcess {
    /// Give the drain a moment to read the last lines, so failure messages carry them.
    fn settle_stderr(&mut self) {
        if let Some(rx) = self.drained.take() {
            let _ = rx.recv_timeout(STDERR_SETTLE);
        }
    }
}

impl RunningProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitOutcome>> {
        let Some(status) = self.child.try_wait()? else {
            return Ok(None);
        };
        self.settle_stderr();
        Ok(Some(ExitOutcome {
            success: status.success(),
            code: status.code(),
        }))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        match self.child.kill() {
            Ok(()) => {}
            // Already exited.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }
        self.child.wait().map(|_| ())
    }

    fn reported_time(&self) -> Option<Duration> {
        self.status.lock().last_time
    }

    fn stderr_tail(&self) -> String {
        let status = self.status.lock();
        status.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/process.rs"]
mod tests;
