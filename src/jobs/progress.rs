use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("time= pattern is valid")
});

/// Extract the media timestamp from an ffmpeg status line (`... time=00:01:02.50 ...`).
///
/// Returns the last match on the line; `time=N/A` and malformed values yield `None`.
pub fn parse_progress_time(line: &str) -> Option<Duration> {
    let caps = TIME_RE.captures_iter(line).last()?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

/// Best-effort percent estimate for a running job.
///
/// The estimate never decreases and stays below 100; the supervisor reports 100 on success.
#[derive(Clone, Debug)]
pub struct ProgressEstimator {
    expected: Duration,
    last: u8,
}

impl ProgressEstimator {
    /// Estimate against an expected total duration (zero is treated as one second).
    pub fn new(expected: Duration) -> Self {
        Self {
            expected: expected.max(Duration::from_secs(1)),
            last: 0,
        }
    }

    /// Fold in a new observation. `reported` (parsed tool output) wins over wall time.
    pub fn update(&mut self, elapsed: Duration, reported: Option<Duration>) -> u8 {
        let done = reported.unwrap_or(elapsed);
        let ratio = done.as_secs_f64() / self.expected.as_secs_f64();
        let pct = (ratio * 100.0).floor().clamp(0.0, 99.0) as u8;
        self.last = self.last.max(pct);
        self.last
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/progress.rs"]
mod tests;
