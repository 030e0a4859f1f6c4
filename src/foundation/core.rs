use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::foundation::error::{MediaError, MediaResult};

/// Fallback frame rate used when the source rate cannot be detected.
pub const DEFAULT_FPS: Fps = Fps { num: 30, den: 1 };

/// Frames-per-second represented as a rational `num/den`.
///
/// Deserialization goes through [`Fps::new`], so a zero numerator or denominator read from
/// disk is an error rather than a value that divides by zero later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawFps")]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MediaResult<Self> {
        if den == 0 {
            return Err(MediaError::config("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MediaError::config("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse a probe-style rate such as `30/1`, `30000/1001` or `25`.
    ///
    /// Returns `None` for `0/0`, `N/A` and anything else that is not a positive rate.
    pub fn parse(rate: &str) -> Option<Self> {
        let rate = rate.trim();
        let (num, den) = match rate.split_once('/') {
            Some((n, d)) => (n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?),
            None => (rate.parse::<u32>().ok()?, 1),
        };
        Self::new(num, den).ok()
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame.
    pub fn frame_duration(self) -> Duration {
        Duration::from_secs_f64(f64::from(self.den) / f64::from(self.num))
    }

    /// Number of whole frames elapsed in `elapsed` (floor semantics).
    pub fn frames_in(self, elapsed: Duration) -> u64 {
        let nanos = elapsed.as_nanos();
        let frames = nanos * u128::from(self.num) / (u128::from(self.den) * 1_000_000_000);
        u64::try_from(frames).unwrap_or(u64::MAX)
    }

    /// Render as an ffmpeg filter value (`30` or `30000/1001`).
    pub fn to_filter_value(self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

#[derive(serde::Deserialize)]
struct RawFps {
    num: u32,
    den: u32,
}

impl TryFrom<RawFps> for Fps {
    type Error = MediaError;

    fn try_from(raw: RawFps) -> MediaResult<Self> {
        Self::new(raw.num, raw.den)
    }
}

impl Default for Fps {
    fn default() -> Self {
        DEFAULT_FPS
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{:.3}", self.as_f64())
        }
    }
}

/// Convert a filesystem timestamp to integer nanoseconds since the Unix epoch.
///
/// Timestamps before the epoch map to 0.
pub fn unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Current wall-clock time as integer nanoseconds since the Unix epoch.
pub fn now_unix_nanos() -> u64 {
    unix_nanos(SystemTime::now())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
