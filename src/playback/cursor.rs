use std::time::Instant;

use crate::foundation::core::Fps;

/// Playback state of a frame sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// At frame 0 (or holding the last frame after a non-looping run), not advancing.
    Stopped,
    /// Advancing with wall-clock time.
    Playing,
    /// Holding the current frame.
    Paused,
}

/// Result of [`PlaybackCursor::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorStep {
    /// Not playing, or the sequence is empty.
    Idle,
    /// Still on the same frame.
    Held(usize),
    /// Moved forward to a new frame.
    Moved(usize),
    /// Ran past the last frame and wrapped to this one.
    Wrapped(usize),
    /// Ran past the last frame without looping; holding the last frame, now stopped.
    Finished(usize),
}

impl CursorStep {
    /// Frame index after the step, if playing.
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Idle => None,
            Self::Held(i) | Self::Moved(i) | Self::Wrapped(i) | Self::Finished(i) => Some(i),
        }
    }
}

/// Wall-clock driven frame cursor.
///
/// The due frame is always computed from the anchor (`Instant` and frame at the last
/// play/seek), so missed ticks skip frames instead of slowing playback down.
#[derive(Clone, Debug)]
pub struct PlaybackCursor {
    index: usize,
    state: PlaybackState,
    looping: bool,
    fps: Fps,
    anchor: Option<(Instant, usize)>,
    lap: u64,
    finished: bool,
}

impl PlaybackCursor {
    /// Stopped cursor at frame 0.
    pub fn new(fps: Fps, looping: bool) -> Self {
        Self {
            index: 0,
            state: PlaybackState::Stopped,
            looping,
            fps,
            anchor: None,
            lap: 0,
            finished: false,
        }
    }

    /// Current frame index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Playback rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Whether playback wraps at the end.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// `true` after a non-looping run reached the last frame.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Start or resume. A finished cursor restarts from frame 0.
    pub fn play(&mut self, now: Instant) {
        if self.finished {
            self.index = 0;
            self.finished = false;
        }
        self.state = PlaybackState::Playing;
        self.reanchor(now);
    }

    /// Bring the index up to date, then hold it.
    pub fn pause(&mut self, now: Instant, frame_count: usize) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.advance(now, frame_count);
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.anchor = None;
        }
    }

    /// Stop and rewind to frame 0.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.index = 0;
        self.anchor = None;
        self.lap = 0;
        self.finished = false;
    }

    /// Jump to `index` (clamped to the last frame) and re-anchor.
    pub fn seek(&mut self, index: usize, frame_count: usize, now: Instant) {
        self.index = index.min(frame_count.saturating_sub(1));
        self.finished = false;
        if self.state == PlaybackState::Playing {
            self.reanchor(now);
        }
    }

    /// Enable or disable wrapping.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Move to the frame due at `now`.
    pub fn advance(&mut self, now: Instant, frame_count: usize) -> CursorStep {
        if self.state != PlaybackState::Playing || frame_count == 0 {
            return CursorStep::Idle;
        }
        let Some((t0, f0)) = self.anchor else {
            return CursorStep::Idle;
        };
        let count = frame_count as u64;
        let total = f0 as u64 + self.fps.frames_in(now.saturating_duration_since(t0));
        let prev = self.index;

        if total >= count {
            if !self.looping {
                self.index = frame_count - 1;
                self.state = PlaybackState::Stopped;
                self.anchor = None;
                self.finished = true;
                return CursorStep::Finished(self.index);
            }
            let lap = total / count;
            self.index = (total % count) as usize;
            if lap > self.lap {
                self.lap = lap;
                return CursorStep::Wrapped(self.index);
            }
        } else {
            self.index = total as usize;
        }

        if self.index == prev {
            CursorStep::Held(self.index)
        } else {
            CursorStep::Moved(self.index)
        }
    }

    fn reanchor(&mut self, now: Instant) {
        self.anchor = Some((now, self.index));
        self.lap = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/cursor.rs"]
mod tests;
