use std::sync::Arc;
use std::time::Instant;

use crate::foundation::error::MediaResult;
use crate::playback::cursor::{CursorStep, PlaybackCursor, PlaybackState};
use crate::playback::frame_cache::{FrameCache, FrameImage, FrameLoader, ImageFileLoader};
use crate::playback::sequence::FrameSequence;

/// Outcome of one [`SequencePlayer::tick`].
#[derive(Clone, Debug)]
pub struct PlayerTick {
    /// Cursor movement this tick.
    pub step: CursorStep,
    /// Frame to display.
    pub index: usize,
    /// Decoded frame at `index`; `None` for an empty sequence.
    pub frame: Option<Arc<FrameImage>>,
    /// A non-looping run reached its last frame this tick.
    pub completed: bool,
}

/// Plays a [`FrameSequence`]: cursor plus decoded-frame cache.
#[derive(Debug)]
pub struct SequencePlayer<L = ImageFileLoader> {
    sequence: Arc<FrameSequence>,
    cache: FrameCache<L>,
    cursor: PlaybackCursor,
}

impl SequencePlayer<ImageFileLoader> {
    /// Player decoding frame files from disk.
    pub fn new(sequence: Arc<FrameSequence>, cache_capacity: usize, looping: bool) -> Self {
        Self::with_loader(sequence, cache_capacity, looping, ImageFileLoader)
    }
}

impl<L: FrameLoader> SequencePlayer<L> {
    /// Player with a custom frame loader.
    pub fn with_loader(
        sequence: Arc<FrameSequence>,
        cache_capacity: usize,
        looping: bool,
        loader: L,
    ) -> Self {
        let cursor = PlaybackCursor::new(sequence.frame_rate(), looping);
        Self {
            sequence,
            cache: FrameCache::with_loader(cache_capacity, loader),
            cursor,
        }
    }

    /// Sequence being played.
    pub fn sequence(&self) -> &Arc<FrameSequence> {
        &self.sequence
    }

    /// Playback cursor.
    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    /// Decoded-frame cache.
    pub fn cache(&self) -> &FrameCache<L> {
        &self.cache
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.cursor.state()
    }

    /// Current frame index.
    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    /// Enable or disable wrapping at the end.
    pub fn set_looping(&mut self, looping: bool) {
        self.cursor.set_looping(looping);
    }

    /// Start or resume playback.
    pub fn play(&mut self, now: Instant) {
        self.cursor.play(now);
    }

    /// Hold the current frame.
    pub fn pause(&mut self, now: Instant) {
        self.cursor.pause(now, self.sequence.frame_count());
    }

    /// Stop and rewind to frame 0.
    pub fn stop(&mut self) {
        self.cursor.stop();
    }

    /// Jump to `index`, clamped to the last frame.
    pub fn seek(&mut self, index: usize, now: Instant) {
        self.cursor.seek(index, self.sequence.frame_count(), now);
    }

    /// Advance to the frame due at `now` and return it decoded.
    pub fn tick(&mut self, now: Instant) -> MediaResult<PlayerTick> {
        let step = self.cursor.advance(now, self.sequence.frame_count());
        let index = self.cursor.index();
        let frame = self.frame_at(index)?;
        Ok(PlayerTick {
            step,
            index,
            frame,
            completed: matches!(step, CursorStep::Finished(_)),
        })
    }

    /// Decoded frame under the cursor; `None` for an empty sequence.
    pub fn current_frame(&mut self) -> MediaResult<Option<Arc<FrameImage>>> {
        self.frame_at(self.cursor.index())
    }

    /// Decode up to `ahead` frames after the cursor (bounded by cache capacity).
    /// Returns how many were newly loaded.
    pub fn prefetch(&mut self, ahead: usize) -> MediaResult<usize> {
        let count = self.sequence.frame_count();
        if count == 0 {
            return Ok(0);
        }
        let cursor = self.cursor.index();
        let ahead = ahead.min(self.cache.capacity().saturating_sub(1));
        let before = self.cache.load_count();
        for offset in 1..=ahead {
            let mut i = cursor + offset;
            if i >= count {
                if !self.cursor.is_looping() {
                    break;
                }
                i %= count;
            }
            self.cache.get_frame(&self.sequence, i, cursor)?;
        }
        Ok(self.cache.load_count() - before)
    }

    fn frame_at(&mut self, index: usize) -> MediaResult<Option<Arc<FrameImage>>> {
        if self.sequence.frame_count() == 0 {
            return Ok(None);
        }
        let cursor = self.cursor.index();
        self.cache
            .get_frame(&self.sequence, index, cursor)
            .map(Some)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/player.rs"]
mod tests;
