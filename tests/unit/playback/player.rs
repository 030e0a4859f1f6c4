use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::core::Fps;
use crate::foundation::error::MediaResult;

use super::*;

struct IndexLoader;

impl FrameLoader for IndexLoader {
    fn load(&self, path: &Path) -> MediaResult<FrameImage> {
        let stem = path.file_stem().unwrap().to_str().unwrap();
        let n: u8 = stem.trim_start_matches("frame_").parse().unwrap();
        Ok(FrameImage {
            width: 1,
            height: 1,
            rgba8: Arc::new(vec![n, 0, 0, 0]),
        })
    }
}

fn player(frames: usize, capacity: usize, looping: bool) -> SequencePlayer<IndexLoader> {
    let paths = (1..=frames)
        .map(|i| PathBuf::from(format!("/seq/frame_{i:04}.png")))
        .collect();
    let seq = Arc::new(FrameSequence::new("/seq", Fps { num: 10, den: 1 }, paths));
    SequencePlayer::with_loader(seq, capacity, looping, IndexLoader)
}

#[test]
fn tick_returns_the_due_frame() {
    let t0 = Instant::now();
    let mut p = player(10, 4, false);
    p.play(t0);

    let tick = p.tick(t0 + Duration::from_millis(350)).unwrap();
    assert_eq!(tick.step, CursorStep::Moved(3));
    assert_eq!(tick.index, 3);
    assert_eq!(tick.frame.unwrap().rgba8[0], 4);
    assert!(!tick.completed);

    let tick = p.tick(t0 + Duration::from_secs(5)).unwrap();
    assert!(tick.completed);
    assert_eq!(tick.index, 9);
    assert_eq!(p.state(), PlaybackState::Stopped);
}

#[test]
fn stopped_player_still_shows_current_frame() {
    let mut p = player(3, 4, false);
    let frame = p.current_frame().unwrap().unwrap();
    assert_eq!(frame.rgba8[0], 1);
    assert_eq!(p.tick(Instant::now()).unwrap().step, CursorStep::Idle);
}

#[test]
fn prefetch_is_bounded_by_capacity_and_end() {
    let mut p = player(10, 4, false);
    assert_eq!(p.prefetch(8).unwrap(), 3);
    assert_eq!(p.cache().indices(), vec![1, 2, 3]);
    assert_eq!(p.prefetch(8).unwrap(), 0);

    p.seek(8, Instant::now());
    assert_eq!(p.prefetch(3).unwrap(), 1);
    assert!(p.cache().contains(9));
}

#[test]
fn looping_prefetch_wraps_to_the_start() {
    let mut p = player(5, 4, true);
    p.seek(4, Instant::now());
    assert_eq!(p.prefetch(2).unwrap(), 2);
    assert!(p.cache().contains(0));
    assert!(p.cache().contains(1));
}

#[test]
fn empty_sequence_has_no_frames() {
    let mut p = player(0, 4, true);
    p.play(Instant::now());
    assert!(p.current_frame().unwrap().is_none());
    let tick = p.tick(Instant::now()).unwrap();
    assert!(tick.frame.is_none());
    assert_eq!(p.prefetch(3).unwrap(), 0);
}
