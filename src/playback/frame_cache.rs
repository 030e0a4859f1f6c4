use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::error::{MediaError, MediaResult};
use crate::playback::sequence::FrameSequence;

/// Decoded frame, straight (non-premultiplied) RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub rgba8: Arc<Vec<u8>>,
}

impl FrameImage {
    /// Decode an encoded image (PNG for extracted frames).
    pub fn decode(bytes: &[u8]) -> MediaResult<Self> {
        let dyn_img =
            image::load_from_memory(bytes).map_err(|e| MediaError::decode(e.to_string()))?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba.into_raw()),
        })
    }

    /// Return `true` when any pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.rgba8.chunks_exact(4).any(|px| px[3] != 255)
    }

    /// Premultiplied copy of the pixels, for compositors that expect it.
    pub fn premultiplied(&self) -> Vec<u8> {
        let mut out = self.rgba8.to_vec();
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
        out
    }
}

/// Frame decoding seam; swapped for an in-memory loader in tests.
pub trait FrameLoader {
    /// Decode the frame stored at `path`.
    fn load(&self, path: &Path) -> MediaResult<FrameImage>;
}

/// Loads frame files from disk through the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFileLoader;

impl FrameLoader for ImageFileLoader {
    fn load(&self, path: &Path) -> MediaResult<FrameImage> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read frame '{}'", path.display()))?;
        FrameImage::decode(&bytes).map_err(|e| match e {
            MediaError::Decode(msg) => MediaError::decode(format!("'{}': {msg}", path.display())),
            other => other,
        })
    }
}

/// Bounded decoded-frame cache keyed by frame index.
///
/// When full, the entry farthest from the playback cursor goes first; on a tie the
/// frame behind the cursor is dropped and the one ahead is kept.
#[derive(Debug)]
pub struct FrameCache<L = ImageFileLoader> {
    capacity: usize,
    entries: HashMap<usize, Arc<FrameImage>>,
    loader: L,
    loads: usize,
}

impl FrameCache<ImageFileLoader> {
    /// Cache decoding PNG files from disk.
    pub fn new(capacity: usize) -> Self {
        Self::with_loader(capacity, ImageFileLoader)
    }
}

impl<L: FrameLoader> FrameCache<L> {
    /// Cache using a custom loader. `capacity` is clamped to at least 1.
    pub fn with_loader(capacity: usize, loader: L) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            loader,
            loads: 0,
        }
    }

    /// Maximum number of decoded frames kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of decoded frames held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return `true` when frame `index` is cached.
    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Cached frame indices, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut v: Vec<usize> = self.entries.keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Number of loader calls so far.
    pub fn load_count(&self) -> usize {
        self.loads
    }

    /// Cached frame `index`, without loading.
    pub fn get(&self, index: usize) -> Option<Arc<FrameImage>> {
        self.entries.get(&index).cloned()
    }

    /// Frame `index` of `sequence`, decoding and inserting it on a miss.
    pub fn get_frame(
        &mut self,
        sequence: &FrameSequence,
        index: usize,
        cursor: usize,
    ) -> MediaResult<Arc<FrameImage>> {
        if let Some(hit) = self.entries.get(&index) {
            return Ok(Arc::clone(hit));
        }
        let path = sequence.frame_path(index).ok_or_else(|| {
            anyhow::anyhow!(
                "frame {index} out of range (sequence has {})",
                sequence.frame_count()
            )
        })?;
        let img = Arc::new(self.loader.load(path)?);
        self.loads += 1;
        self.insert(index, Arc::clone(&img), cursor);
        Ok(img)
    }

    /// Insert a decoded frame and evict down to capacity around `cursor`.
    pub fn insert(&mut self, index: usize, frame: Arc<FrameImage>, cursor: usize) {
        self.entries.insert(index, frame);
        self.evict(cursor);
    }

    /// Drop every cached frame.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict(&mut self, cursor: usize) {
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .keys()
                .copied()
                .max_by_key(|&i| (i.abs_diff(cursor), i < cursor));
            match victim {
                Some(i) => {
                    self.entries.remove(&i);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/frame_cache.rs"]
mod tests;
