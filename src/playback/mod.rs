pub(crate) mod cursor;
pub(crate) mod frame_cache;
pub(crate) mod player;
pub(crate) mod sequence;
