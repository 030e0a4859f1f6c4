pub(crate) mod classify;
pub(crate) mod probe;
pub(crate) mod source;
