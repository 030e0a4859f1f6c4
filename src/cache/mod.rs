pub(crate) mod sidecar;
pub(crate) mod store;
