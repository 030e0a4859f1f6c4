pub(crate) mod extract;
pub(crate) mod process;
pub(crate) mod progress;
pub(crate) mod supervisor;
pub(crate) mod transcode;
