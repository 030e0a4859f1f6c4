pub(crate) mod facade;
pub(crate) mod load;
