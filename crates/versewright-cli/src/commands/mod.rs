pub(crate) mod admin;
pub(crate) mod write;
