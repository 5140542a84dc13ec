//! Release artifacts: platform target names and the release API

pub mod fetcher;
pub mod target;
