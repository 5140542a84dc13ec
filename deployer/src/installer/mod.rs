//! Artifact installation

pub mod install;
