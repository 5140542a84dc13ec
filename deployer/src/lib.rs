//! intoxicode deployer library
//!
//! Webhook receiver and deploy pipeline for the self-updating intoxicode
//! web service.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod installer;
pub mod logs;
pub mod models;
pub mod release;
pub mod server;
pub mod storage;
pub mod utils;
pub mod webhook;
pub mod workers;
