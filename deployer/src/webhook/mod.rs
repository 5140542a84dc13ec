//! Webhook verification and decoding

pub mod event;
pub mod signature;
