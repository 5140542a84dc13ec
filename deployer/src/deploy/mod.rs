//! Deployment module

pub mod command;
pub mod fsm;
pub mod orchestrator;
pub mod task;
