//! Octi
//!
//! Command line client and sync server for sharing device state between a
//! user's devices. The sync machinery lives in `octi-core`.

pub mod commands;
pub mod config;
pub mod server;
