//! Reelhouse - video streaming server with background transcoding
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod server;
pub mod store;
pub mod streaming;
pub mod transcode;
