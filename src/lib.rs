//! Skygrab - Bluesky video download service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod assemble;
pub mod bsky;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod server;
pub mod workspace;
