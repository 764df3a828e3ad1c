//! Integration test utilities for the chat client
//!
//! This crate provides a local WebSocket chat room server and helpers for
//! running end-to-end tests of the connection manager against it.

pub mod helpers;

pub use helpers::*;
