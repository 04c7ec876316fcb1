//! services/api/src/lib.rs
//!
//! The HTTP and WebSocket face of the e-waste core: configuration, adapters
//! for Postgres and the LLM provider, and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
