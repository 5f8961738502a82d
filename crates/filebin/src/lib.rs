//! filebin - a small HTTP blob store
//!
//! This library provides:
//! - `web`: axum router and handlers for storing and fetching blobs
//! - `serve`: server loop with startup sweep and graceful shutdown
//! - `telemetry`: tracing subscriber and optional OTLP export

pub mod serve;
pub mod telemetry;
pub mod web;
