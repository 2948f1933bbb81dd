#![doc = include_str!("../docs/rustdoc.md")]

/// Exponential backoff schedule for reconnect attempts.
pub mod backoff;
/// Command-line argument definitions.
pub mod cli;
/// Runtime configuration model.
pub mod config;
/// Bidirectional (WebSocket) channel client.
pub mod duplex;
/// Normalized inbound event wrapper.
pub mod envelope;
/// Error types used across the crate.
pub mod error;
/// Transport event bus between channel drivers and observers.
pub mod events;
/// Composition-root owner of both channel clients.
pub mod manager;
/// Metrics counters and exporter setup.
pub mod monitoring;
/// Unidirectional (server-push) channel client.
pub mod push;
/// Bounded FIFO history of recent envelopes.
pub mod ring;
/// Incremental text/event-stream frame decoder.
pub mod sse;
/// Per-channel connection lifecycle state.
pub mod state;
/// Presentation-facing status aggregation.
pub mod status;
/// Duplex-channel topic registry.
pub mod subscriptions;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Wire contract for duplex commands and responses.
pub mod types;
/// Terminal status printer consuming the event bus.
pub mod ui;

/// Primary crate error type.
pub use error::DriftwireError;
