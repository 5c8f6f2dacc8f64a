//! Beacon gateway: the HTTP/WebSocket surface over the trace store,
//! span intake with live fanout, OTLP and export format adapters, and
//! the background agent runner.

pub mod api;
pub mod export;
pub mod intake;
pub mod live;
pub mod otlp;
pub mod runtime;
pub mod state;
