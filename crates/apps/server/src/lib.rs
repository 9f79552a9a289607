//! Demo host for marionette rigs: a channel transport, simulated viewers and metrics.

pub mod channel;
pub mod config;
pub mod demo;
pub mod metrics;
