//! Core domain types
//!
//! This module contains the domain structures shared between the action
//! framework and provider implementations: log entries, log queries, and
//! the per-invocation status machine.

pub mod log;

pub use log::{LogQuery, ServiceLogEntry, TAIL_ALL};
