//! Trellis Core
//!
//! Core contract types for the Trellis service-action framework.
//!
//! This crate contains:
//! - Schema descriptors: declarative parameter/result shapes with pure validation
//! - Action contracts: named operations binding a description to param/result schemas
//! - Log streams: the live entry channel between a provider and a caller
//! - The service-logs action: the concrete contract for retrieving service logs
//!
//! Provider implementations (environment-specific backends) live in their own
//! crates and plug in through the [`provider::LogProvider`] trait.

pub mod action;
pub mod actions;
pub mod domain;
pub mod provider;
pub mod schema;
pub mod stream;

pub use action::ActionContract;
pub use domain::{LogQuery, ServiceLogEntry, TAIL_ALL};
pub use provider::{LogProvider, ProviderError};
pub use schema::{FieldSpec, FieldType, Schema, ValidationError};
pub use stream::{EmitError, LogSink, LogStream, StreamTerminal, log_stream};
