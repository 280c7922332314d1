//! Concrete action contracts
//!
//! Each submodule holds one action: its contract implementation, the
//! typed view over the validated parameters, and the invocation driver
//! that runs a provider against it.

pub mod service_logs;

pub use service_logs::{
    ActionError, InvocationOutcome, InvocationStatus, ServiceLogsAction, invoke_service_logs,
};
