//! The service-logs action
//!
//! The concrete contract for retrieving logs from a running service:
//! - Parameter schema: the shared service-action base extended with
//!   `follow`, `tail`, `start_time`, and the opaque `stream` handle
//! - Result schema: the empty object; success is signaled by stream
//!   completion, not by a payload
//! - Invocation driver: validates parameters, hands the query and the
//!   sink to a provider, and maps the outcome onto the stream's
//!   terminal signal

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::action::{ActionContract, service_action_schema};
use crate::domain::{LogQuery, TAIL_ALL};
use crate::provider::{LogProvider, ProviderError};
use crate::schema::{FieldSpec, FieldType, Schema, ValidationError};
use crate::stream::{LogSink, StreamTerminal};

const DESCRIPTION: &str = "Retrieve a stream of logs for the specified service, optionally \
     listening for new entries until cancelled. Called by the `trellis logs` command.";

/// Schema for the entries a provider hands back over the stream.
///
/// Providers are expected to stamp every entry; the entry type keeps the
/// timestamp optional only for sources that genuinely cannot supply one.
pub fn service_log_entry_schema() -> Schema {
    Schema::new()
        .describe("A log entry returned by a service-logs provider.")
        .field(
            FieldSpec::new("service_name", FieldType::String)
                .required()
                .description("The name of the service the log entry originated from."),
        )
        .field(
            FieldSpec::new("timestamp", FieldType::Instant)
                .required()
                .description("The time when the log entry was generated by the service."),
        )
        .field(
            FieldSpec::new("msg", FieldType::String)
                .required()
                .description("The content of the log entry."),
        )
}

/// The log-retrieval action contract.
///
/// Carries a supplier for the runtime-context schema so the parameter
/// schema can be resolved at call time rather than at load time.
pub struct ServiceLogsAction {
    runtime_context: Arc<dyn Fn() -> Schema + Send + Sync>,
}

impl ServiceLogsAction {
    /// Creates the action with the given runtime-context schema supplier.
    pub fn new<F>(runtime_context: F) -> Self
    where
        F: Fn() -> Schema + Send + Sync + 'static,
    {
        Self {
            runtime_context: Arc::new(runtime_context),
        }
    }
}

impl ActionContract for ServiceLogsAction {
    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn params_schema(&self) -> Schema {
        service_action_schema((self.runtime_context)()).extend([
            FieldSpec::new("stream", FieldType::Handle)
                .description("A sink handle the provider writes log entries to."),
            FieldSpec::new("follow", FieldType::Bool)
                .default_value(json!(false))
                .description("Whether to keep listening for logs until cancelled."),
            FieldSpec::new("tail", FieldType::Integer)
                .default_value(json!(TAIL_ALL))
                .description(
                    "Number of lines to get from the end of the log. \
                     Defaults to -1, returning all log lines.",
                ),
            FieldSpec::new("start_time", FieldType::Instant).description(
                "If set, only return logs that are as new or newer than this instant.",
            ),
        ])
    }

    fn result_schema(&self) -> Schema {
        Schema::new().describe(
            "Empty: success is signaled by the stream completing, not by a result payload.",
        )
    }
}

/// Builds the typed query from a schema-validated parameter value.
///
/// Defaults are already merged by validation, so missing fields here
/// only cover the genuinely optional ones.
pub fn log_query_from_validated(params: &Value) -> LogQuery {
    let service_name = params
        .get("service_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let follow = params
        .get("follow")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let tail = params.get("tail").and_then(Value::as_i64).unwrap_or(TAIL_ALL);
    let start_time = params
        .get("start_time")
        .and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&chrono::Utc));

    LogQuery {
        service_name,
        follow,
        tail,
        start_time,
    }
}

/// Per-invocation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Pending,
    Validating,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvocationStatus::Pending => "pending",
            InvocationStatus::Validating => "validating",
            InvocationStatus::Streaming => "streaming",
            InvocationStatus::Completed => "completed",
            InvocationStatus::Failed => "failed",
            InvocationStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// How an invocation ended without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The provider finished; carries the validated (empty) result.
    Completed(Value),
    /// The caller withdrew interest; clean early termination, not an
    /// error.
    Cancelled,
}

impl InvocationOutcome {
    pub fn status(&self) -> InvocationStatus {
        match self {
            InvocationOutcome::Completed(_) => InvocationStatus::Completed,
            InvocationOutcome::Cancelled => InvocationStatus::Cancelled,
        }
    }
}

/// Errors surfaced to the caller of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Parameters or result violated the declared schema. Never reaches
    /// provider code.
    #[error("invalid parameters: {0}")]
    Validation(#[from] ValidationError),

    /// The provider failed while streaming. Entries streamed before the
    /// failure remain valid.
    #[error("provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Runs a provider against the service-logs contract.
///
/// Drives `Pending → Validating → Streaming` and maps the provider's
/// return onto exactly one terminal: `Completed` (stream completed,
/// empty result), `Failed` (stream marked failed, error returned), or
/// `Cancelled` (clean termination, no error). The caller consumes the
/// paired [`LogStream`](crate::stream::LogStream) concurrently.
pub async fn invoke_service_logs<P>(
    action: &ServiceLogsAction,
    provider: &P,
    params: &Value,
    sink: LogSink,
) -> Result<InvocationOutcome, ActionError>
where
    P: LogProvider + ?Sized,
{
    let invocation = Uuid::new_v4();
    debug!(%invocation, status = %InvocationStatus::Validating, "validating service-logs parameters");

    let validated = match action.params_schema().validate(params) {
        Ok(validated) => validated,
        Err(err) => {
            debug!(
                %invocation,
                status = %InvocationStatus::Failed,
                violations = err.violations.len(),
                "parameter validation failed"
            );
            // The stream is marked inert; the provider is never called.
            sink.fail(ProviderError::other(err.to_string())).await;
            return Err(err.into());
        }
    };
    let query = log_query_from_validated(&validated);

    info!(
        %invocation,
        status = %InvocationStatus::Streaming,
        service = %query.service_name,
        follow = query.follow,
        tail = query.tail,
        "streaming service logs"
    );

    match provider.service_logs(&query, &sink).await {
        // The settled terminal decides between completion and
        // cancellation, so the outcome can never disagree with what the
        // stream's consumer observes.
        Ok(()) => match sink.complete().await {
            StreamTerminal::Cancelled => {
                info!(%invocation, status = %InvocationStatus::Cancelled, "log stream cancelled by caller");
                Ok(InvocationOutcome::Cancelled)
            }
            _ => {
                let result = json!({});
                // Results validate before they reach the caller, even empty ones.
                action.result_schema().validate(&result)?;
                debug!(%invocation, status = %InvocationStatus::Completed, "log stream completed");
                Ok(InvocationOutcome::Completed(result))
            }
        },
        Err(err) => {
            error!(
                %invocation,
                status = %InvocationStatus::Failed,
                error = %err,
                "provider failed while streaming logs"
            );
            sink.fail(err.clone()).await;
            Err(err.into())
        }
    }
}
