//! Action contracts
//!
//! An action contract binds a human-readable description to a parameter
//! schema and a result schema. It is the unit a provider implements and
//! a dispatcher invokes; contracts themselves perform no I/O.
//!
//! Schemas are built on demand rather than at load time, so shapes that
//! depend on the environment (the runtime-context schema in particular)
//! are resolved when the action is actually called.

use crate::schema::{FieldSpec, FieldType, Schema};

/// A named operation with validated parameter and result shapes.
pub trait ActionContract {
    /// What the action does and when the surrounding tool calls it.
    fn description(&self) -> &str;

    /// The schema every accepted parameter set validates against.
    fn params_schema(&self) -> Schema;

    /// The schema every produced result validates against.
    fn result_schema(&self) -> Schema;
}

/// Base parameter schema shared by every action taken on a deployed
/// service. Concrete actions extend it with their own fields.
///
/// The runtime-context shape is supplied by the environment, so it is
/// taken as an argument rather than baked in.
pub fn service_action_schema(runtime_context: Schema) -> Schema {
    Schema::new()
        .describe("Parameters common to every action on a deployed service.")
        .field(
            FieldSpec::new("service_name", FieldType::String)
                .required()
                .description("The name of the service the action targets."),
        )
        .field(
            FieldSpec::new("runtime_context", FieldType::Object(runtime_context))
                .description("The runtime context active for this invocation."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_schema_requires_service_name() {
        let schema = service_action_schema(Schema::new());

        let err = schema.validate(&json!({})).unwrap_err();
        assert!(err.mentions("service_name"));

        assert!(schema.validate(&json!({ "service_name": "api" })).is_ok());
    }

    #[test]
    fn test_runtime_context_shape_is_embedded() {
        let context = Schema::new()
            .field(FieldSpec::new("deployment", FieldType::String).required());
        let schema = service_action_schema(context);

        let err = schema
            .validate(&json!({ "service_name": "api", "runtime_context": {} }))
            .unwrap_err();

        assert!(err.mentions("runtime_context.deployment"));
    }

    #[test]
    fn test_multiple_actions_share_the_base() {
        let base = service_action_schema(Schema::new());

        // Two different actions extending the same base, independently.
        let logs = base.extend([FieldSpec::new("follow", FieldType::Bool)]);
        let exec = base.extend([FieldSpec::new("command", FieldType::String).required()]);

        assert!(logs.field_spec("follow").is_some());
        assert!(logs.field_spec("command").is_none());
        assert!(exec.field_spec("command").is_some());
    }
}
