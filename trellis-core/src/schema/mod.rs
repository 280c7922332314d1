//! Schema descriptors
//!
//! Declarative shapes for action parameters and results:
//! - A schema is an ordered list of field specs (type, constraints,
//!   default, documentation)
//! - Validation is a pure function over `serde_json::Value`, applying
//!   declared defaults first and collecting every violation
//! - Schemas compose: an action-specific schema extends a shared base
//!   by adding or overriding fields
//!
//! No serialization format is prescribed; `Value` is only the in-process
//! candidate representation, matching how action parameters travel
//! through the framework.

pub mod error;

pub use error::{FieldViolation, ValidationError};

use serde_json::{Map, Value};

/// The type constraint of a schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Bool,
    Number,
    /// A whole number; fractional values are rejected.
    Integer,
    /// An RFC 3339 instant, carried as a string.
    Instant,
    /// A nested object validated against its own schema.
    Object(Schema),
    /// An opaque side-channel value (e.g. a stream sink handle).
    /// Never validated, passed through untouched.
    Handle,
}

impl FieldType {
    fn expected(&self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Bool => "a boolean",
            FieldType::Number => "a number",
            FieldType::Integer => "an integer",
            FieldType::Instant => "an RFC 3339 instant",
            FieldType::Object(_) => "an object",
            FieldType::Handle => "any value",
        }
    }
}

/// Declaration of a single schema field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    description: Option<String>,
    required: bool,
    default: Option<Value>,
}

impl FieldSpec {
    /// Declares a field with the given name and type constraint.
    ///
    /// Fields are optional and undocumented until the builder methods
    /// say otherwise.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
            required: false,
            default: None,
        }
    }

    /// Attaches human-readable documentation to the field.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declares a default, merged into candidates before validation.
    /// A field with a default is never missing once defaults are applied.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// A schema descriptor: the declared shape of a parameter or result value.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    description: Option<String>,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Creates an empty object schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches human-readable documentation to the schema.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Adds a field declaration.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Returns a new schema with the given fields added, overriding any
    /// existing field of the same name in place.
    ///
    /// Pure: the receiver is unchanged and extension may be repeated.
    pub fn extend(&self, fields: impl IntoIterator<Item = FieldSpec>) -> Schema {
        let mut extended = self.clone();
        for spec in fields {
            match extended.fields.iter_mut().find(|f| f.name == spec.name) {
                Some(existing) => *existing = spec,
                None => extended.fields.push(spec),
            }
        }
        extended
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field declaration by name.
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a candidate value against this schema.
    ///
    /// Declared defaults are merged first, then every field is checked.
    /// On success the returned value is the defaulted candidate; on
    /// failure the error lists every violation with its field path.
    /// Validation is pure: re-validating a returned value yields an
    /// equal value.
    pub fn validate(&self, candidate: &Value) -> Result<Value, ValidationError> {
        let mut violations = Vec::new();
        let validated = self.check(candidate, "", &mut violations);
        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(ValidationError::new(violations))
        }
    }

    fn check(&self, candidate: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Value {
        let Some(object) = candidate.as_object() else {
            violations.push(FieldViolation {
                path: root_path(path),
                expected: "an object".to_string(),
                actual: describe(candidate),
            });
            return candidate.clone();
        };

        let mut merged: Map<String, Value> = object.clone();
        for spec in &self.fields {
            if let Some(default) = &spec.default {
                merged
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        for key in merged.keys() {
            if self.field_spec(key).is_none() {
                violations.push(FieldViolation {
                    path: join_path(path, key),
                    expected: "a declared field".to_string(),
                    actual: "an unknown field".to_string(),
                });
            }
        }

        for spec in &self.fields {
            let field_path = join_path(path, &spec.name);
            let value = merged.get(&spec.name).cloned();
            match value {
                None | Some(Value::Null) if spec.required => {
                    violations.push(FieldViolation {
                        path: field_path,
                        expected: format!("{} (required)", spec.field_type.expected()),
                        actual: "nothing".to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) => match &spec.field_type {
                    FieldType::Handle => {}
                    FieldType::String if value.is_string() => {}
                    FieldType::Bool if value.is_boolean() => {}
                    FieldType::Number if value.is_number() => {}
                    FieldType::Integer if value.as_i64().is_some() => {}
                    FieldType::Instant => {
                        let parsed = value
                            .as_str()
                            .map(chrono::DateTime::parse_from_rfc3339);
                        if !matches!(parsed, Some(Ok(_))) {
                            violations.push(FieldViolation {
                                path: field_path,
                                expected: spec.field_type.expected().to_string(),
                                actual: describe(&value),
                            });
                        }
                    }
                    FieldType::Object(schema) => {
                        let checked = schema.check(&value, &field_path, violations);
                        merged.insert(spec.name.clone(), checked);
                    }
                    mismatched => {
                        violations.push(FieldViolation {
                            path: field_path,
                            expected: mismatched.expected().to_string(),
                            actual: describe(&value),
                        });
                    }
                },
            }
        }

        Value::Object(merged)
    }
}

fn root_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}
