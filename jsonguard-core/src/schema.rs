//! JSON Schema validation on top of the `jsonschema` crate (draft 7), with an
//! optional default-filling pass in front of it.

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Draft, ValidationError};
use serde_json::Value;
use std::fmt;

use crate::defaults::inject_defaults;
use crate::formats::FormatPolicy;
use crate::CoreError;

/// First constraint violated by an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    /// JSON pointer to the failing value (`""` for the root).
    pub instance_path: String,
    /// Schema keyword that failed, e.g. `type` or `required`.
    pub keyword: String,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationFailure {}

impl From<ValidationError<'_>> for ValidationFailure {
    fn from(error: ValidationError<'_>) -> Self {
        let schema_path = error.schema_path.to_string();
        let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_owned();
        Self {
            instance_path: error.instance_path.to_string(),
            keyword,
            message: describe(&error),
        }
    }
}

/// Validates one instance against a fixed schema. Implementations may rewrite
/// the instance (filling defaults) before checking it.
pub trait Validate: Send + Sync {
    fn validate(&self, instance: &mut Value) -> Result<(), ValidationFailure>;
}

/// Plain draft 7 validation; never touches the instance.
pub struct PlainValidator {
    validator: jsonschema::Validator,
}

impl PlainValidator {
    pub fn new(schema: &Value, formats: &FormatPolicy) -> Result<Self, CoreError> {
        let mut options = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(formats.is_enabled());
        for name in formats.suppressed() {
            options = options.with_format(name, |_: &str| true);
        }
        let validator = options
            .build(schema)
            .map_err(|e| CoreError::Schema(e.to_string()))?;
        Ok(Self { validator })
    }

    pub fn check(&self, instance: &Value) -> Result<(), ValidationFailure> {
        match self.validator.iter_errors(instance).next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

impl Validate for PlainValidator {
    fn validate(&self, instance: &mut Value) -> Result<(), ValidationFailure> {
        self.check(instance)
    }
}

/// Fills schema defaults into the instance, then hands it to `inner`, so an
/// injected default is validated exactly like a caller-supplied value.
pub struct DefaultingValidator<V = PlainValidator> {
    schema: Value,
    inner: V,
}

impl DefaultingValidator<PlainValidator> {
    pub fn new(schema: &Value, formats: &FormatPolicy) -> Result<Self, CoreError> {
        let inner = PlainValidator::new(schema, formats)?;
        Ok(Self::wrap(schema.clone(), inner))
    }
}

impl<V: Validate> DefaultingValidator<V> {
    pub fn wrap(schema: Value, inner: V) -> Self {
        Self { schema, inner }
    }
}

impl<V: Validate> Validate for DefaultingValidator<V> {
    fn validate(&self, instance: &mut Value) -> Result<(), ValidationFailure> {
        inject_defaults(&self.schema, instance);
        self.inner.validate(instance)
    }
}

/// Messages for the common keywords, with single-quoted strings.
fn describe(error: &ValidationError<'_>) -> String {
    let instance = render(&error.instance);
    match &error.kind {
        ValidationErrorKind::Type { kind } => {
            let expected = match kind {
                TypeKind::Single(ty) => format!("'{ty}'"),
                TypeKind::Multiple(types) => types
                    .iter()
                    .map(|ty| format!("'{ty}'"))
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            format!("{instance} is not of type {expected}")
        }
        ValidationErrorKind::Required { property } => {
            format!("{} is a required property", render(property))
        }
        ValidationErrorKind::Format { format } => format!("{instance} is not a '{format}'"),
        ValidationErrorKind::Enum { options } => {
            format!("{instance} is not one of {}", render(options))
        }
        _ => error.to_string(),
    }
}

/// Python-style literals: `'text'`, `True`, `None`.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        Value::Bool(true) => "True".to_owned(),
        Value::Bool(false) => "False".to_owned(),
        Value::Null => "None".to_owned(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", render(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        other => other.to_string(),
    }
}
