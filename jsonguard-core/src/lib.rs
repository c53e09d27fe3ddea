//! JSON request guard: decode the request body, validate it against a JSON Schema
//! (optionally filling in schema defaults) and publish the result to request state.

pub mod app;
pub mod defaults;
pub mod formats;
pub mod guard;
pub mod handler;
pub mod http;
pub mod router;
pub mod schema;

pub use app::{App, HttpApplication};
pub use defaults::inject_defaults;
pub use formats::{CheckFormats, FormatPolicy};
pub use guard::{ExpectsJson, GuardConfig, GuardOutcome};
pub use handler::{handler_fn, sync_handler, Handler};
pub use router::{RouteId, Router};
pub use schema::{DefaultingValidator, PlainValidator, Validate, ValidationFailure};

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Key under which the guard publishes the validated payload.
pub const DATA_KEY: &str = "data";

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("route not found: {0}")]
    NotFound(String),
    /// Request halted before the handler ran.
    #[error("{message}")]
    Abort { status: u16, message: String },
    #[error("invalid schema: {0}")]
    Schema(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handler error: {0}")]
    Handler(String),
}

impl CoreError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        CoreError::Abort {
            status: 400,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::NotFound(_) => 404,
            CoreError::Abort { status, .. } => *status,
            CoreError::Json(_) => 400,
            CoreError::Schema(_) | CoreError::Handler(_) => 500,
        }
    }
}

/// Guard configuration rejected at construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid guard configuration: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("invalid HTTP method in ignore_for: {0:?}")]
    InvalidMethod(String),
}

/// Request-scoped key/value slot. Lives and dies with one `RequestContext`.
#[derive(Clone, Debug, Default)]
pub struct RequestState {
    values: HashMap<String, Value>,
}

impl RequestState {
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One inbound request as seen by handlers and guards.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub state: RequestState,
}

impl RequestContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Shorthand for a body sent with `Content-Type: application/json`.
    pub fn with_json_body(self, body: impl Into<Vec<u8>>) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True when the declared mimetype is `application/json` or `application/*+json`.
    pub fn is_json(&self) -> bool {
        let Some(content_type) = self.content_type() else {
            return false;
        };
        let mimetype = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        mimetype == "application/json"
            || (mimetype.starts_with("application/") && mimetype.ends_with("+json"))
    }

    /// Decode the body as JSON. Without `force`, a non-JSON content type yields `Ok(None)`.
    pub fn get_json(&self, force: bool) -> Result<Option<Value>, serde_json::Error> {
        if !force && !self.is_json() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }

    /// Payload published by the guard, if any.
    pub fn data(&self) -> Option<&Value> {
        self.state.get(DATA_KEY)
    }
}

/// Response produced by a handler or by a halted guard.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Response {
    pub fn json(status_code: u16, value: &Value) -> Self {
        Self {
            status_code,
            body: value.to_string().into_bytes(),
            content_type: Some("application/json".into()),
        }
    }

    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into().into_bytes(),
            content_type: Some("text/plain; charset=utf-8".into()),
        }
    }

    pub fn from_error(error: &CoreError) -> Self {
        Self::json(
            error.status_code(),
            &serde_json::json!({ "error": error.to_string() }),
        )
    }

    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The `error` field of a JSON error body.
    pub fn error_message(&self) -> Option<String> {
        self.body_json()
            .ok()?
            .get("error")?
            .as_str()
            .map(String::from)
    }
}
