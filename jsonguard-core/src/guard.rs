//! Request guard: decide whether a request is validated, decode its JSON body,
//! validate it and publish the result to request state before the handler runs.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use crate::formats::{CheckFormats, FormatPolicy};
use crate::handler::Handler;
use crate::schema::{DefaultingValidator, PlainValidator, Validate};
use crate::{ConfigError, CoreError, RequestContext, Response, DATA_KEY};

const DECODE_FAILED: &str = "Failed to decode JSON object";

/// Guard configuration. Fixed once the guard is built.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Schema to validate against; `None` accepts any JSON value.
    pub schema: Option<Value>,
    /// Decode the body as JSON whatever the declared content type.
    pub force: bool,
    pub fill_defaults: bool,
    /// Methods that skip decoding and validation entirely.
    pub ignore_for: Vec<String>,
    pub check_formats: CheckFormats,
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document, e.g. `{"schema": {...}, "ignore_for": ["GET"]}`.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn force(mut self, yes: bool) -> Self {
        self.force = yes;
        self
    }

    pub fn fill_defaults(mut self, yes: bool) -> Self {
        self.fill_defaults = yes;
        self
    }

    pub fn ignore_for<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_for = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn check_formats(mut self, setting: impl Into<CheckFormats>) -> Self {
        self.check_formats = setting.into();
        self
    }

    /// Assert only the named formats.
    pub fn check_formats_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_formats = CheckFormats::Only(names.into_iter().map(Into::into).collect());
        self
    }
}

/// What the guard did with a request that was allowed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Method is in the ignore set; body untouched.
    Bypassed,
    /// Body decoded, validated and published under [`DATA_KEY`].
    Validated,
}

/// Why the validator could not be built. Replayed on every request.
#[derive(Clone, Debug)]
enum SetupFailure {
    Abort { status: u16, message: String },
    Schema(String),
}

impl SetupFailure {
    fn to_error(&self) -> CoreError {
        match self {
            SetupFailure::Abort { status, message } => CoreError::Abort {
                status: *status,
                message: message.clone(),
            },
            SetupFailure::Schema(message) => CoreError::Schema(message.clone()),
        }
    }
}

impl From<CoreError> for SetupFailure {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Abort { status, message } => SetupFailure::Abort { status, message },
            CoreError::Schema(message) => SetupFailure::Schema(message),
            other => SetupFailure::Schema(other.to_string()),
        }
    }
}

struct Inner {
    schema: Value,
    force: bool,
    fill_defaults: bool,
    ignore_for: BTreeSet<String>,
    check_formats: CheckFormats,
    validator: OnceLock<Result<Box<dyn Validate>, SetupFailure>>,
}

/// A configured guard. Cheap to clone; clones share the compiled validator.
#[derive(Clone)]
pub struct ExpectsJson {
    inner: Arc<Inner>,
}

impl ExpectsJson {
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        let mut ignore_for = BTreeSet::new();
        for method in config.ignore_for {
            let method = method.to_uppercase();
            ::http::Method::from_bytes(method.as_bytes())
                .map_err(|_| ConfigError::InvalidMethod(method.clone()))?;
            ignore_for.insert(method);
        }
        Ok(Self {
            inner: Arc::new(Inner {
                schema: config.schema.unwrap_or_else(|| Value::Object(Default::default())),
                force: config.force,
                fill_defaults: config.fill_defaults,
                ignore_for,
                check_formats: config.check_formats,
                validator: OnceLock::new(),
            }),
        })
    }

    /// Guard built from a configuration document; see [`GuardConfig::from_value`].
    pub fn from_value(config: Value) -> Result<Self, ConfigError> {
        Self::new(GuardConfig::from_value(config)?)
    }

    pub fn is_ignored(&self, method: &str) -> bool {
        self.inner.ignore_for.contains(&method.to_uppercase())
    }

    /// Run the guard against one request. On success the validated payload is in
    /// `ctx.state` under [`DATA_KEY`]; any error halts the request.
    pub fn check(&self, ctx: &mut RequestContext) -> Result<GuardOutcome, CoreError> {
        if self.is_ignored(&ctx.method) {
            tracing::debug!(method = %ctx.method, path = %ctx.path, "validation bypassed");
            return Ok(GuardOutcome::Bypassed);
        }

        let mut data = match ctx.get_json(self.inner.force) {
            Ok(Some(value)) if !value.is_null() => value,
            Ok(_) => {
                tracing::debug!(path = %ctx.path, "no JSON object in request body");
                return Err(CoreError::bad_request(DECODE_FAILED));
            }
            Err(e) => {
                tracing::debug!(path = %ctx.path, error = %e, "request body is not valid JSON");
                return Err(CoreError::bad_request(DECODE_FAILED));
            }
        };

        let validator = self.validator()?;
        if let Err(failure) = validator.validate(&mut data) {
            tracing::debug!(
                path = %ctx.path,
                instance_path = %failure.instance_path,
                keyword = %failure.keyword,
                "request body rejected: {}",
                failure.message
            );
            return Err(CoreError::bad_request(failure.message));
        }

        ctx.state.insert(DATA_KEY, data);
        Ok(GuardOutcome::Validated)
    }

    /// Wrap `handler` so it only runs for requests the guard lets through.
    pub fn wrap(&self, handler: Handler) -> Handler {
        let guard = self.clone();
        Arc::new(move |mut ctx: RequestContext| -> BoxFuture<'static, Result<Response, CoreError>> {
            let outcome = guard.check(&mut ctx);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                outcome?;
                handler(ctx).await
            })
        })
    }

    fn validator(&self) -> Result<&dyn Validate, CoreError> {
        let built = self.inner.validator.get_or_init(|| {
            let built = self.build_validator().map_err(SetupFailure::from);
            match &built {
                Ok(_) => tracing::debug!(
                    fill_defaults = self.inner.fill_defaults,
                    "schema validator built"
                ),
                Err(failure) => tracing::warn!(?failure, "schema validator unavailable"),
            }
            built
        });
        match built {
            Ok(validator) => Ok(validator.as_ref()),
            Err(failure) => Err(failure.to_error()),
        }
    }

    fn build_validator(&self) -> Result<Box<dyn Validate>, CoreError> {
        let formats = FormatPolicy::try_from(&self.inner.check_formats)?;
        let schema = &self.inner.schema;
        if self.inner.fill_defaults {
            Ok(Box::new(DefaultingValidator::new(schema, &formats)?))
        } else {
            Ok(Box::new(PlainValidator::new(schema, &formats)?))
        }
    }
}

impl std::fmt::Debug for ExpectsJson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpectsJson")
            .field("force", &self.inner.force)
            .field("fill_defaults", &self.inner.fill_defaults)
            .field("ignore_for", &self.inner.ignore_for)
            .field("check_formats", &self.inner.check_formats)
            .finish_non_exhaustive()
    }
}
