//! Format assertion policy.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::CoreError;

/// Formats with a built-in checker in the draft 7 validator.
pub const KNOWN_FORMATS: &[&str] = &[
    "date",
    "date-time",
    "duration",
    "email",
    "hostname",
    "idn-email",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "iri",
    "iri-reference",
    "json-pointer",
    "regex",
    "relative-json-pointer",
    "time",
    "uri",
    "uri-reference",
    "uri-template",
    "uuid",
];

const INVALID_CHECK_FORMATS: &str = "check_format must be bool or iterable";

/// `check_formats` as configured. Anything that is neither a flag nor a list of
/// names is kept as-is and rejected when the guard first needs a policy.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CheckFormats {
    Flag(bool),
    Only(BTreeSet<String>),
    Invalid(Value),
}

impl Default for CheckFormats {
    fn default() -> Self {
        CheckFormats::Flag(false)
    }
}

impl From<bool> for CheckFormats {
    fn from(flag: bool) -> Self {
        CheckFormats::Flag(flag)
    }
}

/// Which `format` keywords are asserted during validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FormatPolicy {
    /// `format` is an annotation only.
    #[default]
    Off,
    All,
    Only(BTreeSet<String>),
}

impl FormatPolicy {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FormatPolicy::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, FormatPolicy::Off)
    }

    /// Known formats whose assertion is switched off under this policy.
    pub fn suppressed(&self) -> Vec<&'static str> {
        match self {
            FormatPolicy::Off | FormatPolicy::All => Vec::new(),
            FormatPolicy::Only(names) => KNOWN_FORMATS
                .iter()
                .copied()
                .filter(|name| !names.contains(*name))
                .collect(),
        }
    }
}

impl TryFrom<&CheckFormats> for FormatPolicy {
    type Error = CoreError;

    fn try_from(setting: &CheckFormats) -> Result<Self, Self::Error> {
        match setting {
            CheckFormats::Flag(false) => Ok(FormatPolicy::Off),
            CheckFormats::Flag(true) => Ok(FormatPolicy::All),
            CheckFormats::Only(names) => Ok(FormatPolicy::Only(names.clone())),
            CheckFormats::Invalid(_) => Err(CoreError::bad_request(INVALID_CHECK_FORMATS)),
        }
    }
}
