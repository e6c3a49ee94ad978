//! Structured error types shared across CAP crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::Status;

/// Structured payload attached to every [`CapError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (task path, file path, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the CAP engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CapError {
    /// Scoped configuration errors (duplicate keys, malformed files).
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Task tree assembly and lifecycle errors.
    #[error("task error: {0}")]
    Task(ErrorInfo),
    /// Accumulator and histogram errors.
    #[error("histogram error: {0}")]
    Histogram(ErrorInfo),
    /// Persisted key-value store errors.
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// Subsample aggregation errors.
    #[error("subsample error: {0}")]
    Subsample(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Unrecoverable failures that terminate the run at the next checkpoint.
    #[error("fatal: {0}")]
    Fatal(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CapError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CapError::Config(info)
            | CapError::Task(info)
            | CapError::Histogram(info)
            | CapError::Store(info)
            | CapError::Subsample(info)
            | CapError::Serde(info)
            | CapError::Fatal(info) => info,
        }
    }

    /// Status that should be posted on the run when this error surfaces inside a phase hook.
    pub fn status(&self) -> Status {
        match self {
            CapError::Fatal(_) => Status::Fatal,
            _ => Status::Error,
        }
    }

    /// Returns true for errors that must end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CapError::Fatal(_))
    }
}
