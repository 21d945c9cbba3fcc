//! Error types for the playbook engine.
//!
//! Only [`LoadError`] and non-ignored step failures end a run. Template and
//! condition problems, unknown buffers and checkpoint write failures are
//! logged and recovered where they happen, so they have no variant here
//! beyond the parse errors used internally by the resolver.

use std::path::PathBuf;
use thiserror::Error;

/// The run-level error returned by the pipeline runner.
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// The playbook document could not be loaded.
    #[error("{0}")]
    Load(#[from] LoadError),

    /// A step failed and did not have `ignore_errors` set.
    #[error("Step \"{step}\" failed: {source}")]
    StepFailed {
        /// Name of the failing step.
        step: String,
        /// The underlying handler error.
        #[source]
        source: ActionError,
    },

    /// The run was cancelled between steps.
    #[error("Playbook cancelled: {0}")]
    Cancelled(String),
}

impl PlaybookError {
    /// Returns the failing step name, if the error came from a step.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Errors raised while reading and validating a playbook document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The document could not be read from disk.
    #[error("Failed to read playbook {path}: {source}")]
    Read {
        /// The path that was read.
        path: PathBuf,
        /// The IO failure.
        #[source]
        source: std::io::Error,
    },

    /// The YAML document is malformed.
    #[error("Invalid YAML playbook: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document is malformed.
    #[error("Invalid JSON playbook: {0}")]
    Json(#[from] serde_json::Error),

    /// The document has no steps to run.
    #[error("Playbook has no steps")]
    NoSteps,
}

/// Errors raised by action handlers and the dispatcher.
#[derive(Debug, Error)]
pub enum ActionError {
    /// No handler is registered under the action name.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A required parameter is absent or empty.
    #[error("{action}: parameter '{param}' is required")]
    MissingParam {
        /// The action name.
        action: String,
        /// The missing parameter.
        param: String,
    },

    /// A parameter has an unusable value.
    #[error("{action}: invalid parameter '{param}': {message}")]
    InvalidParam {
        /// The action name.
        action: String,
        /// The offending parameter.
        param: String,
        /// What is wrong with it.
        message: String,
    },

    /// The collection/buffer store rejected an operation.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A handler-specific failure.
    #[error("{0}")]
    Handler(String),

    /// An HTTP call failed or returned a non-success status.
    #[error("{0}")]
    Http(String),

    /// A CSV document could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The handler was interrupted by run cancellation.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ActionError {
    /// Creates a missing parameter error.
    #[must_use]
    pub fn missing(action: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingParam {
            action: action.into(),
            param: param.into(),
        }
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid(
        action: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            action: action.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Errors from the collection and buffer store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A batch size of zero would never drain a buffer.
    #[error("Buffer '{buffer}': batch size must be at least 1")]
    InvalidBatchSize {
        /// The buffer name.
        buffer: String,
    },
}

/// Errors from parsing a template expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The expression (or one alternative of it) is empty.
    #[error("empty expression")]
    EmptyExpression,

    /// A quoted literal was not closed.
    #[error("unterminated string literal in '{0}'")]
    UnterminatedQuote(String),

    /// The path does not start with a known namespace.
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),

    /// The path has an empty or malformed segment.
    #[error("invalid path '{0}'")]
    InvalidPath(String),
}

/// Errors from parsing a `when` condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The condition (or one operand of it) is empty.
    #[error("empty condition")]
    Empty,

    /// A `.length` comparison used an unsupported operator.
    #[error("unsupported comparison operator '{0}'")]
    UnknownOperator(String),

    /// A `.length` comparison did not have an integer right-hand side.
    #[error("invalid length comparison '{0}'")]
    InvalidComparison(String),

    /// The path could not be parsed.
    #[error("{0}")]
    Path(#[from] TemplateError),
}
