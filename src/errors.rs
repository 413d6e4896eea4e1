//! Error types for request generation.
//!
//! Two families of errors exist and they are handled very differently:
//!
//! - [`ConfigurationError`] is raised while the requester is being built
//!   (bad template file, unreadable dataset, broken plugin). It is fatal and
//!   the run never starts.
//! - [`IterationError`] is raised while a single request is being sent. It is
//!   caught at the per-iteration boundary and never reaches the scheduler as
//!   an `Err`.
//!
//! Iteration errors carry an [`ErrorCategory`] so a statistics collaborator
//! can break failures down without the core acting on the distinction.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Startup-time failures. Any of these aborts the run before iteration 0.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid value for {name}: '{value}'. {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid HTTP method: '{0}'")]
    InvalidMethod(String),

    #[error("URL template cannot be empty")]
    EmptyUrlTemplate,

    #[error("Failed to read {kind} file '{path}': {source}")]
    FileRead {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV data has no header row")]
    NoHeaders,

    #[error("CSV data has no data rows")]
    EmptyData,

    #[error("CSV row {row} has {found} columns, expected {expected}")]
    InconsistentColumns {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid template line {line}: '{content}'. Expected 'Name: value'")]
    MalformedTemplateLine { line: usize, content: String },

    #[error("Invalid header name '{0}' in template")]
    InvalidHeaderName(String),

    #[error("Failed to parse YAML template: {0}")]
    TemplateYaml(#[from] serde_yaml::Error),

    #[error("Failed to load plugin '{path}': {source}")]
    PluginLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Plugin '{path}' was built for {found}, this build is {expected}")]
    PluginIncompatible {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Plugin '{path}' registered {count} value providers, expected exactly one")]
    PluginProviderCount { path: PathBuf, count: usize },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Coarse classification of a failed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// DNS, connection refused, reset, body read failures
    NetworkError,

    /// Request or connect timeout
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// The descriptor could not be turned into a wire request
    RequestError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return ErrorCategory::TimeoutError;
        }
        if error.is_builder() {
            return ErrorCategory::RequestError;
        }

        // TLS failures surface as connect errors, so the message is checked first.
        let error_msg = format!("{:?}", error).to_lowercase();
        if error_msg.contains("certificate") || error_msg.contains("tls") {
            ErrorCategory::TlsError
        } else if error.is_connect() || error.is_request() || error.is_body() || error.is_decode()
        {
            ErrorCategory::NetworkError
        } else {
            ErrorCategory::OtherError
        }
    }

    /// Stable label, suitable for metrics keys.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::RequestError => "request_error",
            ErrorCategory::OtherError => "other_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single iteration. Never propagated past the dispatcher.
#[derive(Error, Debug)]
pub enum IterationError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("{0}")]
    Runtime(String),
}

impl IterationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IterationError::Transport(e) => ErrorCategory::from_reqwest_error(e),
            IterationError::InvalidUrl { .. } | IterationError::InvalidHeader { .. } => {
                ErrorCategory::RequestError
            }
            IterationError::Runtime(_) => ErrorCategory::OtherError,
        }
    }
}
