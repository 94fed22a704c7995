//! # Error Handling
//!
//! Error types for the flowgate control plane, built on `thiserror`.
//!
//! The taxonomy separates failures by the boundary responsible for them:
//! malformed API documents are reported to the uploader, compiler defects skip
//! the offending API, stream failures stay inside one discovery session, and
//! bootstrap failures terminate the process.

pub mod upstream;

pub use upstream::UpstreamFailure;

/// Custom result type for flowgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flowgate control plane
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed specification document or vendor extension value
    #[error("Input format error: {message}")]
    InputFormat { message: String, field: Option<String> },

    /// Internal compiler defect for one API, e.g. a resource that yields no route
    #[error("Compilation invariant violated for API '{api}': {message}")]
    CompilationInvariant { api: String, message: String },

    /// Failure on a single subscriber stream
    #[error("Distribution transport error for label '{label}': {message}")]
    DistributionTransport { label: String, message: String },

    /// Missing or unreadable configuration at startup
    #[error("Bootstrap error: {message}")]
    Bootstrap {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors (gRPC, HTTP)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Resource already exists
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an input format error
    pub fn input_format<S: Into<String>>(message: S) -> Self {
        Self::InputFormat { message: message.into(), field: None }
    }

    /// Create an input format error pointing at a document field
    pub fn input_format_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::InputFormat { message: message.into(), field: Some(field.into()) }
    }

    /// Create a compilation invariant error for the given API
    pub fn compilation<A: Into<String>, S: Into<String>>(api: A, message: S) -> Self {
        Self::CompilationInvariant { api: api.into(), message: message.into() }
    }

    /// Create a distribution transport error for the given label
    pub fn distribution<L: Into<String>, S: Into<String>>(label: L, message: S) -> Self {
        Self::DistributionTransport { label: label.into(), message: message.into() }
    }

    /// Create a bootstrap error
    pub fn bootstrap<S: Into<String>>(message: S) -> Self {
        Self::Bootstrap { message: message.into(), source: None }
    }

    /// Create a bootstrap error with source
    pub fn bootstrap_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Bootstrap { message: message.into(), source: Some(source) }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error was caused by the caller's input rather than the control plane
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputFormat { .. } | Self::Conflict(_) | Self::NotFound(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::bootstrap_with_source(format!("failed to load configuration: {}", err), Box::new(err))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::bootstrap(format!("invalid configuration: {}", err))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::input_format(format!("invalid API bundle archive: {}", err))
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Self::config(format!("file watch error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::input_format_field("labels must be strings", "x-gateway-labels");
        assert!(matches!(
            err,
            Error::InputFormat { ref field, .. } if field.as_deref() == Some("x-gateway-labels")
        ));
        assert_eq!(err.to_string(), "Input format error: labels must be strings");

        let err = Error::compilation("pets:v1", "resource produced no route");
        assert_eq!(
            err.to_string(),
            "Compilation invariant violated for API 'pets:v1': resource produced no route"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::input_format("bad").is_client_error());
        assert!(Error::conflict("exists").is_client_error());
        assert!(Error::not_found("missing").is_client_error());
        assert!(!Error::internal("boom").is_client_error());
        assert!(!Error::distribution("default", "reset").is_client_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_bootstrap_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "flowgate.toml");
        let err = Error::bootstrap_with_source("configuration file missing", Box::new(io));
        assert!(err.source().is_some());
    }
}
