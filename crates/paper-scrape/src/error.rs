//! Error types for paper-scrape.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

/// Errors from the network transport layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The request URL could not be built or rewritten.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// Offending URL text
        url: String,
    },

    /// Header name or value rejected by the HTTP stack.
    #[error("Invalid header {name}")]
    InvalidHeader {
        /// Header name
        name: String,
    },

    /// Resource not found (404 response)
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// 2xx response carrying no body.
    #[error("Empty response body from {url}")]
    EmptyBody {
        /// Requested URL
        url: String,
    },
}

impl ClientError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Create an invalid URL error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Create an empty body error.
    #[must_use]
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// HTTP status attached to this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Server { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced by the scraping pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Both the primary and the mirror fetch failed; carries the mirror's error.
    #[error("Network error: {0}")]
    Network(#[from] ClientError),

    /// A source provided by an extension failed.
    #[error("Extension source {id} failed: {message}")]
    Extension {
        /// Extension id
        id: String,
        /// Failure description
        message: String,
    },
}

impl ScrapeError {
    /// Create an extension failure.
    #[must_use]
    pub fn extension(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extension { id: id.into(), message: message.into() }
    }

    /// Returns true if this error came from the network layer.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Errors from the extension lifecycle manager.
#[derive(thiserror::Error, Debug)]
pub enum ExtensionError {
    /// The loader could not resolve or load a package.
    #[error("Failed to install extension {source_id}: {message}")]
    Install {
        /// Local path or package identifier
        source_id: String,
        /// Failure description
        message: String,
    },

    /// No extension with this id is installed.
    #[error("Extension not installed: {0}")]
    NotInstalled(String),

    /// The instance returned by `initialize()` has unusable metadata.
    #[error("Invalid metadata for {package}: {message}")]
    InvalidMetadata {
        /// Package name
        package: String,
        /// What is wrong
        message: String,
    },

    /// The extension does not expose the requested method.
    #[error("Extension {id} has no method {method}")]
    MethodNotFound {
        /// Extension id
        id: String,
        /// Method name
        method: String,
    },

    /// The extension method ran and failed.
    #[error("Extension {id} method {method} failed: {message}")]
    MethodFailed {
        /// Extension id
        id: String,
        /// Method name
        method: String,
        /// Failure description
        message: String,
    },

    /// Filesystem failure while reading manifests or relinking artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest parsing failure
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl ExtensionError {
    /// Create an install error.
    #[must_use]
    pub fn install(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Install { source_id: source_id.into(), message: message.into() }
    }

    /// Create an invalid metadata error.
    #[must_use]
    pub fn invalid_metadata(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMetadata { package: package.into(), message: message.into() }
    }

    /// Create a method failure error.
    #[must_use]
    pub fn method_failed(
        id: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MethodFailed { id: id.into(), method: method.into(), message: message.into() }
    }
}

/// Result type alias for transport operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for scraping operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Result type alias for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;
