//! Error taxonomy for the conversion pipeline.
//!
//! Every failure a request can hit is funnelled into [`Error`], which carries
//! enough context for the HTTP layer to derive a status code via
//! [`Error::http_status`] and a stable machine-readable [`Error::code`].

/// Common error type for audioforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The upload's declared content type is not the supported input type.
    #[error("Unsupported media type: {declared} (only {accepted} is accepted)")]
    UnsupportedMediaType {
        /// The content type the client declared.
        declared: String,
        /// The single content type the service accepts.
        accepted: String,
    },

    /// The daily conversion limit has been reached.
    #[error("You've hit {limit} free conversions today. Please try again tomorrow.")]
    QuotaExceeded {
        /// The configured daily limit.
        limit: u32,
    },

    /// The transcoder reported a failure.
    ///
    /// The message is deliberately generic; engine diagnostics are logged at
    /// the point of failure and never travel with this variant.
    #[error("Conversion failed. Try again later.")]
    ConversionFailed,

    /// The requested artifact does not exist (never produced, or expired).
    #[error("File not found: {0}")]
    ArtifactNotFound(String),

    /// Durable storage could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The request was malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new UnsupportedMediaType error.
    pub fn unsupported_media_type<D: Into<String>, A: Into<String>>(declared: D, accepted: A) -> Self {
        Self::UnsupportedMediaType {
            declared: declared.into(),
            accepted: accepted.into(),
        }
    }

    /// Create a new ArtifactNotFound error.
    pub fn artifact_not_found<S: Into<String>>(name: S) -> Self {
        Self::ArtifactNotFound(name.into())
    }

    /// Create a new Persistence error.
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedMediaType { .. } => 415,
            Error::QuotaExceeded { .. } => 403,
            Error::ConversionFailed => 500,
            Error::ArtifactNotFound(_) => 404,
            Error::Persistence(_) => 500,
            Error::InvalidInput(_) => 400,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable error code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedMediaType { .. } => "unsupported_media_type",
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::ConversionFailed => "conversion_failed",
            Error::ArtifactNotFound(_) => "artifact_not_found",
            Error::Persistence(_) => "persistence_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to API clients.
    ///
    /// Server-side failures collapse to a generic sentence so that paths and
    /// OS error text stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::Persistence(_) | Error::Io(_) | Error::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
