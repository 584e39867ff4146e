// Error types for the Gantry dispatch core

use crate::status::HttpStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad mount configuration: duplicate name, invalid path pattern.
    /// Fatal at startup; never produced at request time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No mounted resource's path matches the request path.
    #[error("no resource mounted at {0}")]
    NotFound(String),

    /// A mounted resource's path matches but its method set excludes the
    /// request method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Argument binding failed: missing required parameter, unknown
    /// resource method, or a mixed positional/keyword argument set.
    #[error("bind error: {0}")]
    Bind(String),

    /// URL generation produced a path that does not re-match its own
    /// pattern. Programmer error; propagated to the caller rather than
    /// converted to a response.
    #[error("path format error: {0}")]
    PathFormat(String),

    /// A chain stage violated the handler contract.
    #[error("handler contract violation: {0}")]
    HandlerContract(String),

    /// Short-circuit the request with a specific status and detail.
    #[error("{detail}")]
    Abort { status: u16, detail: String },

    /// Short-circuit the request with a redirect.
    #[error("redirect to {location}")]
    Redirect { status: u16, location: String },

    /// One or more finished callbacks failed after the response was
    /// produced.
    #[error("finished callbacks failed: {}", .0.join("; "))]
    FinishedCallbacks(Vec<String>),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor mirroring `request.abort(status, detail)`.
    pub fn abort(status: u16, detail: impl Into<String>) -> Self {
        Error::Abort {
            status,
            detail: detail.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed.code(),
            Error::Bind(_) => HttpStatus::BadRequest.code(),
            Error::Abort { status, .. } => *status,
            Error::Redirect { status, .. } => *status,
            Error::Configuration(_)
            | Error::PathFormat(_)
            | Error::HandlerContract(_)
            | Error::FinishedCallbacks(_)
            | Error::Serialization(_)
            | Error::Internal(_)
            | Error::Io(_) => HttpStatus::InternalServerError.code(),
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }
}
