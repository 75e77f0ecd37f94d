use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error kind that represents failures reported by the [`crate::Client`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required builder option was missing or had an invalid value.
    Configuration = 1000,
    /// Initialization of the internal [`reqwest::Client`] failed.
    HttpClientInitFailure = 1001,
    /// The credentials were rejected, or the validation request failed.
    Validation = 1100,
    /// Live updates were requested before the credentials were validated.
    Unauthorized = 1101,
    /// The bulk fetch of feature flags failed on the transport level.
    Initialization = 1200,
    /// The server's response does not have the expected shape.
    Protocol = 1201,
    /// The requested feature flag is not present in the local cache.
    NotFound = 2000,
    /// The live update channel reported a failure.
    Channel = 3000,
}

impl ErrorKind {
    pub(crate) fn as_u16(&self) -> u16 {
        *self as u16
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => f.write_str("ConfigurationError"),
            ErrorKind::HttpClientInitFailure => f.write_str("HttpClientInitFailure"),
            ErrorKind::Validation => f.write_str("ValidationError"),
            ErrorKind::Unauthorized => f.write_str("UnauthorizedError"),
            ErrorKind::Initialization => f.write_str("InitializationError"),
            ErrorKind::Protocol => f.write_str("ProtocolError"),
            ErrorKind::NotFound => f.write_str("NotFoundError"),
            ErrorKind::Channel => f.write_str("ChannelError"),
        }
    }
}

/// Error struct that holds the [`ErrorKind`] and message of the reported failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientError {
    /// Error kind that represents failures reported by the [`crate::Client`].
    pub kind: ErrorKind,
    /// The text representation of the failure, including its underlying cause.
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self { message, kind }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl Error for ClientError {}
