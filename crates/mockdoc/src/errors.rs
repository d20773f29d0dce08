use thiserror::Error;

use mockdoc_wire::ServiceStatus;

/// Reportable matching failure.
///
/// Both variants are ordinary error outcomes for the caller: a production
/// client may legitimately call a method the test never scripted, and the
/// test should see a catchable failure, not a crash. Harness misuse (wrong
/// scripted reply shape for an operation) is a panic instead and never
/// appears here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no expectations registered for method {method}")]
    MethodNotRegistered { method: String },
    #[error("no registered expectation matches {method} request\ngot:\n{got}\nwant one of:\n{tried}")]
    NoMatchingExpectation {
        method: String,
        got: String,
        tried: String,
    },
}

impl MatchError {
    /// Wire rendering of this failure.
    ///
    /// An un-mocked method looks like an unimplemented RPC to the client;
    /// a request no expectation matches is reported as an internal error
    /// carrying the full rendering of both compared sides.
    pub fn to_status(&self) -> ServiceStatus {
        match self {
            Self::MethodNotRegistered { .. } => ServiceStatus::unimplemented(self.to_string()),
            Self::NoMatchingExpectation { .. } => ServiceStatus::internal(self.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("failed to bind loopback listener: {0}")]
    Bind(String),
    #[error("i/o error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection closed before a terminal frame")]
    ConnectionClosed,
    #[error("codec error: {0}")]
    Codec(String),
    #[error("unexpected frame for call {id}: {frame}")]
    UnexpectedFrame { id: u64, frame: String },
    #[error(transparent)]
    Status(#[from] ServiceStatus),
}
