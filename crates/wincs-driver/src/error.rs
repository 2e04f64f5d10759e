//! Driver error types.

use thiserror::Error;

use crate::request::CommandRequest;

/// Result type returned by driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Status returned synchronously by driver operations.
///
/// Caller misuse (`InvalidArg`, `InvalidContext`, `NotOpen`) is never worth
/// retrying. `Busy` and `RetryRequest` mean the same call may succeed later.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverError {
    /// The driver instance has not been opened.
    #[error("driver not open")]
    NotOpen,

    /// An argument was out of range or inconsistent.
    #[error("invalid argument")]
    InvalidArg,

    /// The request could not be built or handed to the transport, or the
    /// operation is not allowed in the current state.
    #[error("request error")]
    RequestError,

    /// The feature already has an operation outstanding.
    #[error("operation already in progress")]
    Busy,

    /// The resource is temporarily unavailable; try again later.
    #[error("retry request")]
    RetryRequest,

    /// A scan is still running.
    #[error("scan in progress")]
    ScanInProgress,

    /// No further scan results.
    #[error("end of scan results")]
    BssFindEnd,

    /// The scan cursor does not point at a result.
    #[error("no scan result available")]
    NoBssInfo,

    /// A BSS, auth or pool context is invalid.
    #[error("invalid context")]
    InvalidContext,

    /// The association is not connected.
    #[error("not connected")]
    NotConnected,

    /// The operation is not supported in this mode.
    #[error("operation not supported")]
    OperationNotSupported,
}

/// Errors from building a command request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestBuildError {
    /// All command slots of the request are used.
    #[error("request full: capacity {capacity} commands")]
    CommandsFull {
        /// Number of commands the request was created for.
        capacity: usize,
    },

    /// The command's variable-length data exceeds the remaining extra space.
    #[error("extra data exhausted: need {needed} bytes, {available} available")]
    ExtraExhausted {
        /// Bytes the command needs.
        needed: usize,
        /// Bytes still available.
        available: usize,
    },
}

impl From<RequestBuildError> for DriverError {
    fn from(_: RequestBuildError) -> Self {
        DriverError::RequestError
    }
}

/// Errors from the byte transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer end has gone away.
    #[error("transport closed")]
    Closed,

    /// Frame could not be encoded.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] wincs_protocol::ProtocolError),

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a submit was refused.
#[derive(Error, Debug)]
pub enum SubmitFailure {
    /// The driver was closed after the request was built.
    #[error("driver is not open")]
    NotOpen,

    /// The request holds no commands.
    #[error("request is empty")]
    Empty,

    /// The engine has no room for another in-flight request.
    #[error("too many requests in flight")]
    TooManyInFlight,

    /// The transport rejected the frames.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A refused submit. The request is handed back and must be discarded.
#[derive(Error, Debug)]
#[error("submit failed: {reason}")]
pub struct SubmitError {
    /// Why the submit failed.
    pub reason: SubmitFailure,
    request: CommandRequest,
}

impl SubmitError {
    pub(crate) fn new(reason: SubmitFailure, request: CommandRequest) -> Self {
        SubmitError { reason, request }
    }

    /// Take the request back for discarding.
    pub fn into_request(self) -> CommandRequest {
        self.request
    }
}

/// Errors loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse failure.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse failure.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
