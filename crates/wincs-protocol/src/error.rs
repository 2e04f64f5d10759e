//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with the coprocessor protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame is too long.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Unknown message kind byte.
    #[error("unknown message kind: 0x{0:02X}")]
    UnknownMessageKind(u8),

    /// Unknown parameter type tag.
    #[error("unknown parameter type: {0}")]
    UnknownParamType(u8),

    /// A parameter value has a length its type does not allow.
    #[error("invalid length {len} for parameter type {type_tag}")]
    InvalidParamLength {
        /// Type tag of the element.
        type_tag: u8,
        /// Length found on the wire.
        len: usize,
    },

    /// A parameter was read as a type it does not hold.
    #[error("parameter type mismatch: expected {expected}, found {found}")]
    ParamTypeMismatch {
        /// Type the reader asked for.
        expected: &'static str,
        /// Type the element carries.
        found: &'static str,
    },

    /// Too many parameter elements in one message.
    #[error("too many parameters: maximum {max}, got {actual}")]
    TooManyParams {
        /// Maximum supported.
        max: usize,
        /// Number found.
        actual: usize,
    },

    /// A message carries the wrong number of parameters.
    #[error("wrong parameter count: expected {expected}, got {actual}")]
    ParamCount {
        /// Count the message kind requires.
        expected: usize,
        /// Count received.
        actual: usize,
    },

    /// Invalid data in frame.
    #[error("invalid frame data: {0}")]
    InvalidData(String),

    /// UTF-8 decoding error.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// Status codes returned by the device for each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Command executed.
    Ok,
    /// Generic failure.
    Error,
    /// Command id is not supported.
    UnsupportedCommand,
    /// A parameter was out of range or malformed.
    InvalidParameter,
    /// Wrong number of parameters.
    WrongParamCount,
    /// Device is busy with a conflicting operation.
    Busy,
    /// Operation not permitted in the current state.
    InvalidState,
    /// Device ran out of resources.
    NoResources,
    /// Unknown status code.
    Unknown(u16),
}

impl DeviceStatus {
    /// Whether the device accepted the command.
    pub fn is_ok(&self) -> bool {
        matches!(self, DeviceStatus::Ok)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Ok => write!(f, "ok"),
            DeviceStatus::Error => write!(f, "error"),
            DeviceStatus::UnsupportedCommand => write!(f, "unsupported command"),
            DeviceStatus::InvalidParameter => write!(f, "invalid parameter"),
            DeviceStatus::WrongParamCount => write!(f, "wrong parameter count"),
            DeviceStatus::Busy => write!(f, "busy"),
            DeviceStatus::InvalidState => write!(f, "invalid state"),
            DeviceStatus::NoResources => write!(f, "no resources"),
            DeviceStatus::Unknown(code) => write!(f, "unknown status (0x{:04X})", code),
        }
    }
}

impl From<u16> for DeviceStatus {
    fn from(code: u16) -> Self {
        match code {
            0 => DeviceStatus::Ok,
            1 => DeviceStatus::Error,
            2 => DeviceStatus::UnsupportedCommand,
            3 => DeviceStatus::InvalidParameter,
            4 => DeviceStatus::WrongParamCount,
            5 => DeviceStatus::Busy,
            6 => DeviceStatus::InvalidState,
            7 => DeviceStatus::NoResources,
            _ => DeviceStatus::Unknown(code),
        }
    }
}

impl From<DeviceStatus> for u16 {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Ok => 0,
            DeviceStatus::Error => 1,
            DeviceStatus::UnsupportedCommand => 2,
            DeviceStatus::InvalidParameter => 3,
            DeviceStatus::WrongParamCount => 4,
            DeviceStatus::Busy => 5,
            DeviceStatus::InvalidState => 6,
            DeviceStatus::NoResources => 7,
            DeviceStatus::Unknown(code) => code,
        }
    }
}
