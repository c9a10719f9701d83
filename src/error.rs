//! Error types exposed by this crate.
//!
//! Recoverable kinds (`CodecError`, `FrameError`, stale terms, back
//! pressure) never escape a poll iteration: they update state and return.
//! Only [`ConfigError`](crate::config::ConfigError) at construction and
//! [`Fatal`] at runtime propagate to the caller.

use anyerror::AnyError;

use crate::types::CorrelationId;

/// A decode or encode failure in the zero-copy ASCII codec.
///
/// Callers drop the offending field or fragment and continue.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum CodecError {
    /// A byte outside `'0'..='9'` where a digit was required.
    #[error("byte {byte:#04x} is not a valid digit @ {index}")]
    BadDigit {
        /// Offset of the offending byte within the window.
        index: usize,
        /// The offending byte.
        byte: u8,
    },

    /// The value does not fit the requested width.
    #[error("cannot write {value} in {width} bytes")]
    Overflow {
        /// The value that was to be encoded.
        value: i64,
        /// The fixed width it had to fit in.
        width: usize,
    },
}

/// A malformed wire frame, on the control stream or the library RPC stream.
///
/// The frame is dropped and logged; decoding failures are never fatal.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown frame type {type_tag:#04x}")]
    UnknownType { type_tag: u8 },

    #[error("unsupported frame version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("frame of {actual} bytes, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("frame truncated at offset {at}, needed {needed} more bytes")]
    Truncated { at: usize, needed: usize },

    #[error("frame string field at offset {at} is not valid UTF-8")]
    BadString { at: usize },

    #[error("frame string field of {length} bytes exceeds the u16 length prefix")]
    StringTooLong { length: usize },
}

/// Why a pending library reply failed to resolve.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum ReplyError {
    /// The engine did not answer within the configured reply timeout.
    #[error("no reply for correlation id {correlation_id} within {timeout_ms}ms")]
    Timeout {
        correlation_id: CorrelationId,
        timeout_ms: u64,
    },

    /// The engine answered with an error frame.
    #[error("gateway error {code}: {message}")]
    Gateway { code: i32, message: String },

    /// The outbound request itself could not be encoded.
    #[error("request frame could not be encoded: {0}")]
    Unencodable(FrameError),

    /// Every configured engine channel was exhausted without a connection.
    #[error("unable to connect to any of the configured engines")]
    UnableToConnect,
}

/// Unrecoverable error that shuts the node or library down at once.
#[derive(Debug, thiserror::Error)]
pub enum Fatal {
    /// The underlying transport is gone.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(AnyError),
}
