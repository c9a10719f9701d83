//! Library ⇄ engine RPC wire schema.
//!
//! Frames share the 4-byte header of the control stream (`type:u8`,
//! `version:u8`, `reserved:u16`) followed by little-endian fields; strings
//! are a `u16` length prefix and UTF-8 bytes. Every reply echoes the
//! `correlation_id` of the request that caused it.

use crate::error::FrameError;
use crate::types::CorrelationId;
use crate::types::LibraryId;
use crate::types::Position;

pub(crate) const PROTOCOL_VERSION: u8 = 1;

const HEADER_LENGTH: usize = 4;

const LIBRARY_CONNECT: u8 = 0x01;
const INITIATE_CONNECTION: u8 = 0x02;
const RELEASE_SESSION: u8 = 0x03;
const REQUEST_SESSION: u8 = 0x04;
const MANAGE_CONNECTION: u8 = 0x05;
const LOGON: u8 = 0x06;
const DISCONNECT: u8 = 0x07;
const ERROR: u8 = 0x08;
const APPLICATION_HEARTBEAT: u8 = 0x09;
const REQUEST_SESSION_REPLY: u8 = 0x0a;
const RELEASE_SESSION_REPLY: u8 = 0x0b;
const CATCHUP: u8 = 0x0c;
const NEW_SENT_POSITION: u8 = 0x0d;
const NOT_LEADER: u8 = 0x0e;

/// Messages from the engine addressed to every library.
pub const GATEWAY_LIBRARY_ID: LibraryId = 0;

/// Engine error codes carried by [`LibraryMessage::Error`].
pub mod gateway_error {
    pub const UNABLE_TO_CONNECT: i32 = 1;
    pub const DUPLICATE_SESSION: i32 = 2;
    pub const UNKNOWN_SESSION: i32 = 3;
    pub const UNKNOWN_LIBRARY: i32 = 4;
}

/// Outcome of a release or request-session round trip.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum SessionReplyStatus {
    Ok,
    UnknownSession,
    OtherSessionOwner,
    SessionNotLoggedOn,
    Other(i32),
}

impl SessionReplyStatus {
    pub fn to_i32(self) -> i32 {
        match self {
            SessionReplyStatus::Ok => 0,
            SessionReplyStatus::UnknownSession => 1,
            SessionReplyStatus::OtherSessionOwner => 2,
            SessionReplyStatus::SessionNotLoggedOn => 3,
            SessionReplyStatus::Other(code) => code,
        }
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => SessionReplyStatus::Ok,
            1 => SessionReplyStatus::UnknownSession,
            2 => SessionReplyStatus::OtherSessionOwner,
            3 => SessionReplyStatus::SessionNotLoggedOn,
            other => SessionReplyStatus::Other(other),
        }
    }
}

/// How a logon frame relates to the receiving library.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum LogonStatus {
    /// A session this library just acquired.
    New,
    /// A session that exists elsewhere in the gateway.
    LibraryNotification,
}

impl LogonStatus {
    fn to_u8(self) -> u8 {
        match self {
            LogonStatus::New => 0,
            LogonStatus::LibraryNotification => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        if value == 0 {
            LogonStatus::New
        } else {
            LogonStatus::LibraryNotification
        }
    }
}

/// A decoded library ⇄ engine RPC frame.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub enum LibraryMessage {
    LibraryConnect {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        unique_value: i32,
    },
    InitiateConnection {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        port: i32,
        host: String,
        sender_comp_id: String,
        target_comp_id: String,
    },
    ReleaseSession {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        connection_id: i64,
    },
    RequestSession {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        session_id: i64,
        last_received_sequence_number: i32,
    },
    ManageConnection {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        connection_id: i64,
        session_id: i64,
    },
    Logon {
        library_id: LibraryId,
        connection_id: i64,
        session_id: i64,
        status: LogonStatus,
        sender_comp_id: String,
        target_comp_id: String,
    },
    Disconnect {
        library_id: LibraryId,
        connection_id: i64,
        reason: i32,
    },
    Error {
        library_id: LibraryId,
        correlation_id: CorrelationId,
        code: i32,
        message: String,
    },
    ApplicationHeartbeat {
        library_id: LibraryId,
    },
    RequestSessionReply {
        correlation_id: CorrelationId,
        status: SessionReplyStatus,
    },
    ReleaseSessionReply {
        correlation_id: CorrelationId,
        status: SessionReplyStatus,
    },
    Catchup {
        library_id: LibraryId,
        connection_id: i64,
        message_count: i32,
    },
    NewSentPosition {
        library_id: LibraryId,
        position: Position,
    },
    NotLeader {
        library_id: LibraryId,
        /// The leader's channel; empty when the engine does not know one.
        channel: String,
    },
}

impl LibraryMessage {
    /// Encode into `dst`.
    ///
    /// Fails when a string field does not fit the `u16` length prefix; `dst`
    /// then holds a partial frame that must not be offered.
    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<(), FrameError> {
        dst.clear();
        let mut w = FrameWriter { dst };
        match self {
            LibraryMessage::LibraryConnect {
                library_id,
                correlation_id,
                unique_value,
            } => {
                w.header(LIBRARY_CONNECT);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i32(*unique_value);
            }
            LibraryMessage::InitiateConnection {
                library_id,
                correlation_id,
                port,
                host,
                sender_comp_id,
                target_comp_id,
            } => {
                w.header(INITIATE_CONNECTION);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i32(*port);
                w.string(host)?;
                w.string(sender_comp_id)?;
                w.string(target_comp_id)?;
            }
            LibraryMessage::ReleaseSession {
                library_id,
                correlation_id,
                connection_id,
            } => {
                w.header(RELEASE_SESSION);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i64(*connection_id);
            }
            LibraryMessage::RequestSession {
                library_id,
                correlation_id,
                session_id,
                last_received_sequence_number,
            } => {
                w.header(REQUEST_SESSION);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i64(*session_id);
                w.i32(*last_received_sequence_number);
            }
            LibraryMessage::ManageConnection {
                library_id,
                correlation_id,
                connection_id,
                session_id,
            } => {
                w.header(MANAGE_CONNECTION);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i64(*connection_id);
                w.i64(*session_id);
            }
            LibraryMessage::Logon {
                library_id,
                connection_id,
                session_id,
                status,
                sender_comp_id,
                target_comp_id,
            } => {
                w.header(LOGON);
                w.i32(*library_id);
                w.i64(*connection_id);
                w.i64(*session_id);
                w.u8(status.to_u8());
                w.string(sender_comp_id)?;
                w.string(target_comp_id)?;
            }
            LibraryMessage::Disconnect {
                library_id,
                connection_id,
                reason,
            } => {
                w.header(DISCONNECT);
                w.i32(*library_id);
                w.i64(*connection_id);
                w.i32(*reason);
            }
            LibraryMessage::Error {
                library_id,
                correlation_id,
                code,
                message,
            } => {
                w.header(ERROR);
                w.i32(*library_id);
                w.i64(*correlation_id);
                w.i32(*code);
                w.string(message)?;
            }
            LibraryMessage::ApplicationHeartbeat { library_id } => {
                w.header(APPLICATION_HEARTBEAT);
                w.i32(*library_id);
            }
            LibraryMessage::RequestSessionReply {
                correlation_id,
                status,
            } => {
                w.header(REQUEST_SESSION_REPLY);
                w.i64(*correlation_id);
                w.i32(status.to_i32());
            }
            LibraryMessage::ReleaseSessionReply {
                correlation_id,
                status,
            } => {
                w.header(RELEASE_SESSION_REPLY);
                w.i64(*correlation_id);
                w.i32(status.to_i32());
            }
            LibraryMessage::Catchup {
                library_id,
                connection_id,
                message_count,
            } => {
                w.header(CATCHUP);
                w.i32(*library_id);
                w.i64(*connection_id);
                w.i32(*message_count);
            }
            LibraryMessage::NewSentPosition {
                library_id,
                position,
            } => {
                w.header(NEW_SENT_POSITION);
                w.i32(*library_id);
                w.i64(*position);
            }
            LibraryMessage::NotLeader {
                library_id,
                channel,
            } => {
                w.header(NOT_LEADER);
                w.i32(*library_id);
                w.string(channel)?;
            }
        }
        Ok(())
    }

    pub fn decode(frame: &[u8]) -> Result<LibraryMessage, FrameError> {
        if frame.len() < HEADER_LENGTH {
            return Err(FrameError::WrongLength {
                expected: HEADER_LENGTH,
                actual: frame.len(),
            });
        }

        let type_tag = frame[0];
        let version = frame[1];
        if version != PROTOCOL_VERSION {
            return Err(FrameError::UnsupportedVersion { version });
        }

        let mut r = FrameReader {
            src: frame,
            at: HEADER_LENGTH,
        };
        let message = match type_tag {
            LIBRARY_CONNECT => LibraryMessage::LibraryConnect {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                unique_value: r.i32()?,
            },
            INITIATE_CONNECTION => LibraryMessage::InitiateConnection {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                port: r.i32()?,
                host: r.string()?,
                sender_comp_id: r.string()?,
                target_comp_id: r.string()?,
            },
            RELEASE_SESSION => LibraryMessage::ReleaseSession {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                connection_id: r.i64()?,
            },
            REQUEST_SESSION => LibraryMessage::RequestSession {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                session_id: r.i64()?,
                last_received_sequence_number: r.i32()?,
            },
            MANAGE_CONNECTION => LibraryMessage::ManageConnection {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                connection_id: r.i64()?,
                session_id: r.i64()?,
            },
            LOGON => LibraryMessage::Logon {
                library_id: r.i32()?,
                connection_id: r.i64()?,
                session_id: r.i64()?,
                status: LogonStatus::from_u8(r.u8()?),
                sender_comp_id: r.string()?,
                target_comp_id: r.string()?,
            },
            DISCONNECT => LibraryMessage::Disconnect {
                library_id: r.i32()?,
                connection_id: r.i64()?,
                reason: r.i32()?,
            },
            ERROR => LibraryMessage::Error {
                library_id: r.i32()?,
                correlation_id: r.i64()?,
                code: r.i32()?,
                message: r.string()?,
            },
            APPLICATION_HEARTBEAT => LibraryMessage::ApplicationHeartbeat {
                library_id: r.i32()?,
            },
            REQUEST_SESSION_REPLY => LibraryMessage::RequestSessionReply {
                correlation_id: r.i64()?,
                status: SessionReplyStatus::from_i32(r.i32()?),
            },
            RELEASE_SESSION_REPLY => LibraryMessage::ReleaseSessionReply {
                correlation_id: r.i64()?,
                status: SessionReplyStatus::from_i32(r.i32()?),
            },
            CATCHUP => LibraryMessage::Catchup {
                library_id: r.i32()?,
                connection_id: r.i64()?,
                message_count: r.i32()?,
            },
            NEW_SENT_POSITION => LibraryMessage::NewSentPosition {
                library_id: r.i32()?,
                position: r.i64()?,
            },
            NOT_LEADER => LibraryMessage::NotLeader {
                library_id: r.i32()?,
                channel: r.string()?,
            },
            _ => return Err(FrameError::UnknownType { type_tag }),
        };
        Ok(message)
    }
}

struct FrameWriter<'a> {
    dst: &'a mut Vec<u8>,
}

impl FrameWriter<'_> {
    fn header(&mut self, type_tag: u8) {
        self.dst.push(type_tag);
        self.dst.push(PROTOCOL_VERSION);
        self.dst.extend_from_slice(&0u16.to_le_bytes());
    }

    fn u8(&mut self, value: u8) {
        self.dst.push(value);
    }

    fn i32(&mut self, value: i32) {
        self.dst.extend_from_slice(&value.to_le_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.dst.extend_from_slice(&value.to_le_bytes());
    }

    fn string(&mut self, value: &str) -> Result<(), FrameError> {
        let length = value.len();
        if length > usize::from(u16::MAX) {
            return Err(FrameError::StringTooLong { length });
        }
        self.dst.extend_from_slice(&(length as u16).to_le_bytes());
        self.dst.extend_from_slice(value.as_bytes());
        Ok(())
    }
}

struct FrameReader<'a> {
    src: &'a [u8],
    at: usize,
}

impl FrameReader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], FrameError> {
        if self.at + n > self.src.len() {
            return Err(FrameError::Truncated {
                at: self.at,
                needed: self.at + n - self.src.len(),
            });
        }
        let bytes = &self.src[self.at..self.at + n];
        self.at += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, FrameError> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(bytes))
    }

    fn i64(&mut self) -> Result<i64, FrameError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(bytes))
    }

    fn string(&mut self) -> Result<String, FrameError> {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(self.take(2)?);
        let length = usize::from(u16::from_le_bytes(bytes));

        let at = self.at;
        let raw = self.take(length)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| FrameError::BadString { at })
    }
}
