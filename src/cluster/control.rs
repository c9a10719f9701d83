//! Wire schema of the cluster control stream.
//!
//! Every frame is a 4-byte header (`type:u8`, `version:u8`, `reserved:u16`)
//! followed by fixed-width little-endian fields. Decoding validates the type
//! tag, the version and the exact frame length; a failure drops the frame and
//! is never fatal to a role.

use crate::error::FrameError;
use crate::transport::Action;
use crate::transport::FragmentHandler;
use crate::transport::FragmentMeta;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;
use crate::types::Term;

use super::RoleContext;
use super::Transition;

pub(crate) const CONTROL_VERSION: u8 = 1;

const HEADER_LENGTH: usize = 4;

const REQUEST_VOTE: u8 = 0x01;
const REPLY_VOTE: u8 = 0x02;
const HEARTBEAT: u8 = 0x03;
const ACKNOWLEDGEMENT: u8 = 0x04;
const RESEND: u8 = 0x05;

const REQUEST_VOTE_LENGTH: usize = HEADER_LENGTH + 4 + 2 + 8;
const REPLY_VOTE_LENGTH: usize = HEADER_LENGTH + 4 + 2 + 2 + 1;
const HEARTBEAT_LENGTH: usize = HEADER_LENGTH + 4 + 2 + 4 + 8;
const ACKNOWLEDGEMENT_LENGTH: usize = HEADER_LENGTH + 4 + 2 + 8;
const RESEND_LENGTH: usize = HEADER_LENGTH + 4 + 2 + 8 + 4;

/// A decoded control stream frame.
///
/// Every variant carries the sender's `term` so stale messages can be
/// filtered uniformly.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum ControlMessage {
    RequestVote {
        term: Term,
        candidate_id: NodeId,
        last_position: Position,
    },
    ReplyVote {
        term: Term,
        candidate_id: NodeId,
        voter_id: NodeId,
        granted: bool,
    },
    ConsensusHeartbeat {
        term: Term,
        leader_id: NodeId,
        session_id: SessionId,
        /// The leader's committed position.
        position: Position,
    },
    MessageAcknowledgement {
        term: Term,
        follower_id: NodeId,
        position: Position,
    },
    Resend {
        term: Term,
        leader_id: NodeId,
        start_position: Position,
        length: i32,
    },
}

impl ControlMessage {
    /// Longest encoded frame across all variants.
    pub const MAX_FRAME_LENGTH: usize = HEARTBEAT_LENGTH;

    /// The term carried by this frame.
    pub fn term(&self) -> Term {
        match *self {
            ControlMessage::RequestVote { term, .. } => term,
            ControlMessage::ReplyVote { term, .. } => term,
            ControlMessage::ConsensusHeartbeat { term, .. } => term,
            ControlMessage::MessageAcknowledgement { term, .. } => term,
            ControlMessage::Resend { term, .. } => term,
        }
    }

    /// Encode into `dst`, returning the frame length.
    ///
    /// `dst` must hold at least [`Self::MAX_FRAME_LENGTH`] bytes.
    pub fn encode(&self, dst: &mut [u8]) -> usize {
        let mut writer = Writer { dst, at: 0 };
        match *self {
            ControlMessage::RequestVote {
                term,
                candidate_id,
                last_position,
            } => {
                writer.header(REQUEST_VOTE);
                writer.i32(term);
                writer.i16(candidate_id);
                writer.i64(last_position);
            }
            ControlMessage::ReplyVote {
                term,
                candidate_id,
                voter_id,
                granted,
            } => {
                writer.header(REPLY_VOTE);
                writer.i32(term);
                writer.i16(candidate_id);
                writer.i16(voter_id);
                writer.u8(u8::from(granted));
            }
            ControlMessage::ConsensusHeartbeat {
                term,
                leader_id,
                session_id,
                position,
            } => {
                writer.header(HEARTBEAT);
                writer.i32(term);
                writer.i16(leader_id);
                writer.i32(session_id);
                writer.i64(position);
            }
            ControlMessage::MessageAcknowledgement {
                term,
                follower_id,
                position,
            } => {
                writer.header(ACKNOWLEDGEMENT);
                writer.i32(term);
                writer.i16(follower_id);
                writer.i64(position);
            }
            ControlMessage::Resend {
                term,
                leader_id,
                start_position,
                length,
            } => {
                writer.header(RESEND);
                writer.i32(term);
                writer.i16(leader_id);
                writer.i64(start_position);
                writer.i32(length);
            }
        }
        writer.at
    }

    /// Decode one frame.
    pub fn decode(frame: &[u8]) -> Result<ControlMessage, FrameError> {
        if frame.len() < HEADER_LENGTH {
            return Err(FrameError::WrongLength {
                expected: HEADER_LENGTH,
                actual: frame.len(),
            });
        }

        let type_tag = frame[0];
        let version = frame[1];
        if version != CONTROL_VERSION {
            return Err(FrameError::UnsupportedVersion { version });
        }

        let expected = match type_tag {
            REQUEST_VOTE => REQUEST_VOTE_LENGTH,
            REPLY_VOTE => REPLY_VOTE_LENGTH,
            HEARTBEAT => HEARTBEAT_LENGTH,
            ACKNOWLEDGEMENT => ACKNOWLEDGEMENT_LENGTH,
            RESEND => RESEND_LENGTH,
            _ => return Err(FrameError::UnknownType { type_tag }),
        };
        if frame.len() != expected {
            return Err(FrameError::WrongLength {
                expected,
                actual: frame.len(),
            });
        }

        let mut reader = Reader {
            src: frame,
            at: HEADER_LENGTH,
        };
        let message = match type_tag {
            REQUEST_VOTE => ControlMessage::RequestVote {
                term: reader.i32(),
                candidate_id: reader.i16(),
                last_position: reader.i64(),
            },
            REPLY_VOTE => ControlMessage::ReplyVote {
                term: reader.i32(),
                candidate_id: reader.i16(),
                voter_id: reader.i16(),
                granted: reader.u8() != 0,
            },
            HEARTBEAT => ControlMessage::ConsensusHeartbeat {
                term: reader.i32(),
                leader_id: reader.i16(),
                session_id: reader.i32(),
                position: reader.i64(),
            },
            ACKNOWLEDGEMENT => ControlMessage::MessageAcknowledgement {
                term: reader.i32(),
                follower_id: reader.i16(),
                position: reader.i64(),
            },
            RESEND => ControlMessage::Resend {
                term: reader.i32(),
                leader_id: reader.i16(),
                start_position: reader.i64(),
                length: reader.i32(),
            },
            _ => unreachable!(),
        };
        Ok(message)
    }
}

struct Writer<'a> {
    dst: &'a mut [u8],
    at: usize,
}

impl Writer<'_> {
    fn header(&mut self, type_tag: u8) {
        self.u8(type_tag);
        self.u8(CONTROL_VERSION);
        self.dst[self.at..self.at + 2].copy_from_slice(&0u16.to_le_bytes());
        self.at += 2;
    }

    fn u8(&mut self, value: u8) {
        self.dst[self.at] = value;
        self.at += 1;
    }

    fn i16(&mut self, value: i16) {
        self.dst[self.at..self.at + 2].copy_from_slice(&value.to_le_bytes());
        self.at += 2;
    }

    fn i32(&mut self, value: i32) {
        self.dst[self.at..self.at + 4].copy_from_slice(&value.to_le_bytes());
        self.at += 4;
    }

    fn i64(&mut self, value: i64) {
        self.dst[self.at..self.at + 8].copy_from_slice(&value.to_le_bytes());
        self.at += 8;
    }
}

struct Reader<'a> {
    src: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> u8 {
        let value = self.src[self.at];
        self.at += 1;
        value
    }

    fn i16(&mut self) -> i16 {
        let value = i16::from_le_bytes([self.src[self.at], self.src[self.at + 1]]);
        self.at += 2;
        value
    }

    fn i32(&mut self) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.src[self.at..self.at + 4]);
        self.at += 4;
        i32::from_le_bytes(bytes)
    }

    fn i64(&mut self) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.src[self.at..self.at + 8]);
        self.at += 8;
        i64::from_le_bytes(bytes)
    }
}

/// Framing of the replicated data stream.
///
/// A data fragment is `[end_position: i64 LE][payload]`: the logical log
/// offset of the first byte past the payload, then the payload itself. The
/// explicit offset lets a new leader resume the stream exactly where the old
/// one stopped, and lets followers discard duplicates from resends.
pub struct DataFrame;

impl DataFrame {
    pub const HEADER_LENGTH: usize = 8;

    pub fn encode(end_position: Position, payload: &[u8], dst: &mut Vec<u8>) {
        dst.clear();
        dst.extend_from_slice(&end_position.to_le_bytes());
        dst.extend_from_slice(payload);
    }

    pub fn decode(frame: &[u8]) -> Result<(Position, &[u8]), FrameError> {
        if frame.len() < Self::HEADER_LENGTH {
            return Err(FrameError::WrongLength {
                expected: Self::HEADER_LENGTH,
                actual: frame.len(),
            });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&frame[..Self::HEADER_LENGTH]);
        Ok((
            Position::from_le_bytes(bytes),
            &frame[Self::HEADER_LENGTH..],
        ))
    }
}

/// Role-side control dispatch.
///
/// Each role implements this; [`ControlAdapter`] decodes raw fragments and
/// forwards them. Once a handler requests a transition the adapter aborts the
/// poll so the remaining fragments are re-delivered to the next role.
pub(crate) trait ControlHandler {
    fn on_control(
        &mut self,
        message: ControlMessage,
        meta: &FragmentMeta,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    );
}

pub(crate) struct ControlAdapter<'a, 'b, H: ControlHandler> {
    pub(crate) handler: &'a mut H,
    pub(crate) ctx: &'a mut RoleContext<'b>,
    pub(crate) transition: &'a mut Transition,
}

impl<H: ControlHandler> FragmentHandler for ControlAdapter<'_, '_, H> {
    fn on_fragment(&mut self, data: &[u8], meta: &FragmentMeta) -> Action {
        if *self.transition != Transition::Stay {
            return Action::Abort;
        }

        match ControlMessage::decode(data) {
            Ok(message) => {
                self.handler.on_control(message, meta, self.ctx, self.transition);
                Action::Continue
            }
            Err(error) => {
                tracing::warn!(%error, length = data.len(), "dropping malformed control frame");
                Action::Continue
            }
        }
    }
}
