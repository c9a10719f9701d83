//! Harness for driving a single role against stub collaborators.

use std::collections::VecDeque;

use validit::Valid;

use crate::testing::MemoryArchive;
use crate::testing::RecordingSessionHandler;
use crate::transport::FragmentHandler;
use crate::transport::FragmentMeta;
use crate::transport::Offer;
use crate::transport::Publication;
use crate::transport::Subscription;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;

use super::control::DataFrame;
use super::ControlMessage;
use super::RoleContext;
use super::TermState;

/// Captures every frame offered to it; can simulate back pressure.
pub(crate) struct RecordingPublication {
    session_id: SessionId,
    pub(crate) frames: Vec<Vec<u8>>,
    pub(crate) back_pressured: bool,
    position: Position,
}

impl RecordingPublication {
    pub(crate) fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            frames: Vec::new(),
            back_pressured: false,
            position: 0,
        }
    }

    /// Decode everything offered so far as control messages.
    pub(crate) fn sent_control(&self) -> Vec<ControlMessage> {
        self.frames.iter().map(|f| ControlMessage::decode(f).expect("control frame")).collect()
    }

    /// Decode everything offered so far as data frames.
    pub(crate) fn sent_data(&self) -> Vec<(Position, Vec<u8>)> {
        self.frames
            .iter()
            .map(|f| {
                let (position, payload) = DataFrame::decode(f).expect("data frame");
                (position, payload.to_vec())
            })
            .collect()
    }
}

impl Publication for RecordingPublication {
    fn offer(&mut self, frame: &[u8]) -> Offer {
        if self.back_pressured {
            return Offer::BackPressured;
        }
        self.position += frame.len() as Position;
        self.frames.push(frame.to_vec());
        Offer::At(self.position)
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// Delivers a scripted sequence of frames, then runs dry.
pub(crate) struct ScriptedSubscription {
    frames: VecDeque<(SessionId, Position, Vec<u8>)>,
}

impl ScriptedSubscription {
    pub(crate) fn empty() -> Box<dyn Subscription> {
        Box::new(Self {
            frames: VecDeque::new(),
        })
    }

    pub(crate) fn of_control(messages: &[ControlMessage]) -> Box<dyn Subscription> {
        let frames = messages
            .iter()
            .map(|message| {
                let mut frame = [0u8; ControlMessage::MAX_FRAME_LENGTH];
                let length = message.encode(&mut frame);
                (0, 0, frame[..length].to_vec())
            })
            .collect();
        Box::new(Self { frames })
    }

    pub(crate) fn of_data(session_id: SessionId, fragments: &[(Position, &[u8])]) -> Box<dyn Subscription> {
        let frames = fragments
            .iter()
            .map(|(end_position, payload)| {
                let mut frame = Vec::new();
                DataFrame::encode(*end_position, payload, &mut frame);
                (session_id, *end_position, frame)
            })
            .collect();
        Box::new(Self { frames })
    }
}

impl Subscription for ScriptedSubscription {
    fn poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize) -> usize {
        let mut delivered = 0;
        while delivered < fragment_limit {
            let Some((session_id, end_position, bytes)) = self.frames.front() else {
                break;
            };
            let meta = FragmentMeta {
                session_id: *session_id,
                end_position: *end_position,
            };
            match handler.on_fragment(bytes, &meta) {
                crate::transport::Action::Continue => {
                    self.frames.pop_front();
                    delivered += 1;
                }
                crate::transport::Action::Abort => break,
            }
        }
        delivered
    }
}

/// Stub collaborators for one role under test.
pub(crate) struct RoleHarness {
    pub(crate) node_id: NodeId,
    pub(crate) term: Valid<TermState>,
    pub(crate) control: RecordingPublication,
    pub(crate) data: RecordingPublication,
    pub(crate) session: RecordingSessionHandler,
    pub(crate) archiver: MemoryArchive,
    pub(crate) reader: MemoryArchive,
}

/// The session id the harness data publication reports.
pub(crate) const DATA_SESSION: SessionId = 77;

impl RoleHarness {
    pub(crate) fn new(node_id: NodeId) -> Self {
        let archive = MemoryArchive::new();
        Self {
            node_id,
            term: Valid::new(TermState::new()),
            control: RecordingPublication::new(10),
            data: RecordingPublication::new(DATA_SESSION),
            session: RecordingSessionHandler::new(),
            archiver: archive.clone(),
            reader: archive,
        }
    }

    pub(crate) fn ctx(&mut self) -> RoleContext<'_> {
        RoleContext {
            node_id: self.node_id,
            term: &mut self.term,
            control_publication: &mut self.control,
            data_publication: &mut self.data,
            session_handler: &mut self.session,
            archiver: &mut self.archiver,
            archive_reader: &mut self.reader,
        }
    }
}

pub(crate) fn meta(session_id: SessionId) -> FragmentMeta {
    FragmentMeta {
        session_id,
        end_position: 0,
    }
}
