use std::cell::RefCell;
use std::rc::Rc;

use crate::archive::ArchiveReader;
use crate::archive::Archiver;
use crate::cluster::NodeEventHandler;
use crate::session::SessionHandler;
use crate::transport::Action;
use crate::transport::FragmentMeta;
use crate::types::Position;
use crate::types::RoleKind;
use crate::types::SessionId;

#[derive(Default)]
struct MemoryArchiveState {
    log: Vec<u8>,
    commit_position: Position,
}

/// An in-memory archive; clones share the same storage, so one instance can
/// serve as a node's `Archiver`, its `ArchiveReader` and the test's window
/// into both.
#[derive(Clone, Default)]
pub struct MemoryArchive {
    state: Rc<RefCell<MemoryArchiveState>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Application-side append: outbound messages the leader must replicate.
    pub fn append(&self, data: &[u8]) {
        self.state.borrow_mut().log.extend_from_slice(data);
    }

    pub fn durable(&self) -> Position {
        self.state.borrow().log.len() as Position
    }

    pub fn commit_position(&self) -> Position {
        self.state.borrow().commit_position
    }

    pub fn contents(&self) -> Vec<u8> {
        self.state.borrow().log.clone()
    }
}

impl Archiver for MemoryArchive {
    fn archive(&mut self, data: &[u8], end_position: Position) {
        let mut state = self.state.borrow_mut();
        let expected = state.log.len() as Position + data.len() as Position;
        debug_assert_eq!(end_position, expected, "archive writes must stay contiguous");
        state.log.extend_from_slice(data);
    }

    fn on_commit(&mut self, commit_position: Position) {
        let mut state = self.state.borrow_mut();
        state.commit_position = state.commit_position.max(commit_position);
    }
}

impl ArchiveReader for MemoryArchive {
    fn durable_position(&self) -> Position {
        self.state.borrow().log.len() as Position
    }

    fn read(&mut self, start: Position, length: usize, dst: &mut Vec<u8>) -> usize {
        dst.clear();
        let state = self.state.borrow();
        let len = state.log.len() as Position;
        if start < 0 || start >= len {
            return 0;
        }
        let end = (start + length as Position).min(len);
        dst.extend_from_slice(&state.log[start as usize..end as usize]);
        (end - start) as usize
    }
}

#[derive(Default)]
struct RecordingState {
    received: Vec<u8>,
    last_position: Position,
    aborting: bool,
}

/// A session handler that concatenates everything it is given.
#[derive(Clone, Default)]
pub struct RecordingSessionHandler {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingSessionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<u8> {
        self.state.borrow().received.clone()
    }

    pub fn last_position(&self) -> Position {
        self.state.borrow().last_position
    }

    /// While set, every fragment is refused with `Action::Abort`.
    pub fn set_aborting(&self, aborting: bool) {
        self.state.borrow_mut().aborting = aborting;
    }
}

impl SessionHandler for RecordingSessionHandler {
    fn on_session_data(&mut self, data: &[u8], meta: &FragmentMeta) -> Action {
        let mut state = self.state.borrow_mut();
        if state.aborting {
            return Action::Abort;
        }
        state.received.extend_from_slice(data);
        state.last_position = meta.end_position;
        Action::Continue
    }
}

#[derive(Default)]
struct EventLog {
    roles: Vec<RoleKind>,
    leaders: Vec<SessionId>,
}

/// Records every role change and leader announcement on a node.
#[derive(Clone, Default)]
pub struct CollectingEvents {
    state: Rc<RefCell<EventLog>>,
}

impl CollectingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roles(&self) -> Vec<RoleKind> {
        self.state.borrow().roles.clone()
    }

    pub fn leaders(&self) -> Vec<SessionId> {
        self.state.borrow().leaders.clone()
    }
}

impl NodeEventHandler for CollectingEvents {
    fn on_new_leader(&mut self, leader_session_id: SessionId) {
        self.state.borrow_mut().leaders.push(leader_session_id);
    }

    fn on_role_change(&mut self, role: RoleKind) {
        self.state.borrow_mut().roles.push(role);
    }
}
