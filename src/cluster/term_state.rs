use std::error::Error;

use validit::less_equal;
use validit::Validate;

use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;
use crate::types::Term;

/// Outcome of observing a term carried by an inbound message.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum TermObservation {
    /// The message is from a newer term; local term advanced, the vote and
    /// the known leader were cleared.
    Advanced,
    /// The message is from the current term.
    Same,
    /// The message is from an older term and must be dropped.
    Stale,
}

/// Shared bookkeeping for the current leadership term.
///
/// One instance lives for the whole node lifetime; the currently active role
/// borrows it mutably for the duration of its poll.
///
/// Invariants, checked via [`Validate`] in debug builds:
/// - `commit_position <= position`;
/// - `term` never decreases;
/// - at most one vote is granted per term (`voted_for` is cleared exactly
///   when the term advances).
#[derive(Clone, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct TermState {
    term: Term,
    leader_session_id: Option<SessionId>,
    position: Position,
    commit_position: Position,
    voted_for: Option<NodeId>,
}

impl Validate for TermState {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        less_equal!(self.commit_position, self.position);
        less_equal!(0, self.term);
        Ok(())
    }
}

impl TermState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub fn leader_session_id(&self) -> Option<SessionId> {
        self.leader_session_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn commit_position(&self) -> Position {
        self.commit_position
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    /// Fold an observed term into the local one.
    ///
    /// Advancing clears `voted_for` and the known leader; the term itself
    /// never moves backwards.
    pub fn observe_term(&mut self, new_term: Term) -> TermObservation {
        if new_term > self.term {
            self.term = new_term;
            self.voted_for = None;
            self.leader_session_id = None;
            TermObservation::Advanced
        } else if new_term == self.term {
            TermObservation::Same
        } else {
            TermObservation::Stale
        }
    }

    /// Enter a new election: bump the term and vote for ourselves.
    pub(crate) fn begin_election(&mut self, self_id: NodeId) -> Term {
        self.term += 1;
        self.voted_for = Some(self_id);
        self.leader_session_id = None;
        self.term
    }

    /// Whether a vote for `candidate` is permitted in the current term.
    pub(crate) fn may_grant(&self, candidate: NodeId) -> bool {
        match self.voted_for {
            None => true,
            Some(granted) => granted == candidate,
        }
    }

    pub(crate) fn grant_vote(&mut self, candidate: NodeId) {
        debug_assert!(self.may_grant(candidate));
        self.voted_for = Some(candidate);
    }

    pub(crate) fn set_leader_session_id(&mut self, session_id: SessionId) {
        self.leader_session_id = Some(session_id);
    }

    /// Record data received up to `position`. Monotone.
    pub(crate) fn advance_position(&mut self, position: Position) {
        if position > self.position {
            self.position = position;
        }
    }

    /// Record commit knowledge up to `position`, clamped to what was locally
    /// received. Monotone; returns true if the commit position moved.
    pub(crate) fn advance_commit(&mut self, position: Position) -> bool {
        let clamped = position.min(self.position);
        if clamped > self.commit_position {
            self.commit_position = clamped;
            true
        } else {
            false
        }
    }
}
