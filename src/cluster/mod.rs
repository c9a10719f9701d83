//! The replicated cluster agent.
//!
//! A node is always in exactly one of three roles. The agent owns the role
//! instances, the shared [`TermState`] and the transport handles; the current
//! role borrows them for the duration of a single `poll`. Roles never call
//! back into the agent: each poll returns a [`Transition`] and the agent acts
//! on it, closing the departing role's streams and injecting the arriving
//! role's subscriptions.

mod ack_strategy;
mod agent;
mod candidate;
mod control;
mod follower;
mod leader;
mod peer_ack;
mod term_state;

#[cfg(test)] mod candidate_test;
#[cfg(test)] mod control_test;
#[cfg(test)] mod follower_test;
#[cfg(test)] pub(crate) mod role_test_support;

pub use ack_strategy::AcknowledgementStrategy;
pub use ack_strategy::EntireClusterStrategy;
pub use ack_strategy::QuorumStrategy;
pub use agent::ClusterAgent;
pub use agent::ClusterContext;
pub use agent::ClusterSnapshot;
pub use agent::NodeEventHandler;
pub use control::ControlMessage;
pub use control::DataFrame;
pub use term_state::TermObservation;
pub use term_state::TermState;

pub(crate) use candidate::Candidate;
pub(crate) use follower::Follower;
pub(crate) use leader::Leader;

use validit::Valid;

use crate::archive::ArchiveReader;
use crate::archive::Archiver;
use crate::session::SessionHandler;
use crate::transport::Offer;
use crate::transport::Publication;
use crate::types::NodeId;

/// A role's request to the agent, returned from every poll.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub(crate) enum Transition {
    #[default]
    Stay,
    ToFollower,
    ToCandidate,
    ToLeader,
}

/// Everything a role borrows from the agent while it is current.
pub(crate) struct RoleContext<'a> {
    pub(crate) node_id: NodeId,
    pub(crate) term: &'a mut Valid<TermState>,
    pub(crate) control_publication: &'a mut dyn Publication,
    pub(crate) data_publication: &'a mut dyn Publication,
    pub(crate) session_handler: &'a mut dyn SessionHandler,
    pub(crate) archiver: &'a mut dyn Archiver,
    pub(crate) archive_reader: &'a mut dyn ArchiveReader,
}

impl RoleContext<'_> {
    /// Encode and offer a control frame. Back pressure is reported to the
    /// caller, which decides whether the frame must be retried.
    pub(crate) fn publish_control(&mut self, message: &ControlMessage) -> Offer {
        let mut frame = [0u8; ControlMessage::MAX_FRAME_LENGTH];
        let length = message.encode(&mut frame);
        self.control_publication.offer(&frame[..length])
    }
}
