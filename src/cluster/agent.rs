use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;
use validit::Valid;

use crate::archive::ArchiveReader;
use crate::archive::Archiver;
use crate::config::Config;
use crate::config::ConfigError;
use crate::session::SessionHandler;
use crate::transport::Publication;
use crate::transport::RaftTransport;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::RoleKind;
use crate::types::SessionId;
use crate::types::Term;

use super::ack_strategy::AcknowledgementStrategy;
use super::ack_strategy::QuorumStrategy;
use super::Candidate;
use super::Follower;
use super::Leader;
use super::RoleContext;
use super::TermState;
use super::Transition;

/// Heartbeats go out at a fifth of the leader timeout.
const HEARTBEAT_TO_TIMEOUT_RATIO: u64 = 5;

/// Observes cluster-level events on a node.
///
/// All methods default to no-ops; implement what you need.
pub trait NodeEventHandler {
    fn on_new_leader(&mut self, leader_session_id: SessionId) {
        let _ = leader_session_id;
    }

    fn on_role_change(&mut self, role: RoleKind) {
        let _ = role;
    }
}

/// The no-op handler.
impl NodeEventHandler for () {}

/// Everything a [`ClusterAgent`] is built from.
///
/// The collaborators are opaque to the core: the session handler consumes
/// replicated FIX bytes, the archiver pair owns durable storage, the
/// transport owns the streams.
pub struct ClusterContext {
    pub config: Config,
    pub transport: Box<dyn RaftTransport>,
    pub session_handler: Box<dyn SessionHandler>,
    pub archiver: Box<dyn Archiver>,
    pub archive_reader: Box<dyn ArchiveReader>,
    pub events: Box<dyn NodeEventHandler>,
}

/// Read-only view of a node's cluster state, for admin queries and tests.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub node_id: NodeId,
    pub role: RoleKind,
    pub term: Term,
    pub position: Position,
    pub commit_position: Position,
    pub leader_session_id: Option<SessionId>,
}

/// Owns the role state machine of one cluster node.
///
/// Exactly one of the three pre-allocated roles is current at any time; a
/// transition drops the departing role's transient state, injects the
/// arriving role's subscriptions and swaps the discriminant. TermState
/// updates always precede the swap, so an externally observed term never
/// regresses. Nothing here blocks: the owner drives [`poll`](Self::poll)
/// from a single thread.
pub struct ClusterAgent {
    node_id: NodeId,
    timeout_interval_ms: u64,
    term: Valid<TermState>,
    follower: Follower,
    candidate: Candidate,
    leader: Leader,
    current: RoleKind,
    transport: Box<dyn RaftTransport>,
    control_publication: Box<dyn Publication>,
    data_publication: Box<dyn Publication>,
    session_handler: Box<dyn SessionHandler>,
    archiver: Box<dyn Archiver>,
    archive_reader: Box<dyn ArchiveReader>,
    events: Box<dyn NodeEventHandler>,
    rng: SmallRng,
}

impl ClusterAgent {
    pub fn new(ctx: ClusterContext, now_ms: u64) -> Result<Self, ConfigError> {
        let config = ctx.config.validate()?;

        let cluster_size = config.cluster_size();
        let timeout_interval_ms = config.timeout_interval_ms;
        let heartbeat_interval_ms = timeout_interval_ms / HEARTBEAT_TO_TIMEOUT_RATIO;

        let mut transport = ctx.transport;
        let control_publication = transport.control_publication();
        let data_publication = transport.leader_publication();

        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let strategy: Box<dyn AcknowledgementStrategy> =
            Box::new(QuorumStrategy::new(cluster_size));

        let mut agent = Self {
            node_id: config.node_id,
            timeout_interval_ms,
            term: Valid::new(TermState::new()),
            follower: Follower::new(),
            candidate: Candidate::new(cluster_size),
            leader: Leader::new(
                heartbeat_interval_ms,
                config.max_fragment_bytes as usize,
                strategy,
            ),
            current: RoleKind::Follower,
            transport,
            control_publication,
            data_publication,
            session_handler: ctx.session_handler,
            archiver: ctx.archiver,
            archive_reader: ctx.archive_reader,
            events: ctx.events,
            rng,
        };
        agent.start_as_follower(now_ms);
        Ok(agent)
    }

    /// Drive the current role once.
    ///
    /// Returns the amount of work done. Transitions triggered by this poll
    /// are applied immediately and the new role is polled with the same
    /// budget, matching the transport's redelivery of aborted fragments.
    pub fn poll(&mut self, fragment_limit: usize, now_ms: u64) -> usize {
        let mut work = 0;
        loop {
            let (done, transition) = self.poll_current(fragment_limit, now_ms);
            work += done;
            if transition == Transition::Stay {
                return work;
            }
            self.apply(transition, now_ms);
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn role(&self) -> RoleKind {
        self.current
    }

    pub fn is_leader(&self) -> bool {
        self.current == RoleKind::Leader
    }

    pub fn is_candidate(&self) -> bool {
        self.current == RoleKind::Candidate
    }

    pub fn is_follower(&self) -> bool {
        self.current == RoleKind::Follower
    }

    pub fn term_state(&self) -> &TermState {
        &self.term
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            node_id: self.node_id,
            role: self.current,
            term: self.term.term(),
            position: self.term.position(),
            commit_position: self.term.commit_position(),
            leader_session_id: self.term.leader_session_id(),
        }
    }

    /// Staggered timeout in `[timeout_interval, 2 × timeout_interval)`,
    /// randomised so rival elections rarely collide.
    fn next_election_timeout(&mut self) -> u64 {
        self.rng.random_range(self.timeout_interval_ms..self.timeout_interval_ms * 2)
    }

    fn start_as_follower(&mut self, now_ms: u64) {
        let timeout = self.next_election_timeout();
        self.follower.inject_subscriptions(
            self.transport.control_subscription(),
            self.transport.data_subscription(),
        );
        self.follower.follow(now_ms, timeout);
        self.current = RoleKind::Follower;
    }

    fn poll_current(&mut self, fragment_limit: usize, now_ms: u64) -> (usize, Transition) {
        let next_election_timeout = self.next_election_timeout();

        let mut ctx = RoleContext {
            node_id: self.node_id,
            term: &mut self.term,
            control_publication: self.control_publication.as_mut(),
            data_publication: self.data_publication.as_mut(),
            session_handler: self.session_handler.as_mut(),
            archiver: self.archiver.as_mut(),
            archive_reader: self.archive_reader.as_mut(),
        };

        match self.current {
            RoleKind::Follower => self.follower.poll(&mut ctx, fragment_limit, now_ms),
            RoleKind::Candidate => {
                self.candidate.poll(&mut ctx, fragment_limit, now_ms, next_election_timeout)
            }
            RoleKind::Leader => self.leader.poll(&mut ctx, fragment_limit, now_ms),
        }
    }

    fn apply(&mut self, transition: Transition, now_ms: u64) {
        match (self.current, transition) {
            (RoleKind::Follower, Transition::ToCandidate) => {
                tracing::info!(
                    node = self.node_id,
                    at = now_ms,
                    term = self.term.term(),
                    "F -> Candidate"
                );
                self.follower.close_streams();
                self.candidate.inject_subscriptions(self.transport.control_subscription());
                self.current = RoleKind::Candidate;
                self.events.on_role_change(RoleKind::Candidate);

                let timeout = self.next_election_timeout();
                let mut ctx = RoleContext {
                    node_id: self.node_id,
                    term: &mut self.term,
                    control_publication: self.control_publication.as_mut(),
                    data_publication: self.data_publication.as_mut(),
                    session_handler: self.session_handler.as_mut(),
                    archiver: self.archiver.as_mut(),
                    archive_reader: self.archive_reader.as_mut(),
                };
                let next = self.candidate.start_new_election(&mut ctx, now_ms, timeout);
                if next != Transition::Stay {
                    // Single-node fast path.
                    self.apply(next, now_ms);
                }
            }
            (RoleKind::Candidate, Transition::ToLeader) => {
                tracing::info!(
                    node = self.node_id,
                    at = now_ms,
                    term = self.term.term(),
                    "C -> Leader"
                );
                self.candidate.close_streams();
                self.leader.inject_subscriptions(self.transport.control_subscription());
                self.current = RoleKind::Leader;

                let mut ctx = RoleContext {
                    node_id: self.node_id,
                    term: &mut self.term,
                    control_publication: self.control_publication.as_mut(),
                    data_publication: self.data_publication.as_mut(),
                    session_handler: self.session_handler.as_mut(),
                    archiver: self.archiver.as_mut(),
                    archive_reader: self.archive_reader.as_mut(),
                };
                self.leader.gets_elected(&mut ctx, now_ms);

                let session_id = self.data_publication.session_id();
                self.events.on_new_leader(session_id);
                self.events.on_role_change(RoleKind::Leader);
            }
            (RoleKind::Candidate, Transition::ToFollower) => {
                tracing::info!(
                    node = self.node_id,
                    at = now_ms,
                    term = self.term.term(),
                    "C -> Follower"
                );
                self.candidate.close_streams();
                self.start_as_follower(now_ms);
                self.events.on_role_change(RoleKind::Follower);
            }
            (RoleKind::Leader, Transition::ToFollower) => {
                tracing::info!(
                    node = self.node_id,
                    at = now_ms,
                    term = self.term.term(),
                    "L -> Follower"
                );
                self.leader.close_streams();
                self.start_as_follower(now_ms);
                self.events.on_role_change(RoleKind::Follower);
            }
            (from, to) => {
                debug_assert!(false, "invalid transition {to:?} from {from}");
            }
        }
    }
}
