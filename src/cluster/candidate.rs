use std::collections::BTreeSet;

use crate::transport::FragmentMeta;
use crate::transport::Subscription;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;
use crate::types::Term;

use super::control::ControlAdapter;
use super::control::ControlHandler;
use super::control::ControlMessage;
use super::RoleContext;
use super::Transition;

/// The candidate role: runs an election, counting vote grants against the
/// majority quorum.
pub(crate) struct Candidate {
    cluster_size: usize,
    election_deadline_ms: u64,
    /// Node ids that granted our current election term, self included.
    votes: BTreeSet<NodeId>,
    control_subscription: Option<Box<dyn Subscription>>,
}

impl Candidate {
    pub(crate) fn new(cluster_size: usize) -> Self {
        Self {
            cluster_size,
            election_deadline_ms: u64::MAX,
            votes: BTreeSet::new(),
            control_subscription: None,
        }
    }

    fn quorum(&self) -> usize {
        self.cluster_size / 2 + 1
    }

    pub(crate) fn inject_subscriptions(&mut self, control: Box<dyn Subscription>) {
        self.control_subscription = Some(control);
    }

    pub(crate) fn close_streams(&mut self) {
        self.control_subscription = None;
    }

    /// Entry action and re-entry on election timeout: bump the term, vote for
    /// ourselves and solicit the peers.
    ///
    /// Returns `ToLeader` straight away for a single-node cluster.
    pub(crate) fn start_new_election(
        &mut self,
        ctx: &mut RoleContext<'_>,
        now_ms: u64,
        election_timeout_ms: u64,
    ) -> Transition {
        let term = ctx.term.begin_election(ctx.node_id);
        self.votes.clear();
        self.votes.insert(ctx.node_id);
        self.election_deadline_ms = now_ms + election_timeout_ms;

        tracing::info!(
            node = ctx.node_id,
            term,
            deadline = self.election_deadline_ms,
            "starting election"
        );

        if self.votes.len() >= self.quorum() {
            return Transition::ToLeader;
        }

        let request = ControlMessage::RequestVote {
            term,
            candidate_id: ctx.node_id,
            last_position: ctx.term.position(),
        };
        ctx.publish_control(&request);
        Transition::Stay
    }

    pub(crate) fn poll(
        &mut self,
        ctx: &mut RoleContext<'_>,
        fragment_limit: usize,
        now_ms: u64,
        next_election_timeout_ms: u64,
    ) -> (usize, Transition) {
        let mut transition = Transition::Stay;
        let mut work = 0;

        let control = self.control_subscription.take();
        if let Some(mut control) = control {
            let mut adapter = ControlAdapter {
                handler: &mut *self,
                ctx: &mut *ctx,
                transition: &mut transition,
            };
            work += control.poll(&mut adapter, fragment_limit);
            self.control_subscription = Some(control);
        }

        if transition == Transition::Stay && now_ms > self.election_deadline_ms {
            tracing::info!(
                node = ctx.node_id,
                term = ctx.term.term(),
                "election timed out without quorum, starting a new one"
            );
            transition = self.start_new_election(ctx, now_ms, next_election_timeout_ms);
        }

        (work, transition)
    }

    fn on_reply_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        voter_id: NodeId,
        granted: bool,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        if candidate_id != ctx.node_id {
            return;
        }

        if granted && term == ctx.term.term() {
            self.votes.insert(voter_id);
            tracing::debug!(
                node = ctx.node_id,
                voter = voter_id,
                tally = self.votes.len(),
                quorum = self.quorum(),
                "vote granted"
            );
            if self.votes.len() >= self.quorum() {
                *transition = Transition::ToLeader;
            }
            return;
        }

        // A rejection naming a newer term means a rival got there first.
        if !granted && term > ctx.term.term() {
            ctx.term.observe_term(term);
            *transition = Transition::ToFollower;
        }
    }

    fn on_heartbeat(
        &mut self,
        term: Term,
        session_id: SessionId,
        position: Position,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        // An established leader of our term or newer: stand down and follow.
        if term >= ctx.term.term() {
            ctx.term.observe_term(term);
            ctx.term.set_leader_session_id(session_id);
            ctx.term.advance_commit(position);
            *transition = Transition::ToFollower;
        }
    }

    fn on_request_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_position: Position,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        // Our own broadcast echoed back.
        if candidate_id == ctx.node_id {
            return;
        }

        if term <= ctx.term.term() {
            // A rival in our own or an older term gets nothing.
            let reply = ControlMessage::ReplyVote {
                term: ctx.term.term(),
                candidate_id,
                voter_id: ctx.node_id,
                granted: false,
            };
            ctx.publish_control(&reply);
            return;
        }

        ctx.term.observe_term(term);
        let granted = last_position >= ctx.term.position() && ctx.term.may_grant(candidate_id);
        if granted {
            ctx.term.grant_vote(candidate_id);
        }

        let reply = ControlMessage::ReplyVote {
            term: ctx.term.term(),
            candidate_id,
            voter_id: ctx.node_id,
            granted,
        };
        ctx.publish_control(&reply);

        // Either way the newer term ends our candidacy.
        *transition = Transition::ToFollower;
    }
}

impl ControlHandler for Candidate {
    fn on_control(
        &mut self,
        message: ControlMessage,
        _meta: &FragmentMeta,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        match message {
            ControlMessage::ReplyVote {
                term,
                candidate_id,
                voter_id,
                granted,
            } => self.on_reply_vote(term, candidate_id, voter_id, granted, ctx, transition),
            ControlMessage::ConsensusHeartbeat {
                term,
                session_id,
                position,
                ..
            } => self.on_heartbeat(term, session_id, position, ctx, transition),
            ControlMessage::RequestVote {
                term,
                candidate_id,
                last_position,
            } => self.on_request_vote(term, candidate_id, last_position, ctx, transition),
            ControlMessage::MessageAcknowledgement { .. } | ControlMessage::Resend { .. } => {}
        }
    }
}
