use crate::transport::Action;
use crate::transport::FragmentHandler;
use crate::transport::FragmentMeta;
use crate::transport::Subscription;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;
use crate::types::Term;

use super::control::ControlAdapter;
use super::control::ControlHandler;
use super::control::ControlMessage;
use super::control::DataFrame;
use super::RoleContext;
use super::Transition;

/// The follower role: applies leader data to the local archive, acknowledges
/// positions, and stands for election when the leader goes quiet.
///
/// Scratch state only; everything shared lives in
/// [`TermState`](super::TermState).
pub(crate) struct Follower {
    timeout_ms: u64,
    latest_next_receive_time_ms: u64,
    received_heartbeat: bool,
    resend_in_flight: bool,
    ack_pending: bool,
    control_subscription: Option<Box<dyn Subscription>>,
    data_subscription: Option<Box<dyn Subscription>>,
}

impl Follower {
    pub(crate) fn new() -> Self {
        Self {
            timeout_ms: 0,
            latest_next_receive_time_ms: u64::MAX,
            received_heartbeat: false,
            resend_in_flight: false,
            ack_pending: false,
            control_subscription: None,
            data_subscription: None,
        }
    }

    /// Entry action: arm the leader timeout.
    ///
    /// `timeout_ms` is the staggered value drawn by the agent for this stint.
    pub(crate) fn follow(&mut self, now_ms: u64, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
        self.latest_next_receive_time_ms = now_ms + timeout_ms;
        self.received_heartbeat = false;
        self.resend_in_flight = false;
        self.ack_pending = false;
    }

    pub(crate) fn inject_subscriptions(
        &mut self,
        control: Box<dyn Subscription>,
        data: Box<dyn Subscription>,
    ) {
        self.control_subscription = Some(control);
        self.data_subscription = Some(data);
    }

    pub(crate) fn close_streams(&mut self) {
        self.control_subscription = None;
        self.data_subscription = None;
    }

    pub(crate) fn poll(
        &mut self,
        ctx: &mut RoleContext<'_>,
        fragment_limit: usize,
        now_ms: u64,
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

        let data = self.data_subscription.take();
        if let Some(mut data) = data {
            let before = ctx.term.position();
            let mut receiver = DataReceiver {
                ctx: &mut *ctx,
                resend_in_flight: &mut self.resend_in_flight,
            };
            work += data.poll(&mut receiver, fragment_limit);
            self.data_subscription = Some(data);

            if ctx.term.position() > before {
                self.ack_pending = true;
                self.on_received_message(now_ms);
            }
        }

        if self.ack_pending {
            let ack = ControlMessage::MessageAcknowledgement {
                term: ctx.term.term(),
                follower_id: ctx.node_id,
                position: ctx.term.position(),
            };
            if !ctx.publish_control(&ack).is_back_pressured() {
                self.ack_pending = false;
            }
        }

        if self.received_heartbeat {
            self.on_received_message(now_ms);
            self.received_heartbeat = false;
        }

        if transition == Transition::Stay && now_ms > self.latest_next_receive_time_ms {
            tracing::info!(
                node = ctx.node_id,
                term = ctx.term.term(),
                at = now_ms,
                "leader timed out, standing for election"
            );
            transition = Transition::ToCandidate;
        }

        (work, transition)
    }

    fn on_received_message(&mut self, now_ms: u64) {
        self.latest_next_receive_time_ms = now_ms + self.timeout_ms;
    }

    fn on_heartbeat(
        &mut self,
        term: Term,
        leader_id: NodeId,
        session_id: SessionId,
        position: Position,
        ctx: &mut RoleContext<'_>,
    ) {
        use super::TermObservation::*;

        match ctx.term.observe_term(term) {
            Stale => {
                tracing::trace!(term, current = ctx.term.term(), "dropping stale heartbeat");
                return;
            }
            Advanced | Same => {}
        }

        ctx.term.set_leader_session_id(session_id);
        self.received_heartbeat = true;
        ctx.term.advance_commit(position);

        // The leader committed past what we received: ask it to resend the
        // gap. One request in flight at a time; duplicates are harmless.
        if position > ctx.term.position() && !self.resend_in_flight {
            let start_position = ctx.term.position();
            let gap = position - start_position;
            let request = ControlMessage::Resend {
                term: ctx.term.term(),
                leader_id,
                start_position,
                length: gap.min(i64::from(i32::MAX)) as i32,
            };
            if !ctx.publish_control(&request).is_back_pressured() {
                self.resend_in_flight = true;
                tracing::debug!(
                    node = ctx.node_id,
                    start_position,
                    gap,
                    "requesting resend from leader"
                );
            }
        }
    }

    fn on_request_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_position: Position,
        ctx: &mut RoleContext<'_>,
    ) {
        // Our own broadcast from an earlier candidacy, echoed back.
        if candidate_id == ctx.node_id {
            return;
        }

        let newer = term > ctx.term.term();
        if newer {
            ctx.term.observe_term(term);
        }

        let up_to_date = last_position >= ctx.term.position();
        let granted = newer && up_to_date && ctx.term.may_grant(candidate_id);
        if granted {
            ctx.term.grant_vote(candidate_id);
        }

        tracing::debug!(
            node = ctx.node_id,
            candidate = candidate_id,
            term,
            last_position,
            granted,
            "vote request"
        );

        let reply = ControlMessage::ReplyVote {
            term: ctx.term.term(),
            candidate_id,
            voter_id: ctx.node_id,
            granted,
        };
        // Best effort: a candidate that misses the reply re-elects.
        ctx.publish_control(&reply);
    }
}

impl ControlHandler for Follower {
    fn on_control(
        &mut self,
        message: ControlMessage,
        _meta: &FragmentMeta,
        ctx: &mut RoleContext<'_>,
        _transition: &mut Transition,
    ) {
        match message {
            ControlMessage::ConsensusHeartbeat {
                term,
                leader_id,
                session_id,
                position,
            } => self.on_heartbeat(term, leader_id, session_id, position, ctx),
            ControlMessage::RequestVote {
                term,
                candidate_id,
                last_position,
            } => self.on_request_vote(term, candidate_id, last_position, ctx),
            // Leader-side traffic; not interested.
            ControlMessage::MessageAcknowledgement { .. }
            | ControlMessage::ReplyVote { .. }
            | ControlMessage::Resend { .. } => {}
        }
    }
}

/// Applies replicated data fragments: session handler first, then the local
/// archive, then the position bookkeeping.
struct DataReceiver<'a, 'b> {
    ctx: &'a mut RoleContext<'b>,
    resend_in_flight: &'a mut bool,
}

impl FragmentHandler for DataReceiver<'_, '_> {
    fn on_fragment(&mut self, data: &[u8], meta: &FragmentMeta) -> Action {
        let Some(leader_session) = self.ctx.term.leader_session_id() else {
            tracing::debug!("data fragment before any known leader, dropping");
            return Action::Continue;
        };
        if meta.session_id != leader_session {
            return Action::Continue;
        }

        let (end_position, payload) = match DataFrame::decode(data) {
            Ok(decoded) => decoded,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed data frame");
                return Action::Continue;
            }
        };

        // Resent data we already hold.
        if end_position <= self.ctx.term.position() {
            return Action::Continue;
        }

        let delivery = FragmentMeta {
            session_id: meta.session_id,
            end_position,
        };
        if self.ctx.session_handler.on_session_data(payload, &delivery) == Action::Abort {
            return Action::Abort;
        }

        self.ctx.archiver.archive(payload, end_position);
        self.ctx.term.advance_position(end_position);
        *self.resend_in_flight = false;
        Action::Continue
    }
}
