use crate::transport::FragmentMeta;
use crate::transport::Offer;
use crate::transport::Subscription;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::Term;

use super::ack_strategy::AcknowledgementStrategy;
use super::control::ControlAdapter;
use super::control::ControlHandler;
use super::control::ControlMessage;
use super::control::DataFrame;
use super::peer_ack::PeerAck;
use super::RoleContext;
use super::Transition;

/// The leader role: asserts liveness with heartbeats, streams archive-durable
/// data onto the data publication, and advances the committed position from
/// follower acknowledgements.
pub(crate) struct Leader {
    heartbeat_interval_ms: u64,
    next_heartbeat_ms: u64,
    max_fragment_bytes: usize,
    acks: PeerAck,
    strategy: Box<dyn AcknowledgementStrategy>,
    /// How far the archive has been handed to the data publication.
    transmit_position: Position,
    /// Outstanding resend range `[next, requested_end)`, served ahead of live
    /// transmission and bounded to what the follower asked for.
    resend_window: Option<(Position, Position)>,
    control_subscription: Option<Box<dyn Subscription>>,
    positions_scratch: Vec<Position>,
    read_scratch: Vec<u8>,
    frame_scratch: Vec<u8>,
}

impl Leader {
    pub(crate) fn new(
        heartbeat_interval_ms: u64,
        max_fragment_bytes: usize,
        strategy: Box<dyn AcknowledgementStrategy>,
    ) -> Self {
        Self {
            heartbeat_interval_ms,
            next_heartbeat_ms: u64::MAX,
            max_fragment_bytes,
            acks: PeerAck::default(),
            strategy,
            transmit_position: 0,
            resend_window: None,
            control_subscription: None,
            positions_scratch: Vec::new(),
            read_scratch: Vec::new(),
            frame_scratch: Vec::new(),
        }
    }

    pub(crate) fn inject_subscriptions(&mut self, control: Box<dyn Subscription>) {
        self.control_subscription = Some(control);
    }

    pub(crate) fn close_streams(&mut self) {
        self.control_subscription = None;
    }

    /// Entry action: clear follower acknowledgements, claim the data session
    /// and schedule an immediate heartbeat.
    pub(crate) fn gets_elected(&mut self, ctx: &mut RoleContext<'_>, now_ms: u64) {
        self.acks.clear();
        self.transmit_position = ctx.term.position();
        self.resend_window = None;
        self.next_heartbeat_ms = now_ms;

        let session_id = ctx.data_publication.session_id();
        ctx.term.set_leader_session_id(session_id);

        tracing::info!(
            node = ctx.node_id,
            term = ctx.term.term(),
            session_id,
            position = ctx.term.position(),
            "elected leader"
        );
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

        if transition != Transition::Stay {
            return (work, transition);
        }

        if now_ms >= self.next_heartbeat_ms {
            let heartbeat = ControlMessage::ConsensusHeartbeat {
                term: ctx.term.term(),
                leader_id: ctx.node_id,
                session_id: ctx.data_publication.session_id(),
                position: ctx.term.commit_position(),
            };
            if !ctx.publish_control(&heartbeat).is_back_pressured() {
                self.next_heartbeat_ms = now_ms + self.heartbeat_interval_ms;
                work += 1;
            }
        }

        if self.advance_commit(ctx) {
            // Propagate commit knowledge promptly rather than waiting out the
            // heartbeat interval.
            self.next_heartbeat_ms = now_ms;
        }

        let served = self.serve_resend(ctx, fragment_limit);
        work += served;
        work += self.transmit(ctx, fragment_limit.saturating_sub(served));

        (work, transition)
    }

    /// Re-derive the committed position from `acks ∪ {self → position}`.
    fn advance_commit(&mut self, ctx: &mut RoleContext<'_>) -> bool {
        self.acks.positions_with_own(ctx.term.position(), &mut self.positions_scratch);
        let safe = self.strategy.safe_position(&mut self.positions_scratch);
        if ctx.term.advance_commit(safe) {
            let commit_position = ctx.term.commit_position();
            ctx.archiver.on_commit(commit_position);
            tracing::debug!(node = ctx.node_id, commit_position, "commit position advanced");
            true
        } else {
            false
        }
    }

    /// Re-read the requested resend range from the archive and re-offer it,
    /// capped per poll. Followers discard what they already hold, so
    /// over-delivery within the window is safe.
    fn serve_resend(&mut self, ctx: &mut RoleContext<'_>, fragment_limit: usize) -> usize {
        let Some((start, requested_end)) = self.resend_window else {
            return 0;
        };
        // Bytes past the durable watermark reach followers through the live
        // stream; only the durable part of the window is replayed.
        let end = requested_end.min(ctx.archive_reader.durable_position());

        let mut cursor = start;
        let mut fragments = 0;
        while cursor < end && fragments < fragment_limit {
            let length = ((end - cursor).min(self.max_fragment_bytes as i64)) as usize;
            let read = ctx.archive_reader.read(cursor, length, &mut self.read_scratch);
            if read == 0 {
                break;
            }

            let end_position = cursor + read as i64;
            DataFrame::encode(end_position, &self.read_scratch[..read], &mut self.frame_scratch);
            match ctx.data_publication.offer(&self.frame_scratch) {
                Offer::At(_) => {
                    cursor = end_position;
                    fragments += 1;
                }
                Offer::BackPressured | Offer::Closed => break,
            }
        }

        self.resend_window = if cursor < end {
            Some((cursor, requested_end))
        } else {
            None
        };
        fragments
    }

    /// Stream archive-durable bytes onto the data publication, capped at
    /// `fragment_limit` fragments per poll to preserve responsiveness.
    fn transmit(&mut self, ctx: &mut RoleContext<'_>, fragment_limit: usize) -> usize {
        let mut fragments = 0;
        while fragments < fragment_limit {
            let durable = ctx.archive_reader.durable_position();
            if self.transmit_position >= durable {
                break;
            }

            let length =
                (durable - self.transmit_position).min(self.max_fragment_bytes as i64) as usize;
            let read = ctx
                .archive_reader
                .read(self.transmit_position, length, &mut self.read_scratch);
            if read == 0 {
                break;
            }

            let end_position = self.transmit_position + read as i64;
            DataFrame::encode(end_position, &self.read_scratch[..read], &mut self.frame_scratch);
            match ctx.data_publication.offer(&self.frame_scratch) {
                Offer::At(_) => {
                    self.transmit_position = end_position;
                    ctx.term.advance_position(end_position);
                    fragments += 1;
                }
                Offer::BackPressured | Offer::Closed => break,
            }
        }
        fragments
    }

    fn on_ack(&mut self, term: Term, follower_id: NodeId, position: Position, ctx: &mut RoleContext<'_>) {
        if term != ctx.term.term() {
            tracing::trace!(term, follower_id, "dropping acknowledgement from another term");
            return;
        }
        self.acks.update_max(follower_id, position);
    }

    fn on_resend(
        &mut self,
        term: Term,
        leader_id: NodeId,
        start_position: Position,
        length: i32,
        ctx: &mut RoleContext<'_>,
    ) {
        if term != ctx.term.term() || leader_id != ctx.node_id {
            return;
        }

        let end = start_position + Position::from(length.max(0));
        // Requests are idempotent; overlapping ones merge into one window.
        self.resend_window = match self.resend_window {
            Some((cursor, requested_end)) => {
                Some((cursor.min(start_position), requested_end.max(end)))
            }
            None => Some((start_position, end)),
        };

        tracing::debug!(
            node = ctx.node_id,
            start_position,
            length,
            "resend requested"
        );
    }

    fn on_request_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_position: Position,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        // Our own broadcast from the candidacy that elected us.
        if candidate_id == ctx.node_id {
            return;
        }

        if term <= ctx.term.term() {
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

        tracing::info!(
            node = ctx.node_id,
            candidate = candidate_id,
            term,
            granted,
            "deposed by newer election"
        );
        *transition = Transition::ToFollower;
    }

    fn on_heartbeat(
        &mut self,
        term: Term,
        leader_id: NodeId,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        if leader_id == ctx.node_id {
            return;
        }

        if term > ctx.term.term() {
            ctx.term.observe_term(term);
            tracing::info!(
                node = ctx.node_id,
                rival = leader_id,
                term,
                "newer leader seen, stepping down"
            );
            *transition = Transition::ToFollower;
        } else if term == ctx.term.term() {
            // Two leaders in one term should be impossible.
            tracing::warn!(
                node = ctx.node_id,
                rival = leader_id,
                term,
                "rival leader heartbeat in the current term"
            );
        }
    }
}

impl ControlHandler for Leader {
    fn on_control(
        &mut self,
        message: ControlMessage,
        _meta: &FragmentMeta,
        ctx: &mut RoleContext<'_>,
        transition: &mut Transition,
    ) {
        match message {
            ControlMessage::MessageAcknowledgement {
                term,
                follower_id,
                position,
            } => self.on_ack(term, follower_id, position, ctx),
            ControlMessage::Resend {
                term,
                leader_id,
                start_position,
                length,
            } => self.on_resend(term, leader_id, start_position, length, ctx),
            ControlMessage::RequestVote {
                term,
                candidate_id,
                last_position,
            } => self.on_request_vote(term, candidate_id, last_position, ctx, transition),
            ControlMessage::ConsensusHeartbeat { term, leader_id, .. } => {
                self.on_heartbeat(term, leader_id, ctx, transition)
            }
            // Straggling grants from the election we already won.
            ControlMessage::ReplyVote { .. } => {}
        }
    }
}
