//! The reliable, ordered, session-multiplexed transport contract.
//!
//! The gateway core never talks to sockets directly: it offers frames to
//! [`Publication`]s and drains [`Subscription`]s, both non-blocking. A
//! concrete transport (shared memory, UDP multicast) lives outside this
//! crate; an in-memory loopback for tests is in [`crate::testing`].

use crate::types::Position;
use crate::types::SessionId;

/// Outcome of offering a frame to a publication.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum Offer {
    /// The frame was enqueued; the stream position after it.
    At(Position),
    /// The frame could not be enqueued; retry on a later poll.
    BackPressured,
    /// The publication is closed and will never accept frames again.
    Closed,
}

impl Offer {
    pub fn is_back_pressured(&self) -> bool {
        matches!(self, Offer::BackPressured)
    }
}

/// What a fragment handler wants done with the fragment it was handed.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum Action {
    /// Consume the fragment and continue polling.
    Continue,
    /// Do not consume: the same fragment is re-delivered on the next poll.
    Abort,
}

/// Delivery metadata attached to every fragment.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct FragmentMeta {
    /// Session of the publication that emitted the fragment.
    pub session_id: SessionId,
    /// Stream position of the first byte past this fragment.
    pub end_position: Position,
}

/// A non-blocking outbound stream handle.
pub trait Publication {
    fn offer(&mut self, frame: &[u8]) -> Offer;

    /// Session id identifying this publication to its subscribers.
    fn session_id(&self) -> SessionId;
}

/// A non-blocking inbound stream handle.
pub trait Subscription {
    /// Deliver up to `fragment_limit` fragments into `handler`.
    ///
    /// Returns the number of fragments delivered. A handler returning
    /// [`Action::Abort`] stops the poll and leaves that fragment queued.
    fn poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize) -> usize;
}

/// Receives fragments from [`Subscription::poll`].
pub trait FragmentHandler {
    fn on_fragment(&mut self, data: &[u8], meta: &FragmentMeta) -> Action;
}

impl<F> FragmentHandler for F
where F: FnMut(&[u8], &FragmentMeta) -> Action
{
    fn on_fragment(&mut self, data: &[u8], meta: &FragmentMeta) -> Action {
        self(data, meta)
    }
}

/// Hands out the streams a cluster node needs, one role at a time.
///
/// Subscriptions are injected into the role that becomes current and dropped
/// when it leaves; publications are stable for the node's lifetime.
pub trait RaftTransport {
    /// The stream this node broadcasts replicated data on when leading.
    fn leader_publication(&mut self) -> Box<dyn Publication>;

    /// The control stream publication shared by all roles.
    fn control_publication(&mut self) -> Box<dyn Publication>;

    /// A fresh subscription to the cluster control stream.
    fn control_subscription(&mut self) -> Box<dyn Subscription>;

    /// A fresh subscription to the data stream of whichever peer leads.
    fn data_subscription(&mut self) -> Box<dyn Subscription>;
}
