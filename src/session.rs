//! The opaque FIX session collaborator.

use crate::transport::Action;
use crate::transport::FragmentMeta;

/// Consumes replicated FIX message bytes on a cluster node.
///
/// The full session state machine (logon, logout, resend, heartbeat) lives
/// outside the core; the cluster hands it raw byte windows in replication
/// order. Returning [`Action::Abort`] applies back pressure: the fragment is
/// re-delivered on the next poll.
pub trait SessionHandler {
    fn on_session_data(&mut self, data: &[u8], meta: &FragmentMeta) -> Action;
}
