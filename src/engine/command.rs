//! Admin commands into the engine's polling thread.
//!
//! A command object is enqueued from an admin thread over an SPSC channel,
//! executed on the polling thread, and answered through a single write-once
//! response slot. The submitting thread waits under an idle strategy; the
//! polling thread never blocks.

use std::sync::Arc;
use std::sync::OnceLock;

use crate::cluster::ClusterAgent;
use crate::cluster::ClusterSnapshot;
use crate::idle::IdleStrategy;

/// Ask the polling thread for the node's current cluster state.
#[derive(Clone, Debug, Default)]
pub struct QueryClusterState {
    response: Arc<OnceLock<ClusterSnapshot>>,
}

impl QueryClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run on the polling thread.
    pub fn execute(&self, agent: &ClusterAgent) {
        // A duplicate execution keeps the first answer.
        let _ = self.response.set(agent.snapshot());
    }

    /// Non-blocking read of the response slot.
    pub fn try_response(&self) -> Option<ClusterSnapshot> {
        self.response.get().copied()
    }

    /// Wait for the polling thread to answer, idling in between.
    pub fn await_response(&self, idle: &mut dyn IdleStrategy) -> ClusterSnapshot {
        loop {
            if let Some(snapshot) = self.try_response() {
                idle.reset();
                return snapshot;
            }
            idle.idle(0);
        }
    }
}
