use crate::types::Position;

/// Derives the committed position from the positions acknowledged across the
/// cluster, the leader's own position included.
///
/// Implementations must be monotone: for inputs that only ever grow, the
/// returned position never decreases.
pub trait AcknowledgementStrategy {
    /// The greatest position safe to commit.
    ///
    /// `acknowledged` holds one entry per cluster member that has reported a
    /// position; it may be reordered in place. Returns 0 when too few members
    /// have reported.
    fn safe_position(&self, acknowledged: &mut [Position]) -> Position;
}

/// Majority quorum: the k-th highest acknowledged position with
/// `k = cluster_size / 2 + 1`.
///
/// In a three-node cluster the leader plus one follower commit an entry.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct QuorumStrategy {
    cluster_size: usize,
}

impl QuorumStrategy {
    pub fn new(cluster_size: usize) -> Self {
        debug_assert!(cluster_size > 0);
        Self { cluster_size }
    }

    pub fn quorum(&self) -> usize {
        self.cluster_size / 2 + 1
    }
}

impl AcknowledgementStrategy for QuorumStrategy {
    fn safe_position(&self, acknowledged: &mut [Position]) -> Position {
        let quorum = self.quorum();
        if acknowledged.len() < quorum {
            return 0;
        }

        acknowledged.sort_unstable_by(|a, b| b.cmp(a));
        acknowledged[quorum - 1]
    }
}

/// Commit only what every cluster member has acknowledged.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct EntireClusterStrategy {
    cluster_size: usize,
}

impl EntireClusterStrategy {
    pub fn new(cluster_size: usize) -> Self {
        debug_assert!(cluster_size > 0);
        Self { cluster_size }
    }
}

impl AcknowledgementStrategy for EntireClusterStrategy {
    fn safe_position(&self, acknowledged: &mut [Position]) -> Position {
        if acknowledged.len() < self.cluster_size {
            return 0;
        }

        acknowledged.iter().copied().min().unwrap_or(0)
    }
}
