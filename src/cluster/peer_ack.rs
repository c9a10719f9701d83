use crate::types::NodeId;
use crate::types::Position;

/// The highest position each follower has acknowledged, leader-side.
///
/// A flat vector keyed by node id: cluster sizes are single digits, linear
/// scans beat hashing. Entries only ever increase; stale acknowledgements are
/// dropped at the update site.
#[derive(Clone, Debug, Default)]
#[derive(PartialEq, Eq)]
pub(crate) struct PeerAck {
    entries: Vec<(NodeId, Position)>,
}

impl PeerAck {
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Merge an acknowledgement, keeping the maximum per node.
    pub(crate) fn update_max(&mut self, node_id: NodeId, position: Position) {
        for entry in &mut self.entries {
            if entry.0 == node_id {
                entry.1 = entry.1.max(position);
                return;
            }
        }
        self.entries.push((node_id, position));
    }

    #[allow(dead_code)]
    pub(crate) fn get(&self, node_id: NodeId) -> Option<Position> {
        self.entries.iter().find(|(id, _)| *id == node_id).map(|(_, p)| *p)
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Fill `dst` with every acknowledged position plus `self_position`.
    pub(crate) fn positions_with_own(&self, self_position: Position, dst: &mut Vec<Position>) {
        dst.clear();
        dst.push(self_position);
        dst.extend(self.entries.iter().map(|(_, p)| *p));
    }
}
