//! Scalar identifiers shared across the gateway.
//!
//! The widths are fixed by the control wire format: node ids travel as
//! `i16`, terms as `i32`, session ids as `i32` and positions as `i64`.

use std::fmt;

/// Unique identifier of a cluster member. Small and positive.
pub type NodeId = i16;

/// Raft-style logical clock of leadership attempts. Monotone per node.
pub type Term = i32;

/// Byte offset into the leader's logical log.
///
/// Positions are monotone non-decreasing per node and are the unit of
/// acknowledgement and commit.
pub type Position = i64;

/// Identifier of a publication session on the transport.
pub type SessionId = i32;

/// Correlation id for library request/reply pairs.
pub type CorrelationId = i64;

/// Identifier of a library process.
pub type LibraryId = i32;

/// Which of the three cluster roles is currently active.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub enum RoleKind {
    #[default]
    Follower,
    Candidate,
    Leader,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Follower => write!(f, "F"),
            RoleKind::Candidate => write!(f, "C"),
            RoleKind::Leader => write!(f, "L"),
        }
    }
}
