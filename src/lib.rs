//! # fixgate
//!
//! The replicated core of a FIX gateway.
//!
//! Library processes own FIX sessions and delegate connection management,
//! message archival and failover to a cluster of engine processes. Engines
//! replicate the FIX message stream through a Raft-style consensus protocol
//! over a broadcast transport, so that on leader failure another engine
//! continues serving libraries without data loss.
//!
//! The crate has three pillars:
//!
//! - [`cluster`]: the role state machine ([`cluster::ClusterAgent`] driving
//!   Leader / Candidate / Follower), the shared [`cluster::TermState`] and
//!   the control wire protocol;
//! - [`library`]: the client-side [`library::LibraryPoller`] handling leader
//!   detection, engine failover and reply correlation;
//! - [`codec`]: the zero-copy ASCII codec feeding the hot path.
//!
//! Everything is single-threaded cooperative: one thread drives
//! `poll(fragment_limit, now_ms)` and nothing inside ever blocks. Callers
//! that want blocking semantics wrap a poll in an [`idle`] strategy loop.
//!
//! External collaborators stay opaque behind traits: the FIX session state
//! machine ([`session::SessionHandler`]), archival storage
//! ([`archive::Archiver`] / [`archive::ArchiveReader`]) and the transport
//! ([`transport::RaftTransport`]).

pub mod archive;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod idle;
pub mod library;
pub mod session;
pub mod testing;
pub mod transport;
pub mod types;

pub use anyerror;
pub use anyerror::AnyError;

pub use crate::cluster::ClusterAgent;
pub use crate::cluster::TermState;
pub use crate::codec::AsciiSlice;
pub use crate::codec::AsciiSliceMut;
pub use crate::codec::DecimalFloat;
pub use crate::config::Config;
pub use crate::config::ConfigError;
pub use crate::config::LibraryConfig;
pub use crate::error::Fatal;
pub use crate::library::LibraryPoller;
pub use crate::types::NodeId;
pub use crate::types::Position;
pub use crate::types::RoleKind;
pub use crate::types::SessionId;
pub use crate::types::Term;
