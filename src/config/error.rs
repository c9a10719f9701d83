use anyerror::AnyError;

use crate::types::NodeId;

/// Error variants related to configuration.
///
/// All of them are fatal at construction time.
#[derive(Debug, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to parse configuration from command-line arguments.
    #[error("ParseError: {source} while parsing ({args:?})")]
    ParseError {
        source: AnyError,
        args: Vec<String>,
    },

    /// Node ids must be small positive integers.
    #[error("node id must be positive, got {node_id}")]
    NodeIdNotPositive { node_id: NodeId },

    /// A node must not list itself among its peers.
    #[error("other_nodes contains this node's own id {node_id}")]
    OtherNodesContainSelf { node_id: NodeId },

    /// Peer lists must not repeat an id.
    #[error("other_nodes contains duplicate id {node_id}")]
    DuplicateOtherNode { node_id: NodeId },

    /// The leader timeout drives every other interval and must be non-zero.
    #[error("timeout_interval_ms must be > 0")]
    TimeoutIntervalIsZero,

    /// Replicated fragments must be able to carry at least one byte.
    #[error("max_fragment_bytes must be > 0")]
    MaxFragmentBytesIsZero,

    /// Failed to parse a number from string.
    #[error("{reason} when parsing {invalid:?}")]
    InvalidNumber { invalid: String, reason: String },

    /// A library must know at least one engine channel.
    #[error("at least one engine channel is required")]
    NoEngineChannels,

    /// Library ids must be positive.
    #[error("library id must be positive, got {library_id}")]
    LibraryIdNotPositive { library_id: i32 },

    /// Reply timeouts drive the connect and liveness cadence and must be
    /// non-zero.
    #[error("reply_timeout_ms must be > 0")]
    ReplyTimeoutIsZero,
}
