//! Engine and library runtime configuration.

use std::str::FromStr;

use anyerror::AnyError;
use clap::Parser;

use crate::config::error::ConfigError;
use crate::types::LibraryId;
use crate::types::NodeId;

/// Parse number with unit such as 64 KiB.
fn parse_bytes_with_unit(src: &str) -> Result<u64, ConfigError> {
    let res = byte_unit::Byte::from_str(src).map_err(|e| ConfigError::InvalidNumber {
        invalid: src.to_string(),
        reason: e.to_string(),
    })?;

    Ok(res.as_u64())
}

/// Runtime configuration for a cluster engine node.
///
/// Create a configuration, optionally customise fields, validate it, and pass
/// it to [`ClusterAgent::new`](crate::cluster::ClusterAgent::new):
///
/// ```ignore
/// let config = Config {
///     node_id: 1,
///     other_nodes: vec![2, 3],
///     timeout_interval_ms: 1_000,
///     ..Default::default()
/// }
/// .validate()?;
/// ```
///
/// The leader timeout drives everything else: heartbeats go out at a fifth of
/// it and election deadlines are staggered in `[timeout, 2 × timeout)`.
#[derive(Clone, Debug, Parser)]
#[derive(PartialEq, Eq)]
pub struct Config {
    /// The id of this node within the cluster.
    #[clap(long, default_value = "1")]
    pub node_id: NodeId,

    /// The ids of every other cluster member.
    #[clap(long, value_delimiter = ',')]
    pub other_nodes: Vec<NodeId>,

    /// How long a follower waits without hearing the leader before standing
    /// for election, in milliseconds.
    #[clap(long, default_value = "1000")]
    pub timeout_interval_ms: u64,

    /// The maximum number of fragments a single poll may process.
    #[clap(long, default_value = "10")]
    pub fragment_limit: usize,

    /// The largest data fragment the leader emits when streaming the archive.
    #[clap(long, default_value = "64 KiB", value_parser = parse_bytes_with_unit)]
    pub max_fragment_bytes: u64,

    /// Seed for the node's random number generator.
    ///
    /// Fixing it makes election jitter deterministic; mainly used by tests.
    #[clap(long)]
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl Config {
    /// Build a `Config` instance from a series of command line arguments.
    ///
    /// The first element in `args` must be the application name.
    pub fn build(args: &[&str]) -> Result<Config, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::from(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;
        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<Config, ConfigError> {
        if self.node_id <= 0 {
            return Err(ConfigError::NodeIdNotPositive { node_id: self.node_id });
        }

        for (i, other) in self.other_nodes.iter().enumerate() {
            if *other <= 0 {
                return Err(ConfigError::NodeIdNotPositive { node_id: *other });
            }
            if *other == self.node_id {
                return Err(ConfigError::OtherNodesContainSelf { node_id: self.node_id });
            }
            if self.other_nodes[..i].contains(other) {
                return Err(ConfigError::DuplicateOtherNode { node_id: *other });
            }
        }

        if self.timeout_interval_ms == 0 {
            return Err(ConfigError::TimeoutIntervalIsZero);
        }

        if self.max_fragment_bytes == 0 {
            return Err(ConfigError::MaxFragmentBytesIsZero);
        }

        Ok(self)
    }

    /// Total cluster size, this node included.
    pub fn cluster_size(&self) -> usize {
        self.other_nodes.len() + 1
    }
}

/// Runtime configuration for a library process.
#[derive(Clone, Debug, Parser)]
#[derive(PartialEq, Eq)]
pub struct LibraryConfig {
    /// The id of this library.
    #[clap(long, default_value = "1")]
    pub library_id: LibraryId,

    /// Engine endpoints, in failover order.
    #[clap(long, value_delimiter = ',')]
    pub engine_channels: Vec<String>,

    /// How long to wait for an engine reply before failing it over, in
    /// milliseconds. Connect resends and heartbeats go out at a quarter of
    /// this.
    #[clap(long, default_value = "2000")]
    pub reply_timeout_ms: u64,

    /// How many engine rotations to attempt before giving up a connect.
    #[clap(long, default_value = "10")]
    pub reconnect_attempts: u32,

    /// Seed for the library's random number generator.
    #[clap(long)]
    pub rng_seed: Option<u64>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl LibraryConfig {
    /// Build a `LibraryConfig` instance from command line arguments.
    pub fn build(args: &[&str]) -> Result<LibraryConfig, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::from(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;
        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<LibraryConfig, ConfigError> {
        if self.library_id <= 0 {
            return Err(ConfigError::LibraryIdNotPositive {
                library_id: self.library_id,
            });
        }

        if self.engine_channels.is_empty() {
            return Err(ConfigError::NoEngineChannels);
        }

        if self.reply_timeout_ms == 0 {
            return Err(ConfigError::ReplyTimeoutIsZero);
        }

        Ok(self)
    }
}
