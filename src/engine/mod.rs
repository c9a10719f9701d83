//! Engine-side plumbing around the cluster agent.

mod command;

pub use command::QueryClusterState;
