//! The library side of the gateway.
//!
//! A library process owns FIX sessions; the [`LibraryPoller`] keeps it
//! attached to whichever engine currently leads the cluster, failing over on
//! `NotLeader` redirects and on silence. Every request/reply pair is
//! correlated by id; nothing blocks.

mod message;
mod poller;
mod reply;

#[cfg(test)] mod message_test;

pub use message::gateway_error;
pub use message::LibraryMessage;
pub use message::LogonStatus;
pub use message::SessionReplyStatus;
pub use message::GATEWAY_LIBRARY_ID;
pub use poller::InitiateConfiguration;
pub use poller::InitiatedSession;
pub use poller::LibraryHandler;
pub use poller::LibraryPoller;
pub use poller::LibraryStartError;
pub use poller::LibraryStreams;
pub use poller::LibraryTransport;
pub use reply::ReplyHandle;
pub use reply::ReplyState;
