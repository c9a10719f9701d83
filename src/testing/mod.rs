//! In-memory fixtures for driving clusters and libraries in tests.
//!
//! Everything here is single-threaded and deterministic: loopback streams
//! with frame-loss and back-pressure injection, an in-memory archive, and
//! recording collaborators. Production transports live outside this crate.

mod fixtures;
mod loopback;

pub use fixtures::CollectingEvents;
pub use fixtures::MemoryArchive;
pub use fixtures::RecordingSessionHandler;
pub use loopback::EngineStub;
pub use loopback::LibraryLoopback;
pub use loopback::LoopbackNetwork;
