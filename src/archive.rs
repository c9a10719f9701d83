//! Message archival collaborators.
//!
//! Archival and replay storage is external to the core: the leader streams
//! archive-durable bytes onto its data publication and reads ranges back to
//! serve resend requests, a follower archives what the leader replicates.

use crate::types::Position;

/// Writes the replicated stream to durable storage.
pub trait Archiver {
    /// Append `data` ending at `end_position` of the logical log.
    fn archive(&mut self, data: &[u8], end_position: Position);

    /// The committed position advanced; bytes up to it may be released to
    /// readers and replay.
    fn on_commit(&mut self, commit_position: Position);
}

/// Reads back ranges of the archived stream.
pub trait ArchiveReader {
    /// Highest position for which durable bytes exist.
    fn durable_position(&self) -> Position;

    /// Copy `[start, start + length)` into `dst`, returning the bytes read.
    ///
    /// Returns 0 when the range is not (or no longer) available.
    fn read(&mut self, start: Position, length: usize, dst: &mut Vec<u8>) -> usize;
}
