//! Bidirectional state replication with a paired peer (e.g. a companion
//! wearable), using latest-writer-wins conflict resolution over an
//! unordered, at-most-once duplex channel.

pub mod envelope;
pub mod peer_sync;

pub use envelope::{Command, SyncEnvelope};
pub use peer_sync::{InboundResolution, PeerChannel, PeerSync};
