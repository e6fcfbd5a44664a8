//! Replication engine: decides how to react to inbound peer messages and
//! maintains the last-known-context slot that survives reconnection.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::PeerError;
use crate::sync::envelope::{Command, StateSnapshotPayload, SyncEnvelope};

pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Duplex channel abstraction to the paired peer. Implementations may be
/// backed by Bluetooth, a local socket, or (in tests) an in-memory queue.
pub trait PeerChannel: Send + Sync {
    fn send(&self, envelope: &SyncEnvelope) -> Result<(), PeerError>;
    fn try_recv(&self) -> Option<SyncEnvelope>;
    fn is_reachable(&self) -> bool;
}

/// What the caller (Orchestrator) should do in response to an inbound
/// message. PeerSync decides; applying the effect is the caller's job so
/// this type stays decoupled from the authoritative config.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundResolution {
    ApplySnapshot { payload: StateSnapshotPayload, revision: u64 },
    ApplyCommand(Command),
    RespondPong,
    Drop,
}

/// Latest-writer-wins tie-break hook (Open Question resolution): a later
/// revision always wins; on equal revisions the later timestamp wins; on
/// an exact tie in both, the inbound message is dropped.
pub fn should_apply_inbound(
    local_revision: u64,
    local_timestamp: f64,
    incoming_revision: u64,
    incoming_timestamp: f64,
) -> bool {
    if incoming_revision > local_revision {
        true
    } else if incoming_revision < local_revision {
        false
    } else if incoming_timestamp > local_timestamp {
        true
    } else {
        false
    }
}

pub struct PeerSync<C: PeerChannel> {
    channel: C,
    last_known_context: Arc<RwLock<Option<SyncEnvelope>>>,
}

impl<C: PeerChannel> PeerSync<C> {
    pub fn new(channel: C) -> Self {
        Self { channel, last_known_context: Arc::new(RwLock::new(None)) }
    }

    pub fn is_reachable(&self) -> bool {
        self.channel.is_reachable()
    }

    /// Broadcast the caller's current authoritative snapshot. Always
    /// updates the last-known-context slot, even if the channel is
    /// currently unreachable, so reconnection can re-sync from it.
    pub fn publish_snapshot(&self, envelope: SyncEnvelope) -> Result<(), PeerError> {
        *self.last_known_context.write().expect("last_known_context poisoned") = Some(envelope.clone());
        self.channel.send(&envelope)
    }

    pub fn last_known_context(&self) -> Option<SyncEnvelope> {
        self.last_known_context.read().expect("last_known_context poisoned").clone()
    }

    /// Poll the channel for one inbound message and decide how the caller
    /// should react, given the caller's current local revision/timestamp.
    pub fn poll_inbound(&self, local_revision: u64, local_timestamp: f64) -> Option<InboundResolution> {
        let envelope = self.channel.try_recv()?;
        Some(self.resolve(envelope, local_revision, local_timestamp))
    }

    fn resolve(&self, envelope: SyncEnvelope, local_revision: u64, local_timestamp: f64) -> InboundResolution {
        match envelope {
            SyncEnvelope::StateSnapshot { timestamp, revision, payload } | SyncEnvelope::Pong { timestamp, revision, payload } => {
                if should_apply_inbound(local_revision, local_timestamp, revision, timestamp) {
                    InboundResolution::ApplySnapshot { payload, revision }
                } else {
                    InboundResolution::Drop
                }
            }
            SyncEnvelope::CommandMessage { command, .. } => InboundResolution::ApplyCommand(command),
            SyncEnvelope::Ping { .. } => InboundResolution::RespondPong,
        }
    }
}

/// In-memory duplex channel for tests: two halves sharing a pair of
/// bounded queues, so a test can simulate both ends of a pairing.
pub struct InMemoryPeerChannel {
    outbound: std::sync::Mutex<std::collections::VecDeque<SyncEnvelope>>,
    inbound: std::sync::Mutex<std::collections::VecDeque<SyncEnvelope>>,
    reachable: std::sync::atomic::AtomicBool,
}

impl InMemoryPeerChannel {
    pub fn new_pair() -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self {
            outbound: std::sync::Mutex::new(Default::default()),
            inbound: std::sync::Mutex::new(Default::default()),
            reachable: std::sync::atomic::AtomicBool::new(true),
        });
        let b = Arc::new(Self {
            outbound: std::sync::Mutex::new(Default::default()),
            inbound: std::sync::Mutex::new(Default::default()),
            reachable: std::sync::atomic::AtomicBool::new(true),
        });
        (a, b)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, std::sync::atomic::Ordering::SeqCst);
    }

    /// Move messages sent by `self` into `other`'s inbound queue.
    pub fn deliver_to(&self, other: &InMemoryPeerChannel) {
        let mut out = self.outbound.lock().expect("outbound poisoned");
        let mut inb = other.inbound.lock().expect("inbound poisoned");
        inb.extend(out.drain(..));
    }
}

impl PeerChannel for Arc<InMemoryPeerChannel> {
    fn send(&self, envelope: &SyncEnvelope) -> Result<(), PeerError> {
        if !self.reachable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PeerError::PeerUnreachable);
        }
        self.outbound.lock().expect("outbound poisoned").push_back(envelope.clone());
        Ok(())
    }

    fn try_recv(&self) -> Option<SyncEnvelope> {
        self.inbound.lock().expect("inbound poisoned").pop_front()
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{MetronomeConfig, TimeSignature};

    #[test]
    fn test_higher_revision_wins() {
        assert!(should_apply_inbound(5, 100.0, 6, 50.0));
    }

    #[test]
    fn test_lower_revision_dropped() {
        assert!(!should_apply_inbound(5, 100.0, 4, 999.0));
    }

    #[test]
    fn test_tie_prefers_later_timestamp() {
        assert!(should_apply_inbound(5, 100.0, 5, 101.0));
        assert!(!should_apply_inbound(5, 100.0, 5, 99.0));
    }

    #[test]
    fn test_exact_tie_dropped() {
        assert!(!should_apply_inbound(5, 100.0, 5, 100.0));
    }

    #[test]
    fn test_publish_then_deliver_then_resolve() {
        let (a, b) = InMemoryPeerChannel::new_pair();
        let sync_a = PeerSync::new(a.clone());

        let config = MetronomeConfig::new(150, TimeSignature::new(4, 4));
        let payload = StateSnapshotPayload::from_config(&config, true);
        let envelope = SyncEnvelope::StateSnapshot { timestamp: 10.0, revision: 1, payload };
        sync_a.publish_snapshot(envelope).unwrap();
        a.deliver_to(&b);

        let sync_b = PeerSync::new(b.clone());
        let resolution = sync_b.poll_inbound(0, 0.0).unwrap();
        match resolution {
            InboundResolution::ApplySnapshot { revision, .. } => assert_eq!(revision, 1),
            other => panic!("expected ApplySnapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_still_updates_last_known_context() {
        let (a, _b) = InMemoryPeerChannel::new_pair();
        a.set_reachable(false);
        let sync_a = PeerSync::new(a);

        let config = MetronomeConfig::new(100, TimeSignature::new(4, 4));
        let payload = StateSnapshotPayload::from_config(&config, false);
        let envelope = SyncEnvelope::StateSnapshot { timestamp: 1.0, revision: 1, payload };
        let result = sync_a.publish_snapshot(envelope);
        assert!(result.is_err());
        assert!(sync_a.last_known_context().is_some());
    }

    #[test]
    fn test_ping_triggers_pong_response() {
        let (a, b) = InMemoryPeerChannel::new_pair();
        a.send(&SyncEnvelope::Ping { timestamp: 1.0, revision: 0 }).unwrap();
        a.deliver_to(&b);
        let sync_b = PeerSync::new(b);
        assert_eq!(sync_b.poll_inbound(0, 0.0), Some(InboundResolution::RespondPong));
    }
}
