//! Peer tracking.
//!
//! A pure in-memory view of the peers seen this session. Nothing here is
//! persisted; a restart begins with an empty tracker.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use meshlog_core::PeerId;

/// Inclusive range of sequence numbers a peer advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn contains(&self, seq: u64) -> bool {
        (self.start..=self.end).contains(&seq)
    }
}

/// What we know about one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub display_name: Option<String>,
    pub block_range: Option<BlockRange>,
    pub complete_chunk_ids: BTreeSet<u64>,
    /// Unix ms.
    pub last_seen: i64,
    pub online: bool,
}

impl PeerInfo {
    /// An online peer with nothing advertised yet.
    pub fn new(peer_id: PeerId, last_seen: i64) -> Self {
        Self {
            peer_id,
            display_name: None,
            block_range: None,
            complete_chunk_ids: BTreeSet::new(),
            last_seen,
            online: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_block_range(mut self, start: u64, end: u64) -> Self {
        self.block_range = Some(BlockRange { start, end });
        self
    }

    /// Highest sequence number the peer advertises.
    pub fn latest_sequence(&self) -> Option<u64> {
        self.block_range.map(|r| r.end)
    }
}

/// Session-scoped registry of peers.
#[derive(Debug, Default)]
pub struct PeerTracker {
    peers: HashMap<PeerId, PeerInfo>,
}

impl PeerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a peer record.
    pub fn update_peer(&mut self, info: PeerInfo) {
        tracing::debug!(peer = %info.peer_id, online = info.online, "peer updated");
        self.peers.insert(info.peer_id.clone(), info);
    }

    /// Mark a peer offline. Unknown peers are ignored.
    pub fn mark_offline(&mut self, peer_id: &PeerId, now: i64) {
        if let Some(info) = self.peers.get_mut(peer_id) {
            info.online = false;
            info.last_seen = now;
            tracing::debug!(peer = %peer_id, "peer offline");
        }
    }

    /// Number of online peers.
    pub fn peer_count(&self) -> usize {
        self.peers.values().filter(|p| p.online).count()
    }

    /// Online peers, ordered by peer id.
    pub fn online_peers(&self) -> Vec<&PeerInfo> {
        let mut peers: Vec<&PeerInfo> = self.peers.values().filter(|p| p.online).collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(peer_id)
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<PeerInfo> {
        self.peers.remove(peer_id)
    }

    /// Forget every peer.
    pub fn reset(&mut self) {
        self.peers.clear();
    }

    /// Online peers whose advertised range covers `seq`.
    pub fn peers_with_block(&self, seq: u64) -> Vec<&PeerInfo> {
        self.online_peers()
            .into_iter()
            .filter(|p| p.block_range.is_some_and(|r| r.contains(seq)))
            .collect()
    }

    /// The online peer advertising the furthest chain beyond `local_latest`.
    ///
    /// Ties go to the lowest peer id so the choice is stable.
    pub fn best_sync_candidate(&self, local_latest: Option<u64>) -> Option<&PeerInfo> {
        self.online_peers()
            .into_iter()
            .filter(|p| match (p.latest_sequence(), local_latest) {
                (Some(theirs), Some(ours)) => theirs > ours,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .fold(None, |best: Option<&PeerInfo>, p| match best {
                Some(b) if b.latest_sequence() >= p.latest_sequence() => Some(b),
                _ => Some(p),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> PeerInfo {
        PeerInfo::new(PeerId::new(id), 1000)
    }

    #[test]
    fn test_update_and_count() {
        let mut tracker = PeerTracker::new();
        tracker.update_peer(peer("alice"));
        tracker.update_peer(peer("bob").with_display_name("Bob"));
        tracker.update_peer(peer("alice").with_block_range(0, 5));

        assert_eq!(tracker.peer_count(), 2);
        let alice = tracker.get(&PeerId::new("alice")).unwrap();
        assert_eq!(alice.latest_sequence(), Some(5));
    }

    #[test]
    fn test_mark_offline() {
        let mut tracker = PeerTracker::new();
        tracker.update_peer(peer("alice"));
        tracker.update_peer(peer("bob"));

        tracker.mark_offline(&PeerId::new("bob"), 2000);
        tracker.mark_offline(&PeerId::new("nobody"), 2000);

        assert_eq!(tracker.peer_count(), 1);
        let bob = tracker.get(&PeerId::new("bob")).unwrap();
        assert!(!bob.online);
        assert_eq!(bob.last_seen, 2000);

        let online: Vec<&str> = tracker.online_peers().iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(online, vec!["alice"]);
    }

    #[test]
    fn test_peers_with_block() {
        let mut tracker = PeerTracker::new();
        tracker.update_peer(peer("a").with_block_range(0, 10));
        tracker.update_peer(peer("b").with_block_range(5, 20));
        tracker.update_peer(peer("c"));
        let mut offline = peer("d").with_block_range(0, 100);
        offline.online = false;
        tracker.update_peer(offline);

        let ids: Vec<&str> = tracker
            .peers_with_block(7)
            .iter()
            .map(|p| p.peer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(tracker.peers_with_block(50).is_empty());
    }

    #[test]
    fn test_best_sync_candidate() {
        let mut tracker = PeerTracker::new();
        tracker.update_peer(peer("a").with_block_range(0, 10));
        tracker.update_peer(peer("b").with_block_range(0, 20));
        tracker.update_peer(peer("c").with_block_range(0, 20));

        let best = tracker.best_sync_candidate(Some(5)).unwrap();
        assert_eq!(best.peer_id.as_str(), "b");
        assert!(tracker.best_sync_candidate(Some(20)).is_none());
        assert!(tracker.best_sync_candidate(None).is_some());
    }

    #[test]
    fn test_remove_and_reset() {
        let mut tracker = PeerTracker::new();
        tracker.update_peer(peer("a"));
        tracker.update_peer(peer("b"));

        assert!(tracker.remove(&PeerId::new("a")).is_some());
        assert!(tracker.remove(&PeerId::new("a")).is_none());
        assert_eq!(tracker.peer_count(), 1);

        tracker.reset();
        assert_eq!(tracker.peer_count(), 0);
    }
}
