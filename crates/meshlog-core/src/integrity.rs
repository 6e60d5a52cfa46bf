//! Chain integrity scoring.
//!
//! A 0-100 heuristic combining how many peers hold the chain with how much of
//! it is free of gaps. Scoring never fails; missing data lowers the score.

use serde::Serialize;

use crate::chain::{ChainState, Chunk};

const PEER_WEIGHT: f64 = 0.4;
const COMPLETENESS_WEIGHT: f64 = 0.6;

/// Coarse verification level derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Verified,
    Partial,
    Degraded,
    Unverified,
}

impl IntegrityStatus {
    /// Classify a score. Verified additionally requires an empty gap list.
    pub fn classify(score: u8, has_gaps: bool) -> Self {
        if score >= 90 && !has_gaps {
            Self::Verified
        } else if score >= 70 {
            Self::Partial
        } else if score >= 40 {
            Self::Degraded
        } else {
            Self::Unverified
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Verified => "Chain is complete and widely replicated",
            Self::Partial => "Chain is mostly complete with minor gaps or limited replication",
            Self::Degraded => "Chain has significant gaps or few replicas",
            Self::Unverified => "Chain integrity cannot be verified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityScore {
    /// 0..=100
    pub score: u8,
    pub status: IntegrityStatus,
    pub description: &'static str,
}

/// Full integrity view of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityInfo {
    pub state: ChainState,
    pub chunks: Vec<Chunk>,
    pub score: IntegrityScore,
}

/// Score a chain against the number of peers expected to hold it.
pub fn integrity_score(state: &ChainState, total_peers: u32) -> IntegrityScore {
    let peer_coverage = if total_peers == 0 {
        0.0
    } else {
        (f64::from(state.peer_count) / f64::from(total_peers)).clamp(0.0, 1.0)
    };

    let total_blocks = state.total_blocks();
    let completeness = if total_blocks == 0 {
        1.0
    } else {
        (1.0 - state.gap_blocks() as f64 / total_blocks as f64).clamp(0.0, 1.0)
    };

    let raw = (peer_coverage * PEER_WEIGHT + completeness * COMPLETENESS_WEIGHT) * 100.0;
    let score = raw.round().clamp(0.0, 100.0) as u8;
    let status = IntegrityStatus::classify(score, !state.gaps.is_empty());

    IntegrityScore {
        score,
        status,
        description: status.description(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaps::{GapRange, GapReason};
    use crate::types::ChainId;
    use proptest::prelude::*;

    fn state(latest: Option<u64>, peers: u32, gaps: Vec<GapRange>) -> ChainState {
        let mut state = ChainState::new(ChainId::from("room"));
        state.latest_block = latest;
        state.peer_count = peers;
        state.gaps = gaps;
        state
    }

    #[test]
    fn test_fully_replicated_complete_chain() {
        let score = integrity_score(&state(Some(99), 4, vec![]), 4);
        assert_eq!(score.score, 100);
        assert_eq!(score.status, IntegrityStatus::Verified);
    }

    #[test]
    fn test_empty_chain_counts_as_complete() {
        let score = integrity_score(&state(None, 1, vec![]), 2);
        // 0.5 * 0.4 + 1.0 * 0.6 = 0.8
        assert_eq!(score.score, 80);
        assert_eq!(score.status, IntegrityStatus::Partial);
    }

    #[test]
    fn test_zero_total_peers() {
        let score = integrity_score(&state(Some(9), 1, vec![]), 0);
        assert_eq!(score.score, 60);
        assert_eq!(score.status, IntegrityStatus::Degraded);
    }

    #[test]
    fn test_gaps_block_verified() {
        // 1 of 100 blocks missing: 0.4 + 0.99 * 0.6 = 0.994 -> 99
        let gaps = vec![GapRange::new(50, 50, [GapReason::PeerOffline], 0)];
        let score = integrity_score(&state(Some(99), 3, gaps), 3);
        assert_eq!(score.score, 99);
        assert_eq!(score.status, IntegrityStatus::Partial);
    }

    #[test]
    fn test_coverage_is_clamped() {
        let score = integrity_score(&state(Some(0), 10, vec![]), 2);
        assert_eq!(score.score, 100);
    }

    #[test]
    fn test_unverified() {
        let gaps = vec![GapRange::new(0, 98, [GapReason::LateJoin], 0)];
        let score = integrity_score(&state(Some(99), 0, gaps), 5);
        assert_eq!(score.status, IntegrityStatus::Unverified);
        assert_eq!(score.description, IntegrityStatus::Unverified.description());
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_gap_size(
            latest in 1u64..1000,
            a in 0u64..1000,
            b in 0u64..1000,
            peers in 0u32..10,
            total in 0u32..10,
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let small = small.min(latest);
            let large = large.min(latest);

            let gap = |len: u64| {
                if len == 0 {
                    vec![]
                } else {
                    vec![GapRange::new(0, len - 1, [GapReason::LateJoin], 0)]
                }
            };

            let s_small = integrity_score(&state(Some(latest), peers, gap(small)), total);
            let s_large = integrity_score(&state(Some(latest), peers, gap(large)), total);
            prop_assert!(s_large.score <= s_small.score);
            prop_assert!(s_small.score <= 100);
        }
    }
}
