//! Gap detection.
//!
//! A gap is an inclusive range of sequence numbers a peer does not hold.
//! Each gap carries heuristic reasons describing how it probably arose.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Interior gaps shorter than this are attributed to a peer going offline.
pub const SHORT_GAP_THRESHOLD: u64 = 10;

/// Why a range of blocks is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    /// The local peer joined after these blocks were written.
    LateJoin,
    /// The author was briefly unreachable.
    PeerOffline,
    /// The mesh was split for longer than a chunk's worth of blocks.
    NetworkPartition,
    /// Blocks were lost locally.
    StorageCorruption,
    /// A sync session gave up before covering the range.
    SyncTimeout,
    /// No heuristic applied.
    Unknown,
}

/// An inclusive range of missing sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRange {
    pub start: u64,
    pub end: u64,
    pub reasons: BTreeSet<GapReason>,
    /// When the gap was detected (Unix milliseconds).
    pub detected_at: i64,
}

impl GapRange {
    pub fn new(
        start: u64,
        end: u64,
        reasons: impl IntoIterator<Item = GapReason>,
        detected_at: i64,
    ) -> Self {
        Self {
            start,
            end,
            reasons: reasons.into_iter().collect(),
            detected_at,
        }
    }

    /// Number of missing blocks.
    pub fn missing_blocks(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn contains(&self, seq: u64) -> bool {
        (self.start..=self.end).contains(&seq)
    }

    pub fn has_reason(&self, reason: GapReason) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Find the missing ranges in a set of held sequence numbers.
///
/// `sequence_numbers` may be unsorted and contain duplicates. `expected_end`
/// is the highest sequence number the chain is known to reach.
///
/// Rules:
/// - nothing held and `expected_end > 0`: one gap `[0, expected_end]`, late join
/// - range before the first held block: late join
/// - interior range: network partition if `end - start > chunk_size`, peer
///   offline if `end - start < 10`, unknown if neither applies
/// - range after the last held block up to `expected_end`: both peer offline
///   and network partition
pub fn detect_gaps(
    sequence_numbers: &[u64],
    expected_end: u64,
    chunk_size: u64,
    detected_at: i64,
) -> Vec<GapRange> {
    let mut seqs = sequence_numbers.to_vec();
    seqs.sort_unstable();
    seqs.dedup();

    let mut gaps = Vec::new();

    let (first, last) = match (seqs.first(), seqs.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            if expected_end > 0 {
                gaps.push(GapRange::new(0, expected_end, [GapReason::LateJoin], detected_at));
            }
            return gaps;
        }
    };

    if first > 0 {
        gaps.push(GapRange::new(0, first - 1, [GapReason::LateJoin], detected_at));
    }

    for pair in seqs.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next - prev <= 1 {
            continue;
        }

        let start = prev + 1;
        let end = next - 1;
        let span = end - start;

        let mut reasons = BTreeSet::new();
        if span > chunk_size {
            reasons.insert(GapReason::NetworkPartition);
        }
        if span < SHORT_GAP_THRESHOLD {
            reasons.insert(GapReason::PeerOffline);
        }
        if reasons.is_empty() {
            reasons.insert(GapReason::Unknown);
        }

        gaps.push(GapRange {
            start,
            end,
            reasons,
            detected_at,
        });
    }

    if last < expected_end {
        gaps.push(GapRange::new(
            last + 1,
            expected_end,
            [GapReason::PeerOffline, GapReason::NetworkPartition],
            detected_at,
        ));
    }

    gaps
}

/// Total number of missing blocks across all gaps.
pub fn total_gap_blocks(gaps: &[GapRange]) -> u64 {
    gaps.iter().map(GapRange::missing_blocks).sum()
}
