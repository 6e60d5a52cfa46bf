//! Sync protocol message types.
//!
//! A requester announces the highest sequence number it holds; the responder
//! answers with the next batch of blocks and a Merkle digest over them.

use serde::{Deserialize, Serialize};

use meshlog_core::{Block, ChainId, Digest, Payload, PeerId};

/// Message size limits.
pub mod limits {
    /// Max blocks in one SyncResponse.
    pub const MAX_BLOCKS_PER_RESPONSE: usize = 50;
}

/// Default number of blocks per response.
pub const DEFAULT_BATCH_SIZE: usize = limits::MAX_BLOCKS_PER_RESPONSE;

/// Ask a peer for blocks after `last_known_sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub chain_id: ChainId,
    pub from_peer_id: PeerId,
    /// Highest sequence number the requester holds (None: send from genesis).
    pub last_known_sequence: Option<u64>,
    /// When the requester last completed a sync (Unix ms).
    pub last_sync_time: Option<i64>,
}

/// One batch of blocks, ascending by sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Payload")]
pub struct SyncResponse<T> {
    pub chain_id: ChainId,
    pub from_peer_id: PeerId,
    pub blocks: Vec<Block<T>>,
    /// Merkle root over the blocks' hashes (None for an empty batch).
    pub batch_hash: Option<Digest>,
    /// The responder filled the batch and probably holds more.
    pub has_more: bool,
}

impl<T> SyncResponse<T> {
    /// Check if this response respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        if self.blocks.len() > limits::MAX_BLOCKS_PER_RESPONSE {
            return Err("too many blocks");
        }
        if self.blocks.is_empty() && self.has_more {
            return Err("empty batch cannot have more");
        }
        Ok(())
    }
}

/// Sync protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", bound = "T: Payload")]
pub enum SyncMessage<T> {
    Request(SyncRequest),
    Response(SyncResponse<T>),
}

impl<T> SyncMessage<T> {
    /// The chain this message is about.
    pub fn chain_id(&self) -> &ChainId {
        match self {
            SyncMessage::Request(req) => &req.chain_id,
            SyncMessage::Response(resp) => &resp.chain_id,
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            SyncMessage::Request(_) => Ok(()),
            SyncMessage::Response(resp) => resp.validate_limits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlog_core::{BlockBuilder, SigningKey};

    fn response(n: usize) -> SyncResponse<String> {
        let key = SigningKey::from_bytes([1; 32]);
        let blocks = (0..n as u64)
            .map(|seq| {
                let mut b = BlockBuilder::new(seq, format!("m{}", seq));
                if seq > 0 {
                    b = b.previous(Digest::from_bytes([0; 32]));
                }
                b.sign(&key).unwrap()
            })
            .collect();
        SyncResponse {
            chain_id: ChainId::from("room"),
            from_peer_id: PeerId::new("b"),
            blocks,
            batch_hash: None,
            has_more: false,
        }
    }

    #[test]
    fn test_message_limits_valid() {
        let msg = SyncMessage::Response(response(limits::MAX_BLOCKS_PER_RESPONSE));
        assert!(msg.validate_limits().is_ok());
    }

    #[test]
    fn test_message_limits_exceeded() {
        let msg = SyncMessage::Response(response(limits::MAX_BLOCKS_PER_RESPONSE + 1));
        assert!(msg.validate_limits().is_err());

        let mut empty = response(0);
        empty.has_more = true;
        assert!(SyncMessage::Response(empty).validate_limits().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let msg: SyncMessage<String> = SyncMessage::Request(SyncRequest {
            chain_id: ChainId::from("room"),
            from_peer_id: PeerId::new("a"),
            last_known_sequence: Some(4),
            last_sync_time: None,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["chain_id"], "room");
        assert_eq!(json["last_known_sequence"], 4);

        let back: SyncMessage<String> = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.chain_id().as_str(), "room");
    }
}
