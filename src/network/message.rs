// Gossip wire format

use crate::core::Block;
use crate::error::NodeError;
use serde::{Deserialize, Serialize};

/// The four gossip message kinds, carried on the wire as their integer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageKind {
    QueryLatest = 0,
    ResponseLatest = 1,
    QueryAll = 2,
    ResponseAll = 3,
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageKind::QueryLatest),
            1 => Ok(MessageKind::ResponseLatest),
            2 => Ok(MessageKind::QueryAll),
            3 => Ok(MessageKind::ResponseAll),
            other => Err(format!("unknown message kind {other}")),
        }
    }
}

/// The gossip envelope: `{"id": <kind>, "data": <payload or null>}`.
/// `data` is itself a serialized Block (ResponseLatest) or sequence of
/// Blocks (ResponseAll); queries carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMessage {
    pub id: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl PeerMessage {
    pub fn query_latest() -> Self {
        Self {
            id: MessageKind::QueryLatest,
            data: None,
        }
    }

    pub fn query_all() -> Self {
        Self {
            id: MessageKind::QueryAll,
            data: None,
        }
    }

    pub fn response_latest(block: &Block) -> Result<Self, NodeError> {
        let data = serde_json::to_string(block)
            .map_err(|e| NodeError::Internal(format!("block encoding failed: {e}")))?;
        Ok(Self {
            id: MessageKind::ResponseLatest,
            data: Some(data),
        })
    }

    pub fn response_all(blocks: &[Block]) -> Result<Self, NodeError> {
        let data = serde_json::to_string(blocks)
            .map_err(|e| NodeError::Internal(format!("chain encoding failed: {e}")))?;
        Ok(Self {
            id: MessageKind::ResponseAll,
            data: Some(data),
        })
    }

    /// Payload of a ResponseLatest. `None` for a missing or undecodable
    /// payload; the caller drops the message.
    pub fn decode_block(&self) -> Option<Block> {
        let data = self.data.as_deref()?;
        match serde_json::from_str(data) {
            Ok(block) => Some(block),
            Err(e) => {
                log::warn!("dropping message with undecodable block payload: {e}");
                None
            }
        }
    }

    /// Payload of a ResponseAll.
    pub fn decode_chain(&self) -> Option<Vec<Block>> {
        let data = self.data.as_deref()?;
        match serde_json::from_str(data) {
            Ok(blocks) => Some(blocks),
            Err(e) => {
                log::warn!("dropping message with undecodable chain payload: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_wire_integers() {
        for (kind, id) in [
            (MessageKind::QueryLatest, 0u8),
            (MessageKind::ResponseLatest, 1),
            (MessageKind::QueryAll, 2),
            (MessageKind::ResponseAll, 3),
        ] {
            assert_eq!(u8::from(kind), id);
            assert_eq!(MessageKind::try_from(id).unwrap(), kind);
        }
        assert!(MessageKind::try_from(4).is_err());
    }

    #[test]
    fn envelope_wire_shape() {
        let msg = PeerMessage::query_latest();
        let wire = serde_json::to_string(&msg).unwrap();
        assert_eq!(wire, r#"{"id":0}"#);
        let back: PeerMessage = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, msg);

        // Null data is tolerated on receive.
        let back: PeerMessage = serde_json::from_str(r#"{"id":2,"data":null}"#).unwrap();
        assert_eq!(back.id, MessageKind::QueryAll);
    }

    #[test]
    fn block_payload_roundtrip() {
        let genesis = Block::genesis();
        let msg = PeerMessage::response_latest(&genesis).unwrap();
        let wire = serde_json::to_string(&msg).unwrap();
        let back: PeerMessage = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.decode_block().unwrap(), genesis);
    }

    #[test]
    fn chain_payload_roundtrip() {
        let chain = vec![Block::genesis()];
        let msg = PeerMessage::response_all(&chain).unwrap();
        let wire = serde_json::to_string(&msg).unwrap();
        let back: PeerMessage = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.decode_chain().unwrap(), chain);
    }

    #[test]
    fn undecodable_payloads_are_dropped_not_fatal() {
        let msg = PeerMessage {
            id: MessageKind::ResponseLatest,
            data: Some("not json".into()),
        };
        assert!(msg.decode_block().is_none());
        assert!(msg.decode_chain().is_none());

        let empty = PeerMessage::query_latest();
        assert!(empty.decode_block().is_none());
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        assert!(serde_json::from_str::<PeerMessage>(r#"{"id":9}"#).is_err());
    }
}
