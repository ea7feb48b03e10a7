// Peer connection handles and the peer registry

use crate::network::PeerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Handle to a connected peer: messages queued here are written to the
/// socket by the peer's writer task. Sending never blocks; a closed channel
/// means the peer is already being torn down.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub id: u64,
    pub addr: SocketAddr,
    sender: mpsc::UnboundedSender<PeerMessage>,
}

impl PeerHandle {
    pub fn new(id: u64, addr: SocketAddr, sender: mpsc::UnboundedSender<PeerMessage>) -> Self {
        Self { id, addr, sender }
    }

    /// Queue a message for this peer, fire-and-forget.
    pub fn send(&self, message: PeerMessage) {
        if self.sender.send(message).is_err() {
            log::debug!("peer {} is gone, message dropped", self.addr);
        }
    }
}

/// The set of live peer connections. Guarded by the node's registry lock;
/// membership is independent of chain state.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    next_id: u64,
    peers: HashMap<u64, PeerHandle>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back its id.
    pub fn add(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<PeerMessage>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.peers.insert(id, PeerHandle::new(id, addr, sender));
        id
    }

    /// Deregister a connection. Idempotent: both the reader and the writer
    /// task call this on teardown and only the first removal reports it.
    pub fn remove(&mut self, id: u64) -> Option<PeerHandle> {
        self.peers.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&PeerHandle> {
        self.peers.get(&id)
    }

    pub fn handles(&self) -> Vec<PeerHandle> {
        self.peers.values().cloned().collect()
    }

    pub fn addrs(&self) -> Vec<String> {
        self.peers.values().map(|p| p.addr.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_is_idempotent() {
        let mut registry = PeerRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:3002".parse().unwrap();

        let id = registry.add(addr, tx);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none()); // second removal is a no-op
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = PeerRegistry::new();
        let addr: SocketAddr = "127.0.0.1:3002".parse().unwrap();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let a = registry.add(addr, tx1);
        registry.remove(a);
        let b = registry.add(addr, tx2);
        assert_ne!(a, b);
    }

    #[test]
    fn send_to_dropped_receiver_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:3002".parse().unwrap();
        let handle = PeerHandle::new(0, addr, tx);
        drop(rx);
        handle.send(PeerMessage::query_latest()); // must not panic
    }
}
