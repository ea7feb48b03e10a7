// Node context: shared chain state, peer registry, gossip state machine

use crate::consensus::{pow, Blockchain};
use crate::core::{unix_now, Block, Transaction};
use crate::error::NodeError;
use crate::ledger::TxRejection;
use crate::network::{MessageKind, PeerMessage, PeerRegistry};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};

/// A running node: the chain behind its lock, the peer registry behind its
/// own, and a tip version counter that lets an in-flight mining task notice
/// concurrent chain updates without holding either lock.
///
/// Constructed once at startup and cloned into every task; there is no
/// global state.
#[derive(Clone)]
pub struct Node {
    chain: Arc<Mutex<Blockchain>>,
    peers: Arc<RwLock<PeerRegistry>>,
    tip_version: Arc<AtomicU64>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            chain: Arc::new(Mutex::new(Blockchain::new())),
            peers: Arc::new(RwLock::new(PeerRegistry::new())),
            tip_version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the full chain.
    pub async fn blocks(&self) -> Vec<Block> {
        self.chain.lock().await.blocks().to_vec()
    }

    /// Snapshot of the current tip.
    pub async fn latest_block(&self) -> Block {
        self.chain.lock().await.latest_block().clone()
    }

    pub async fn peer_addrs(&self) -> Vec<String> {
        self.peers.read().await.addrs()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Queue a transaction for the next mined block.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), TxRejection> {
        self.chain.lock().await.submit_transaction(tx)
    }

    /// Accept inbound gossip connections forever.
    pub async fn listen(self, addr: SocketAddr) -> Result<(), NodeError> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("gossip listening on {addr}");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            log::info!("gossip connection from {peer_addr}");
            self.register_connection(stream, peer_addr).await;
        }
    }

    /// Open an outbound gossip connection and ask for the peer's tip.
    pub async fn connect_to_peer(&self, addr: &str) -> Result<(), NodeError> {
        let stream = TcpStream::connect(addr).await?;
        let peer_addr = stream.peer_addr()?;
        log::info!("connected to peer {peer_addr}");
        let id = self.register_connection(stream, peer_addr).await;
        self.send_to(id, PeerMessage::query_latest()).await;
        Ok(())
    }

    /// Wire a connection into the registry and spawn its reader and writer
    /// tasks. Both tasks deregister the peer on exit; removal is idempotent
    /// so whichever finishes first wins.
    async fn register_connection(&self, stream: TcpStream, addr: SocketAddr) -> u64 {
        let (read_half, write_half) = stream.into_split();
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.peers.write().await.add(addr, sender);

        let writer_node = self.clone();
        tokio::spawn(async move {
            if let Err(e) = write_loop(write_half, receiver).await {
                log::debug!("writer for {addr} stopped: {e}");
            }
            writer_node.deregister(id, addr).await;
        });

        let reader_node = self.clone();
        tokio::spawn(async move {
            reader_node.read_loop(read_half, id, addr).await;
            reader_node.deregister(id, addr).await;
        });

        id
    }

    async fn deregister(&self, id: u64, addr: SocketAddr) {
        if self.peers.write().await.remove(id).is_some() {
            log::info!("peer {addr} disconnected");
        }
    }

    /// Blocking receive loop for one connection. A malformed line is dropped
    /// and the connection stays open; a read error or EOF ends the loop.
    async fn read_loop(&self, read_half: OwnedReadHalf, id: u64, addr: SocketAddr) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match serde_json::from_str::<PeerMessage>(&line) {
                    Ok(msg) => self.handle_message(id, msg).await,
                    Err(e) => log::warn!("dropping malformed message from {addr}: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    log::debug!("read from {addr} failed: {e}");
                    break;
                }
            }
        }
    }

    /// The gossip state machine: one reaction per received message kind.
    async fn handle_message(&self, peer_id: u64, msg: PeerMessage) {
        log::debug!("received {:?} from peer {peer_id}", msg.id);
        match msg.id {
            MessageKind::QueryLatest => {
                let latest = self.latest_block().await;
                self.reply(peer_id, PeerMessage::response_latest(&latest)).await;
            }
            MessageKind::ResponseLatest => {
                let Some(block) = msg.decode_block() else { return };
                self.handle_response_latest(peer_id, block).await;
            }
            MessageKind::QueryAll => {
                let blocks = self.blocks().await;
                self.reply(peer_id, PeerMessage::response_all(&blocks)).await;
            }
            MessageKind::ResponseAll => {
                let Some(blocks) = msg.decode_chain() else { return };
                let replaced = self.chain.lock().await.replace_chain(blocks);
                if replaced {
                    self.tip_version.fetch_add(1, Ordering::SeqCst);
                    self.broadcast_latest().await;
                }
            }
        }
    }

    /// A peer announced its tip. Ahead by exactly one and linked: append and
    /// echo our new tip back. Ahead with a gap: ask for the full chain. Not
    /// ahead: nothing to do.
    async fn handle_response_latest(&self, peer_id: u64, block: Block) {
        let mut chain = self.chain.lock().await;
        let last = chain.latest_block();
        if block.index <= last.index {
            log::debug!("received block {} is not ahead of local tip", block.index);
            return;
        }
        if block.previous_hash == last.hash {
            if chain.add_block(block) {
                let latest = chain.latest_block().clone();
                drop(chain);
                self.tip_version.fetch_add(1, Ordering::SeqCst);
                self.reply(peer_id, PeerMessage::response_latest(&latest)).await;
            }
        } else {
            drop(chain);
            self.send_to(peer_id, PeerMessage::query_all()).await;
        }
    }

    async fn reply(&self, peer_id: u64, msg: Result<PeerMessage, NodeError>) {
        match msg {
            Ok(msg) => self.send_to(peer_id, msg).await,
            // Encoding our own state can only fail on a broken invariant.
            Err(e) => log::error!("{e}"),
        }
    }

    async fn send_to(&self, peer_id: u64, msg: PeerMessage) {
        if let Some(handle) = self.peers.read().await.get(peer_id) {
            handle.send(msg);
        }
    }

    /// Announce the current tip to every connected peer, fire-and-forget.
    pub async fn broadcast_latest(&self) {
        let latest = self.latest_block().await;
        let msg = match PeerMessage::response_latest(&latest) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };
        let handles = self.peers.read().await.handles();
        log::debug!("broadcasting block {} to {} peers", latest.index, handles.len());
        for handle in handles {
            handle.send(msg.clone());
        }
    }

    /// Mine and append the next block: coinbase for `reward_address` plus all
    /// pending transactions.
    ///
    /// Reads the tip under the lock, mines with the lock released, then
    /// re-acquires it and appends through the ordinary validation path, so a
    /// concurrent append is never overwritten. The search aborts early if the
    /// tip moves.
    pub async fn generate_next_block(&self, reward_address: &str) -> Result<Block, NodeError> {
        let tip_at_start = self.tip_version.load(Ordering::SeqCst);
        let (index, previous_hash, difficulty, transactions) = {
            let chain = self.chain.lock().await;
            let last = chain.latest_block();
            let mut txs = vec![Transaction::coinbase(reward_address, last.index + 1)];
            txs.extend(chain.pending_transactions());
            (
                last.index + 1,
                last.hash.clone(),
                chain.next_difficulty(),
                txs,
            )
        };

        let tip_version = Arc::clone(&self.tip_version);
        let mined = tokio::task::spawn_blocking(move || {
            pow::mine_block(index, previous_hash, unix_now(), difficulty, transactions, || {
                tip_version.load(Ordering::SeqCst) != tip_at_start
            })
        })
        .await
        .map_err(|e| NodeError::Internal(format!("mining task failed: {e}")))?;

        let block = mined.ok_or(NodeError::MiningSuperseded)?;
        if !self.chain.lock().await.add_block(block.clone()) {
            return Err(NodeError::StaleBlock);
        }
        self.tip_version.fetch_add(1, Ordering::SeqCst);
        self.broadcast_latest().await;
        Ok(block)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain queued messages to the socket as newline-delimited JSON. Ends when
/// the peer's handle is dropped or a write fails.
async fn write_loop(
    mut half: OwnedWriteHalf,
    mut receiver: mpsc::UnboundedReceiver<PeerMessage>,
) -> Result<(), NodeError> {
    while let Some(msg) = receiver.recv().await {
        let mut line = serde_json::to_string(&msg)
            .map_err(|e| NodeError::Internal(format!("message encoding failed: {e}")))?;
        line.push('\n');
        half.write_all(line.as_bytes()).await?;
    }
    Ok(())
}
