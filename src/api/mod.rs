// HTTP control surface for a running node

use crate::core::{Block, Transaction};
use crate::error::NodeError;
use crate::network::Node;
use crate::wallet::KeyPair;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub fn router(node: Node) -> Router {
    Router::new()
        .route("/blocks", get(blocks))
        .route("/mineBlock", post(mine_block))
        .route("/transactions", post(add_transaction))
        .route("/peers", get(peers))
        .route("/addPeer", post(add_peer))
        .with_state(node)
}

pub async fn serve(node: Node, addr: SocketAddr) -> Result<(), NodeError> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("http listening on {addr}");
    axum::serve(listener, router(node)).await?;
    Ok(())
}

async fn blocks(State(node): State<Node>) -> Json<Vec<Block>> {
    Json(node.blocks().await)
}

/// Mine the next block. The request body is the miner's private key in hex;
/// the coinbase reward goes to the matching address.
async fn mine_block(
    State(node): State<Node>,
    body: String,
) -> Result<Json<Block>, (StatusCode, String)> {
    let secret = body.trim();
    if secret.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing miner key".into()));
    }
    let keys = KeyPair::from_secret_hex(secret)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let block = node
        .generate_next_block(&keys.address)
        .await
        .map_err(|e| match e {
            NodeError::MiningSuperseded | NodeError::StaleBlock => {
                (StatusCode::CONFLICT, e.to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;
    Ok(Json(block))
}

async fn add_transaction(
    State(node): State<Node>,
    Json(tx): Json<Transaction>,
) -> Result<StatusCode, (StatusCode, String)> {
    node.submit_transaction(tx)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(StatusCode::CREATED)
}

async fn peers(State(node): State<Node>) -> Json<Vec<String>> {
    Json(node.peer_addrs().await)
}

/// Connect to another node's gossip port. The body is a bare `host:port`.
async fn add_peer(
    State(node): State<Node>,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    let addr = body.trim();
    if addr.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing peer address".into()));
    }
    node.connect_to_peer(addr)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(StatusCode::CREATED)
}
