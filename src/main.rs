// Node entry point

use clap::Parser;
use mini_chain::{api, Cli, Commands, KeyPair, Node};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(Commands::Keygen) = cli.command {
        let keys = KeyPair::generate();
        println!("private key: {}", keys.secret_hex());
        println!("address:     {}", keys.address);
        return;
    }

    let node = Node::new();

    let gossip_addr: SocketAddr = ([0, 0, 0, 0], cli.gossip_port).into();
    let gossip_node = node.clone();
    tokio::spawn(async move {
        if let Err(e) = gossip_node.listen(gossip_addr).await {
            eprintln!("Error on gossip listener: {}", e);
            std::process::exit(1);
        }
    });

    for peer in &cli.peers {
        if let Err(e) = node.connect_to_peer(peer).await {
            log::warn!("could not connect to peer {peer}: {e}");
        }
    }

    let http_addr: SocketAddr = ([0, 0, 0, 0], cli.http_port).into();
    if let Err(e) = api::serve(node, http_addr).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
