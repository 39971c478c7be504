//! CLI entry point: wires a [`chord_core::config::NodeConfig`] into a
//! running node and serves its peer RPC surface over gRPC. Thin by design —
//! all ring logic lives in the library crate.

use clap::Parser;

use chord_core::node::Node;
use chord_core::rpc::{ChordRpcService, GrpcHandle};
use chord_core::{maintainer, NodeConfig, RemoteNodeHandle};

const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/chord_descriptor.bin"));

#[derive(Parser, Debug)]
#[command(name = "chord-node", about = "Run a single Chord DHT ring node")]
struct Args {
    /// Hash length in bits; the ring has 2^m identifiers.
    #[arg(long, default_value_t = 32)]
    m: u32,

    /// This node's ring identifier, must fit in [0, 2^m).
    #[arg(long)]
    node_key: u64,

    /// Address this node's RPC service listens on and advertises to peers.
    #[arg(long)]
    address: String,

    /// Address of an existing node to join through. Omit to start a ring.
    #[arg(long)]
    bootstrap: Option<String>,

    #[arg(long, default_value_t = 1000)]
    fix_interval_millis: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("logger installs exactly once");

    let args = Args::parse();

    let mut config = NodeConfig::new(args.m, args.node_key, args.address.clone());
    config.fix_interval_millis = args.fix_interval_millis;
    if let Some(bootstrap) = args.bootstrap.clone() {
        config = config.with_bootstrap(bootstrap);
    }

    let node = Node::<GrpcHandle>::new(config)?;

    if let Some(bootstrap_address) = args.bootstrap {
        let bootstrap_handle = GrpcHandle::from_address(bootstrap_address);
        node.join(bootstrap_handle).await?;
        log::info!("joined ring at node_key={}", node.node_key());
    } else {
        log::info!("started new ring at node_key={}", node.node_key());
    }

    maintainer::spawn(node.clone());

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build()?;

    let service = ChordRpcService::new(node);
    let server = chord_core::rpc::chord_proto::chord_server::ChordServer::new(service);

    log::info!("listening on {}", args.address);
    tonic::transport::Server::builder()
        .add_service(server)
        .add_service(reflection_service)
        .serve(args.address.parse()?)
        .await?;

    Ok(())
}
