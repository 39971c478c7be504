//! Integration coverage for a ring of cooperating nodes, built entirely on
//! `LoopbackHandle` so many `Node`s can run in one process deterministically.

use std::sync::Arc;

use chord_core::error::ChordError;
use chord_core::loopback::{self, LoopbackHandle};
use chord_core::node::Node;
use chord_core::rpc::RemoteNodeHandle;
use chord_core::NodeConfig;

fn spawn(m: u32, node_key: u64, address: &str) -> Arc<Node<LoopbackHandle>> {
    let node = Node::new(NodeConfig::new(m, node_key, address)).expect("valid node_key");
    loopback::register(address.to_string(), node.clone());
    node
}

async fn converge(nodes: &[Arc<Node<LoopbackHandle>>], rounds: usize) {
    for _ in 0..rounds {
        for node in nodes {
            let _ = node.stabilize().await;
            let _ = node.fix_finger().await;
        }
    }
}

#[tokio::test]
async fn four_node_ring_routes_and_replicates() {
    let a = spawn(8, 10, "ring4-a");
    let b = spawn(8, 80, "ring4-b");
    let c = spawn(8, 150, "ring4-c");
    let d = spawn(8, 220, "ring4-d");

    let bootstrap = LoopbackHandle::with_known_key("ring4-a".to_string(), 10);
    for node in [&b, &c, &d] {
        node.join(bootstrap.clone()).await.unwrap();
    }

    let nodes = [a.clone(), b.clone(), c.clone(), d.clone()];
    converge(&nodes, 12).await;

    // id=100 falls in (80, 150], owned by c; c's successor is d.
    let owner = a.find_successor(100).await.unwrap();
    assert_eq!(owner.address(), "ring4-c");

    a.put(100, b"payload".to_vec()).await.unwrap();
    assert_eq!(c.get(100).await.unwrap(), Some(b"payload".to_vec()));
    assert_eq!(d.backup_len().await, 1);

    // every node can resolve the same owner for the same key
    for node in &nodes {
        let resolved = node.find_successor(100).await.unwrap();
        assert_eq!(resolved.address(), "ring4-c");
    }
}

#[tokio::test]
async fn successor_survives_predecessor_departure() {
    let a = spawn(8, 10, "dep-a");
    let b = spawn(8, 90, "dep-b");
    let c = spawn(8, 170, "dep-c");

    let bootstrap = LoopbackHandle::with_known_key("dep-a".to_string(), 10);
    b.join(bootstrap.clone()).await.unwrap();
    c.join(bootstrap.clone()).await.unwrap();

    let nodes = [a.clone(), b.clone(), c.clone()];
    converge(&nodes, 10).await;

    // id=50 belongs to b (10, 90]; b replicates it onto its successor c.
    a.put(50, b"durable".to_vec()).await.unwrap();
    assert_eq!(b.get(50).await.unwrap(), Some(b"durable".to_vec()));
    assert_eq!(c.backup_len().await, 1);

    b.leave().await.unwrap();
    loopback::unregister("dep-b");

    // after b departs and the survivors re-stabilize, c should have
    // absorbed the range and still serve the value b handed off on leave.
    converge(&[a.clone(), c.clone()], 10).await;
    assert_eq!(c.get(50).await.unwrap(), Some(b"durable".to_vec()));
}

#[tokio::test]
async fn new_predecessor_absorbs_keys_that_now_belong_to_it() {
    let a = spawn(8, 10, "newpred-a");
    let c = spawn(8, 170, "newpred-c");

    let bootstrap = LoopbackHandle::with_known_key("newpred-a".to_string(), 10);
    c.join(bootstrap.clone()).await.unwrap();
    converge(&[a.clone(), c.clone()], 6).await;

    // id=50 falls in (10, 170], owned by c while the ring only has a/c.
    a.put(50, b"durable".to_vec()).await.unwrap();
    assert_eq!(c.get(50).await.unwrap(), Some(b"durable".to_vec()));

    let b = spawn(8, 90, "newpred-b");
    b.join(bootstrap.clone()).await.unwrap();
    converge(&[a.clone(), b.clone(), c.clone()], 12).await;

    // b's range is now (10, 90]; id=50 belongs to b, not c. It must have
    // moved backward onto b rather than being shipped forward to c's
    // successor and lost.
    assert_eq!(b.get(50).await.unwrap(), Some(b"durable".to_vec()));
}

#[tokio::test]
async fn crashed_successor_recovers_without_a_graceful_leave() {
    let a = spawn(8, 10, "crash-a");
    let b = spawn(8, 90, "crash-b");
    let c = spawn(8, 170, "crash-c");

    let bootstrap = LoopbackHandle::with_known_key("crash-a".to_string(), 10);
    b.join(bootstrap.clone()).await.unwrap();
    c.join(bootstrap.clone()).await.unwrap();
    converge(&[a.clone(), b.clone(), c.clone()], 10).await;

    assert_eq!(a.find_successor(50).await.unwrap().address(), "crash-b");

    // b crashes: no leave(), it just vanishes, so adopt_successor_hint
    // never fires for it.
    loopback::unregister("crash-b");

    converge(&[a.clone(), c.clone()], 15).await;

    assert_eq!(a.find_successor(50).await.unwrap().address(), "crash-c");
    assert_ne!(a.finger_node_id(0).await, 90, "a must stop pointing at the dead node");
}

#[tokio::test]
async fn fix_finger_repairs_entries_beyond_the_immediate_successor() {
    let nodes: Vec<_> = [("fr-a", 0u64), ("fr-b", 16), ("fr-c", 32), ("fr-d", 48)]
        .into_iter()
        .map(|(address, key)| spawn(6, key, address))
        .collect();

    let bootstrap = LoopbackHandle::with_known_key("fr-a".to_string(), 0);
    for node in &nodes[1..] {
        node.join(bootstrap.clone()).await.unwrap();
    }

    converge(&nodes, 20).await;

    let a = &nodes[0];
    let mut saw_non_self_finger = false;
    for i in 0..6 {
        if a.finger_node_id(i).await != a.node_key() {
            saw_non_self_finger = true;
        }
    }
    assert!(saw_non_self_finger, "expected at least one finger to repair away from self");
}

#[tokio::test]
async fn out_of_range_id_is_rejected_without_touching_the_network() {
    let solo = spawn(4, 1, "bounds-solo");
    let err = solo.put(999, b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, ChordError::InvalidArgument(_)));
}

#[tokio::test]
async fn join_against_unreachable_bootstrap_surfaces_network_hosed() {
    let mut config = NodeConfig::new(8, 5, "ghost-node".to_string());
    config.retries = 2;
    config.fix_interval_millis = 1;
    let node = Node::<LoopbackHandle>::new(config).unwrap();

    let unreachable = LoopbackHandle::from_address("nowhere".to_string());
    let err = node.join(unreachable).await.unwrap_err();
    assert!(matches!(err, ChordError::NetworkHosed { attempts: 2, .. }));
}
