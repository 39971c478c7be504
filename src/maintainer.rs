//! Background maintenance loop (spec.md §4.2/§4.3 periodic tasks).
//!
//! Mirrors examples/MartinKlapacz-Chord-Network's `threads::chord` periodic
//! driver, rewritten as a tokio task: each tick runs `stabilize` (which
//! also forwards out-of-range keys) and `fix_finger`, stopping once the
//! node has left the ring.

use std::sync::Arc;

use crate::node::Node;
use crate::rpc::RemoteNodeHandle;
use crate::node::NodeState;

/// Spawns the periodic stabilize/fix-finger driver for `node`, returning
/// its join handle so callers can await shutdown.
pub fn spawn<H: RemoteNodeHandle>(node: Arc<Node<H>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(node.fix_interval());
        loop {
            ticker.tick().await;

            if node.state().await == NodeState::Departed {
                break;
            }

            if let Err(err) = node.stabilize().await {
                log::warn!("stabilize failed on {}: {err}", node.address());
            }

            if let Err(err) = node.fix_finger().await {
                log::warn!("fix_finger failed on {}: {err}", node.address());
            }
        }
    })
}
