//! `ChordRpcService`: the tonic-generated `Chord` trait, implemented by
//! delegating every call straight into a [`crate::node::Node`].
//!
//! The service never runs Chord logic itself — every method is a thin
//! translation between wire messages and `Node<H>` method calls, mirroring
//! how examples/MartinKlapacz-Chord-Network's `ThreadSafeNodeService`
//! forwards gRPC calls onto its `Node`.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use super::chord_proto::chord_server::Chord;
use super::chord_proto::{
    AdoptSuccessorRequest, CheckPredecessorRequest, DeleteRequest, Empty, FindSuccessorRequest,
    GetPredecessorResponse, GetRequest, GetResponse, HashLengthResponse, NodeKeyResponse, PeerMessage, PutRequest,
};
use super::RemoteNodeHandle;
use crate::error::ChordError;
use crate::node::Node;

pub struct ChordRpcService<H: RemoteNodeHandle> {
    node: Arc<Node<H>>,
}

impl<H: RemoteNodeHandle> ChordRpcService<H> {
    pub fn new(node: Arc<Node<H>>) -> Self {
        ChordRpcService { node }
    }
}

fn to_status(err: ChordError) -> Status {
    match err {
        ChordError::InvalidArgument(msg) => Status::invalid_argument(msg),
        ChordError::NodeDeparted => Status::failed_precondition("node has left the ring"),
        ChordError::TransientPeerFailure(msg) => Status::unavailable(msg),
        ChordError::NetworkHosed { attempts, source } => {
            Status::unavailable(format!("network hosed after {attempts} attempt(s): {source}"))
        }
    }
}

async fn to_peer_message<H: RemoteNodeHandle>(handle: &H) -> Result<PeerMessage, Status> {
    let node_key = handle.node_key().await.map_err(to_status)?;
    Ok(PeerMessage {
        address: handle.address().to_string(),
        node_key,
    })
}

#[tonic::async_trait]
impl<H: RemoteNodeHandle> Chord for ChordRpcService<H> {
    async fn get_node_key(&self, _request: Request<Empty>) -> Result<Response<NodeKeyResponse>, Status> {
        Ok(Response::new(NodeKeyResponse {
            node_key: self.node.node_key(),
        }))
    }

    async fn get_hash_length(&self, _request: Request<Empty>) -> Result<Response<HashLengthResponse>, Status> {
        Ok(Response::new(HashLengthResponse { m: self.node.m() }))
    }

    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<PeerMessage>, Status> {
        let id = request.into_inner().id;
        let successor = self.node.find_successor(id).await.map_err(to_status)?;
        Ok(Response::new(to_peer_message(&successor).await?))
    }

    async fn get_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        let predecessor = match self.node.predecessor().await {
            Some(handle) => Some(to_peer_message(&handle).await?),
            None => None,
        };
        Ok(Response::new(GetPredecessorResponse { predecessor }))
    }

    async fn check_predecessor(
        &self,
        request: Request<CheckPredecessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        let candidate = request
            .into_inner()
            .candidate
            .ok_or_else(|| Status::invalid_argument("candidate is required"))?;
        let handle = H::with_known_key(candidate.address, candidate.node_key);
        self.node.check_predecessor(handle).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let id = request.into_inner().id;
        let value = self.node.get(id).await.map_err(to_status)?;
        Ok(Response::new(match value {
            Some(value) => GetResponse { found: true, value },
            None => GetResponse { found: false, value: Vec::new() },
        }))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<Empty>, Status> {
        let request = request.into_inner();
        self.node.put(request.id, request.value).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<Empty>, Status> {
        let id = request.into_inner().id;
        self.node.delete(id).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn put_backup(&self, request: Request<PutRequest>) -> Result<Response<Empty>, Status> {
        let request = request.into_inner();
        self.node.put_backup_local(request.id, request.value).await;
        Ok(Response::new(Empty {}))
    }

    async fn remove_backup(&self, request: Request<DeleteRequest>) -> Result<Response<Empty>, Status> {
        let id = request.into_inner().id;
        self.node.remove_backup_local(id).await;
        Ok(Response::new(Empty {}))
    }

    async fn adopt_successor(
        &self,
        request: Request<AdoptSuccessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        let request = request.into_inner();
        let candidate = request
            .candidate
            .ok_or_else(|| Status::invalid_argument("candidate is required"))?;
        let handle = H::with_known_key(candidate.address, candidate.node_key);
        self.node
            .adopt_successor_hint(request.departing_id, handle)
            .await
            .map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn health(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.node.health().await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }
}
