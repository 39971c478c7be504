//! [`GrpcHandle`]: the production [`RemoteNodeHandle`], backed by a lazily
//! connected tonic channel (examples/MartinKlapacz-Chord-Network's
//! `ChordGrpcClient` wiring, generalized to the trait above).

use std::sync::Arc;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use super::chord_proto::chord_client::ChordClient;
use super::chord_proto::{
    AdoptSuccessorRequest, CheckPredecessorRequest, DeleteRequest, Empty, FindSuccessorRequest, GetRequest,
    PeerMessage, PutRequest,
};
use super::RemoteNodeHandle;
use crate::error::{ChordError, ChordResult};
use crate::keyhash::RingId;

fn status_to_error(status: Status) -> ChordError {
    match status.code() {
        Code::InvalidArgument => ChordError::InvalidArgument(status.message().to_string()),
        _ => ChordError::TransientPeerFailure(format!("{}: {}", status.code(), status.message())),
    }
}

#[derive(Clone)]
pub struct GrpcHandle {
    address: String,
    node_key: Arc<tokio::sync::OnceCell<RingId>>,
    channel: Channel,
}

impl GrpcHandle {
    fn connect_lazy(address: &str) -> Channel {
        let uri = format!("http://{address}");
        Endpoint::from_shared(uri)
            .expect("peer address must form a valid URI")
            .connect_lazy()
    }

    fn client(&self) -> ChordClient<Channel> {
        ChordClient::new(self.channel.clone())
    }

    fn as_peer_message(address: &str, node_key: RingId) -> PeerMessage {
        PeerMessage {
            address: address.to_string(),
            node_key,
        }
    }
}

#[async_trait]
impl RemoteNodeHandle for GrpcHandle {
    fn from_address(address: String) -> Self {
        let channel = Self::connect_lazy(&address);
        GrpcHandle {
            address,
            node_key: Arc::new(tokio::sync::OnceCell::new()),
            channel,
        }
    }

    fn with_known_key(address: String, node_key: RingId) -> Self {
        let channel = Self::connect_lazy(&address);
        let cell = tokio::sync::OnceCell::new();
        let _ = cell.set(node_key);
        GrpcHandle {
            address,
            node_key: Arc::new(cell),
            channel,
        }
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn node_key(&self) -> ChordResult<RingId> {
        let resolved = self
            .node_key
            .get_or_try_init(|| async {
                let response = self
                    .client()
                    .get_node_key(Empty {})
                    .await
                    .map_err(status_to_error)?;
                Ok(response.into_inner().node_key)
            })
            .await?;
        Ok(*resolved)
    }

    async fn get_hash_length(&self) -> ChordResult<u32> {
        let response = self
            .client()
            .get_hash_length(Empty {})
            .await
            .map_err(status_to_error)?
            .into_inner();
        Ok(response.m)
    }

    async fn find_successor(&self, id: RingId) -> ChordResult<Self> {
        let response = self
            .client()
            .find_successor(FindSuccessorRequest { id })
            .await
            .map_err(status_to_error)?
            .into_inner();
        Ok(GrpcHandle::with_known_key(response.address, response.node_key))
    }

    async fn get_predecessor(&self) -> ChordResult<Option<Self>> {
        let response = self
            .client()
            .get_predecessor(Empty {})
            .await
            .map_err(status_to_error)?
            .into_inner();
        Ok(response
            .predecessor
            .map(|peer| GrpcHandle::with_known_key(peer.address, peer.node_key)))
    }

    async fn check_predecessor(&self, candidate: &Self) -> ChordResult<()> {
        let candidate_key = candidate.node_key().await?;
        self.client()
            .check_predecessor(CheckPredecessorRequest {
                candidate: Some(Self::as_peer_message(candidate.address(), candidate_key)),
            })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn get(&self, id: RingId) -> ChordResult<Option<Vec<u8>>> {
        let response = self
            .client()
            .get(GetRequest { id })
            .await
            .map_err(status_to_error)?
            .into_inner();
        Ok(response.found.then_some(response.value))
    }

    async fn put(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        self.client()
            .put(PutRequest { id, value })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn delete(&self, id: RingId) -> ChordResult<()> {
        self.client()
            .delete(DeleteRequest { id })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn put_backup(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        self.client()
            .put_backup(PutRequest { id, value })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn remove_backup(&self, id: RingId) -> ChordResult<()> {
        self.client()
            .remove_backup(DeleteRequest { id })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn adopt_successor_hint(&self, departing_id: RingId, candidate: &Self) -> ChordResult<()> {
        let candidate_key = candidate.node_key().await?;
        self.client()
            .adopt_successor(AdoptSuccessorRequest {
                departing_id,
                candidate: Some(Self::as_peer_message(candidate.address(), candidate_key)),
            })
            .await
            .map_err(status_to_error)?;
        Ok(())
    }

    async fn health(&self) -> ChordResult<()> {
        self.client().health(Empty {}).await.map_err(status_to_error)?;
        Ok(())
    }
}
