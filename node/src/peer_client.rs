//! # HTTP Peer Client
//!
//! The concrete [`PeerClient`] the consensus driver talks to — plain JSON
//! over HTTP, one request per peer, fired concurrently via `futures::join_all`.
//! A single peer timing out or refusing never blocks the others; the driver
//! only needs to know it tried.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use nova_dbft::config::DEFAULT_PEER_REQUEST_TIMEOUT;
use nova_dbft::consensus::traits::{PeerClient, PeerClientError};
use nova_dbft::consensus::vote::{Certificate, Vote};
use nova_dbft::storage::block::{Block, Header};

/// Thin wrapper around a `reqwest::Client`, pointed at peer addresses taken
/// from the delegate roster (`host:port`, no scheme).
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_PEER_REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builder should never fail with default TLS config");
        Self { client }
    }

    fn url(peer: &str, path: &str) -> String {
        format!("http://{peer}{path}")
    }

    async fn post_json<T: serde::Serialize + Sync>(&self, peer: &str, path: &str, body: &T) -> Result<(), PeerClientError> {
        self.client
            .post(Self::url(peer, path))
            .json(body)
            .send()
            .await
            .map_err(|e| PeerClientError::Unreachable { peer: peer.to_string(), source: e.to_string() })?;
        Ok(())
    }

    async fn broadcast_to_all<T: serde::Serialize + Sync>(&self, peers: &[String], path: &str, body: &T) -> Result<(), PeerClientError> {
        let results = join_all(peers.iter().map(|peer| self.post_json(peer, path, body))).await;
        // Best-effort: a single unreachable peer doesn't fail the broadcast,
        // it catches up via the sync loop. Only surface an error if every
        // peer failed, since that likely indicates a local network fault.
        if !peers.is_empty() && results.iter().all(|r| r.is_err()) {
            return results.into_iter().next().unwrap();
        }
        for result in results {
            if let Err(e) = result {
                tracing::debug!(error = %e, "broadcast to one peer failed, continuing");
            }
        }
        Ok(())
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn broadcast_block(&self, peers: &[String], block: &Block) -> Result<(), PeerClientError> {
        self.broadcast_to_all(peers, "/block/api/blockFromPeer", block).await
    }

    async fn broadcast_vote(&self, peers: &[String], vote: &Vote) -> Result<(), PeerClientError> {
        self.broadcast_to_all(peers, "/vote/api/vote", vote).await
    }

    async fn broadcast_certificate(&self, peers: &[String], certificate: &Certificate) -> Result<(), PeerClientError> {
        self.broadcast_to_all(peers, "/vote/api/voteResult", certificate).await
    }

    async fn heartbeat(&self, peer: &str) -> Result<(), PeerClientError> {
        self.client
            .get(Self::url(peer, "/health"))
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .map_err(|e| PeerClientError::Unreachable { peer: peer.to_string(), source: e.to_string() })?;
        Ok(())
    }

    async fn pull_block(&self, peer: &str, height: i64) -> Result<Option<Block>, PeerClientError> {
        let url = format!("{}?height={height}", Self::url(peer, "/block/api/getBlockByHeight"));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PeerClientError::Unreachable { peer: peer.to_string(), source: e.to_string() })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response
            .json::<Option<Block>>()
            .await
            .map_err(|e| PeerClientError::Malformed { peer: peer.to_string(), detail: e.to_string() })
    }

    async fn pull_header(&self, peer: &str, height: i64) -> Result<Option<Header>, PeerClientError> {
        let url = format!("{}?height={height}", Self::url(peer, "/block/api/getHeaderByHeight"));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PeerClientError::Unreachable { peer: peer.to_string(), source: e.to_string() })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response
            .json::<Option<Header>>()
            .await
            .map_err(|e| PeerClientError::Malformed { peer: peer.to_string(), detail: e.to_string() })
    }

    async fn pull_certificate(&self, peer: &str, hash: &[u8; 32]) -> Result<Option<Certificate>, PeerClientError> {
        let url = format!("{}?hash={}", Self::url(peer, "/vote/api/getVotes"), hex::encode(hash));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PeerClientError::Unreachable { peer: peer.to_string(), source: e.to_string() })?;
        response
            .json::<Option<Certificate>>()
            .await
            .map_err(|e| PeerClientError::Malformed { peer: peer.to_string(), detail: e.to_string() })
    }
}
