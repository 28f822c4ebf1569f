//! HTTP client for peer-system calls
//!
//! All peer endpoints except pairing accept require the HMAC signature
//! headers; the signature is computed over the exact serialized bytes that
//! go on the wire.

use amity_common::api::auth::{sign_body, CONNECTION_HEADER, SIGNATURE_HEADER};
use amity_common::api::types::{
    PairingAcceptRequest, PairingAcceptResponse, PeopleResponse, PullResponse, PushRequest,
    PushResponse, SyncEvent,
};
use amity_common::db::models::Connection;
use serde::Serialize;
use thiserror::Error;

/// Peer client errors
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer returned {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client for one peer deployment
pub struct PeerClient {
    http: reqwest::Client,
    base_url: String,
}

impl PeerClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Forward a pairing code to the peer's accept endpoint. The code is
    /// the only credential; no connection exists yet.
    pub async fn accept_pairing(
        &self,
        request: &PairingAcceptRequest,
    ) -> Result<PairingAcceptResponse, PeerError> {
        let url = format!("{}/api/pairing/accept", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PeerError::Network(e.to_string()))?;

        Self::read_json(response).await
    }

    /// Push a batch of events to the peer's receiver
    pub async fn push_events(
        &self,
        connection: &Connection,
        events: &[SyncEvent],
    ) -> Result<PushResponse, PeerError> {
        let body = PushRequest {
            events: events.to_vec(),
        };
        self.signed_post(connection, "/api/sync/push", &body).await
    }

    /// Pull the peer's pending events for this connection
    pub async fn pull_events(&self, connection: &Connection) -> Result<PullResponse, PeerError> {
        self.signed_post(connection, "/api/sync/pull", &serde_json::json!({}))
            .await
    }

    /// Fetch the peer's people listing
    pub async fn list_people(&self, connection: &Connection) -> Result<PeopleResponse, PeerError> {
        let url = format!("{}/api/sync/people", self.base_url);
        // GET carries an empty body; the signature covers those zero bytes
        let signature = sign_body(&connection.shared_secret, b"");

        let response = self
            .http
            .get(&url)
            .header(SIGNATURE_HEADER, signature)
            .header(CONNECTION_HEADER, &connection.id)
            .send()
            .await
            .map_err(|e| PeerError::Network(e.to_string()))?;

        Self::read_json(response).await
    }

    /// Best-effort revocation notice so the peer reflects the change
    /// without polling
    pub async fn notify_revoked(&self, connection: &Connection) -> Result<(), PeerError> {
        let _: serde_json::Value = self
            .signed_post(connection, "/api/sync/revoked", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// POST with the HMAC headers, signing the exact bytes sent
    async fn signed_post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        connection: &Connection,
        path: &str,
        body: &B,
    ) -> Result<T, PeerError> {
        let bytes = serde_json::to_vec(body).map_err(|e| PeerError::Parse(e.to_string()))?;
        let signature = sign_body(&connection.shared_secret, &bytes);
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(CONNECTION_HEADER, &connection.id)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PeerError::Network(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PeerError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PeerError::Api(status.as_u16(), text));
        }
        response
            .json()
            .await
            .map_err(|e| PeerError::Parse(e.to_string()))
    }
}
