//! amity-sync library - people/moment synchronization service
//!
//! Hosts the pairing handshake, identity mapping engine, and the
//! server-to-server push receiver for syncing with a peer deployment.

use axum::Router;
use sqlx::SqlitePool;
use std::time::Duration;

pub mod api;
pub mod db;
pub mod mapping;
pub mod sync;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// HTTP client for peer-system calls
    pub http: reqwest::Client,
    /// Name this deployment advertises during pairing
    pub system_name: String,
    /// Base URL peers use to reach this deployment
    pub base_url: String,
}

impl AppState {
    /// Create new application state.
    ///
    /// The peer client timeout comes from the `peer_request_timeout_ms`
    /// setting; the seeded default applies when the row is absent.
    pub async fn new(db: SqlitePool, system_name: String, base_url: String) -> Self {
        let timeout_ms = amity_common::db::init::setting_i64(&db, "peer_request_timeout_ms", 30_000)
            .await
            .unwrap_or(30_000);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms.max(1) as u64))
            .build()
            .unwrap_or_default();
        Self {
            db,
            http,
            system_name,
            base_url,
        }
    }
}

/// Build application router
///
/// Three route classes:
/// - signed: peer-to-peer endpoints behind the HMAC middleware
/// - user: session-fronted endpoints (user id injected upstream)
/// - public: health and the pairing accept endpoint (authenticated by the
///   one-time code itself)
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Peer-to-peer routes (require a valid body signature)
    let signed = Router::new()
        .route("/api/sync/push", post(api::sync::receive_push))
        .route("/api/sync/pull", post(api::sync::pull_pending))
        .route("/api/sync/people", get(api::sync::list_people))
        .route("/api/sync/revoked", post(api::sync::connection_revoked))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::sync_auth_middleware,
        ));

    // User-facing routes (session layer in front injects x-amity-user-id)
    let user = Router::new()
        .route("/api/pairing/generate", post(api::pairing::generate_code))
        .route("/api/pairing/join", post(api::pairing::join_peer))
        .route("/api/pairing/revoke", post(api::pairing::revoke_connection))
        .route("/api/mapping/:connection_id", get(api::mapping::get_mapping_state))
        .route("/api/mapping/:connection_id/plan", post(api::mapping::plan_mapping))
        .route("/api/mapping/activate", post(api::mapping::activate_mapping))
        .route("/api/people/remote", post(api::people::remote_people))
        .route("/api/sync/backfill", post(api::triggers::backfill))
        .route("/api/sync/run", post(api::triggers::run_sync));

    // Public routes
    let public = Router::new()
        .route("/api/pairing/accept", post(api::pairing::accept_code))
        .merge(api::health::health_routes());

    Router::new()
        .merge(signed)
        .merge(user)
        .merge(public)
        .with_state(state)
}
