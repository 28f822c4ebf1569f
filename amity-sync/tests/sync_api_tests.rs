//! Integration tests for the peer-to-peer sync endpoints
//!
//! Tests cover:
//! - HMAC authentication middleware (missing headers, bad signatures,
//!   mutated bodies, revoked connections)
//! - Push receiver semantics (missing mapping, duplicate detection,
//!   last-write-wins, soft deletes)
//! - Backfill idempotence and mapping activation

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

use amity_common::api::auth::{generate_secret, sign_body, CONNECTION_HEADER, SIGNATURE_HEADER};
use amity_common::db::init::init_database;
use amity_sync::{build_router, AppState};

///// Test helper: fresh database in a temp dir; the dir must outlive the pool
async fn setup() -> (axum::Router, SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("amity.db")).await.unwrap();
    let state = AppState::new(
        pool.clone(),
        "amity".to_string(),
        "http://localhost:5740".to_string(),
    )
    .await;
    (build_router(state), pool, dir)
}

/// Test helper: insert an active connection, returning (id, secret)
async fn insert_connection(pool: &SqlitePool) -> (String, String) {
    let secret = generate_secret();
    amity_sync::db::connections::insert_connection(
        pool,
        "conn-1",
        "user-1",
        "temerio",
        "http://peer.invalid",
        &secret,
    )
    .await
    .unwrap();
    ("conn-1".to_string(), secret)
}

/// Test helper: insert a local person
async fn insert_person(pool: &SqlitePool, id: &str, name: &str, uid: &str) {
    sqlx::query(
        "INSERT INTO people (id, user_id, name, person_uid, updated_at) VALUES (?, 'user-1', ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(uid)
    .bind(Utc::now() - Duration::hours(1))
    .execute(pool)
    .await
    .unwrap();
}

/// Test helper: signed POST with the HMAC headers over the exact body bytes
fn signed_post(uri: &str, connection_id: &str, secret: &str, body: &Value) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let signature = sign_body(secret, &bytes);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(CONNECTION_HEADER, connection_id)
        .body(Body::from(bytes))
        .unwrap()
}

/// Test helper: user-facing POST with the session header
fn user_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-amity-user-id", "user-1")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn person_event(uid: &str, name: &str, updated_at: chrono::DateTime<Utc>) -> Value {
    json!({
        "entity_type": "person",
        "entity_uid": uid,
        "operation": "upsert",
        "payload": {
            "person_uid": uid,
            "name": name,
            "updated_at": updated_at,
        }
    })
}

fn moment_event(moment_uid: &str, person_uid: &str, title: &str, updated_at: chrono::DateTime<Utc>) -> Value {
    json!({
        "entity_type": "moment",
        "entity_uid": moment_uid,
        "operation": "upsert",
        "payload": {
            "moment_uid": moment_uid,
            "person_uid": person_uid,
            "title": title,
            "occurred_at": updated_at,
            "updated_at": updated_at,
        }
    })
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _pool, _dir) = setup().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "amity-sync");
    assert!(body["version"].is_string());
}

// =============================================================================
// Authentication Middleware
// =============================================================================

#[tokio::test]
async fn test_push_without_headers_is_rejected() {
    let (app, pool, _dir) = setup().await;
    insert_connection(&pool).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/push")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"events":[]}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_push_with_wrong_secret_is_rejected() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;

    let wrong_secret = generate_secret();
    let request = signed_post("/api/sync/push", &conn_id, &wrong_secret, &json!({"events": []}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "invalid signature");
}

#[tokio::test]
async fn test_push_with_mutated_body_is_rejected() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;

    // Sign one body, send another
    let signature = sign_body(&secret, br#"{"events":[]}"#);
    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/push")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(CONNECTION_HEADER, &conn_id)
        .body(Body::from(r#"{"events": []}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_push_on_revoked_connection_is_rejected() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    amity_sync::db::connections::revoke_connection(&pool, &conn_id)
        .await
        .unwrap();

    let request = signed_post("/api/sync/push", &conn_id, &secret, &json!({"events": []}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "unknown or inactive connection");
}

#[tokio::test]
async fn test_signed_get_people_with_empty_body() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;

    // GET carries zero body bytes; the signature covers those zero bytes
    let request = Request::builder()
        .method("GET")
        .uri("/api/sync/people")
        .header(SIGNATURE_HEADER, sign_body(&secret, b""))
        .header(CONNECTION_HEADER, &conn_id)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["people"].as_array().unwrap().len(), 1);
    assert_eq!(body["people"][0]["person_uid"], "uid-alice");
}

#[tokio::test]
async fn test_push_body_over_the_configured_cap_is_rejected() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;

    sqlx::query("UPDATE settings SET value = '64' WHERE key = 'http_max_body_size_bytes'")
        .execute(&pool)
        .await
        .unwrap();

    let body = json!({"events": [person_event("uid-big", &"x".repeat(256), Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "request body too large");
}

// =============================================================================
// Push Receiver
// =============================================================================

#[tokio::test]
async fn test_empty_push_is_a_no_op() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;

    let request = signed_post("/api/sync/push", &conn_id, &secret, &json!({"events": []}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 0);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_person_is_never_created_implicitly() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;

    let body = json!({"events": [person_event("uid-new", "Brand New", Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 0);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

    // No person record appeared
    let people: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(people, 0);

    // A missing_mapping conflict and a zero-confidence candidate were logged
    let kind: String = sqlx::query_scalar("SELECT kind FROM conflicts WHERE entity_uid = 'uid-new'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(kind, "missing_mapping");

    let confidence: f64 =
        sqlx::query_scalar("SELECT confidence FROM person_candidates WHERE remote_person_uid = 'uid-new'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(confidence, 0.0);
}

#[tokio::test]
async fn test_duplicate_name_produces_conflict_link_and_candidate() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice Smith", "uid-local-alice").await;

    // Same name, different uid: must not create a second Alice
    let body = json!({"events": [person_event("uid-remote-alice", "alice smith", Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 0);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

    let people: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(people, 1);

    let kind: String =
        sqlx::query_scalar("SELECT kind FROM conflicts WHERE entity_uid = 'uid-remote-alice'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(kind, "duplicate_detected");

    // Disabled conflict link pending user resolution
    let (status, enabled): (String, i64) = sqlx::query_as(
        "SELECT status, is_enabled FROM person_links WHERE remote_person_uid = 'uid-remote-alice'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "conflict");
    assert_eq!(enabled, 0);

    // High-confidence candidate pointing at the existing person
    let (local_id, confidence): (Option<String>, f64) = sqlx::query_as(
        "SELECT local_person_id, confidence FROM person_candidates WHERE remote_person_uid = 'uid-remote-alice'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(local_id.as_deref(), Some("p1"));
    assert!(confidence >= 0.9);
}

#[tokio::test]
async fn test_stale_person_update_is_an_applied_no_op() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;

    let stale = Utc::now() - Duration::days(2);
    let body = json!({"events": [person_event("uid-alice", "Renamed Alice", stale)]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 1);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 0);

    // Stored name untouched
    let name: String = sqlx::query_scalar("SELECT name FROM people WHERE id = 'p1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "Alice");
}

#[tokio::test]
async fn test_newer_person_update_wins() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;

    let body = json!({"events": [person_event("uid-alice", "Alice Renamed", Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 1);

    let name: String = sqlx::query_scalar("SELECT name FROM people WHERE id = 'p1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "Alice Renamed");
}

#[tokio::test]
async fn test_moment_without_mapping_is_a_conflict() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;

    let body = json!({"events": [moment_event("m1", "uid-unmapped", "Dinner", Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 0);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

    let moments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM moments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(moments, 0);
}

#[tokio::test]
async fn test_moment_applies_through_enabled_link() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;
    amity_sync::db::links::upsert_linked(&pool, &conn_id, "p1", "uid-remote-alice")
        .await
        .unwrap();

    let body = json!({"events": [moment_event("m1", "uid-remote-alice", "Dinner", Utc::now())]});
    let request = signed_post("/api/sync/push", &conn_id, &secret, &body);
    let response = app.oneshot(request).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 1);

    let (title, source): (String, String) =
        sqlx::query_as("SELECT title, source FROM moments WHERE moment_uid = 'm1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(title, "Dinner");
    assert_eq!(source, "sync");
}

#[tokio::test]
async fn test_stale_moment_update_logs_update_conflict() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;
    amity_sync::db::links::upsert_linked(&pool, &conn_id, "p1", "uid-remote-alice")
        .await
        .unwrap();

    // Apply once, then replay with an older timestamp
    let now = Utc::now();
    let body = json!({"events": [moment_event("m1", "uid-remote-alice", "Dinner", now)]});
    let response = app
        .clone()
        .oneshot(signed_post("/api/sync/push", &conn_id, &secret, &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["applied"], 1);

    let stale = now - Duration::days(1);
    let body = json!({"events": [moment_event("m1", "uid-remote-alice", "Old Title", stale)]});
    let response = app
        .oneshot(signed_post("/api/sync/push", &conn_id, &secret, &body))
        .await
        .unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["applied"], 0);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

    // Local title kept, collision logged
    let title: String = sqlx::query_scalar("SELECT title FROM moments WHERE moment_uid = 'm1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Dinner");

    let kind: String = sqlx::query_scalar(
        "SELECT kind FROM conflicts WHERE entity_uid = 'm1' AND entity_type = 'moment'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(kind, "update_conflict");
}

#[tokio::test]
async fn test_moment_delete_is_a_soft_delete() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;
    amity_sync::db::links::upsert_linked(&pool, &conn_id, "p1", "uid-remote-alice")
        .await
        .unwrap();

    let body = json!({"events": [moment_event("m1", "uid-remote-alice", "Dinner", Utc::now())]});
    app.clone()
        .oneshot(signed_post("/api/sync/push", &conn_id, &secret, &body))
        .await
        .unwrap();

    let body = json!({"events": [{
        "entity_type": "moment",
        "entity_uid": "m1",
        "operation": "delete",
        "payload": {}
    }]});
    let response = app
        .oneshot(signed_post("/api/sync/push", &conn_id, &secret, &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["applied"], 1);

    // Row survives with deleted_at set
    let deleted: Option<String> =
        sqlx::query_scalar("SELECT deleted_at FROM moments WHERE moment_uid = 'm1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(deleted.is_some());
}

// =============================================================================
// Backfill and Mapping Activation
// =============================================================================

#[tokio::test]
async fn test_backfill_counts_only_newly_queued() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;
    insert_person(&pool, "p2", "Bob", "uid-bob").await;

    let body = json!({"connection_id": conn_id});
    let response = app
        .clone()
        .oneshot(user_post("/api/sync/backfill", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = extract_json(response.into_body()).await;
    assert_eq!(first["people_queued"], 2);
    assert_eq!(first["moments_queued"], 0);

    // Second run queues nothing new
    let response = app
        .oneshot(user_post("/api/sync/backfill", &body))
        .await
        .unwrap();
    let second = extract_json(response.into_body()).await;
    assert_eq!(second["people_queued"], 0);
    assert_eq!(second["moments_queued"], 0);
}

#[tokio::test]
async fn test_backfill_requires_session() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/backfill")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({"connection_id": conn_id})).unwrap(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_activation_commits_links_and_exclusions() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;

    let body = json!({
        "connection_id": conn_id,
        "actions": [
            {"type": "link", "local_person_id": "p1", "remote_person_uid": "uid-remote-alice"},
            {"type": "exclude", "remote_person_uid": "uid-remote-carol"},
        ]
    });
    let response = app
        .clone()
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["succeeded"], 2);
    assert_eq!(result["failed"], 0);

    let linked: Option<String> =
        amity_sync::db::links::resolve_enabled_link(&pool, &conn_id, "uid-remote-alice")
            .await
            .unwrap();
    assert_eq!(linked.as_deref(), Some("p1"));

    // Replaying the same batch is idempotent
    let response = app
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["succeeded"], 2);
}

#[tokio::test]
async fn test_linking_a_previously_excluded_remote_clears_the_exclusion() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;
    amity_sync::db::remote_cache::replace(
        &pool,
        &conn_id,
        &[amity_common::api::types::PeopleEntry {
            person_uid: "uid-remote-alice".to_string(),
            name: "Alice".to_string(),
            relationship_label: None,
        }],
        Utc::now(),
    )
    .await
    .unwrap();

    // First activation excludes the remote; a later one links it instead
    let body = json!({
        "connection_id": conn_id,
        "actions": [{"type": "exclude", "remote_person_uid": "uid-remote-alice"}]
    });
    let response = app
        .clone()
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["succeeded"], 1);

    let body = json!({
        "connection_id": conn_id,
        "actions": [
            {"type": "link", "local_person_id": "p1", "remote_person_uid": "uid-remote-alice"},
        ]
    });
    let response = app
        .clone()
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["succeeded"], 1);

    // The stale excluded row is gone: the uid is committed as a link only
    let committed = amity_sync::db::links::committed_state(&pool, &conn_id)
        .await
        .unwrap();
    assert_eq!(
        committed.links.get("p1").map(String::as_str),
        Some("uid-remote-alice")
    );
    assert!(!committed.excluded.contains("uid-remote-alice"));

    // Reloaded mapping state agrees and reports nothing left to activate
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/mapping/{}", conn_id))
        .header("x-amity-user-id", "user-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let state = extract_json(response.into_body()).await;
    assert_eq!(state["local_mappings"]["p1"]["action"], "link");
    assert!(state["remote_excludes"].as_array().unwrap().is_empty());
    assert_eq!(state["has_changes"], false);
}

#[tokio::test]
async fn test_create_local_adopts_the_remote_uid() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;

    let body = json!({
        "connection_id": conn_id,
        "actions": [
            {"type": "create_local", "remote_person_uid": "uid-dana", "remote_name": "Dana"},
        ]
    });
    let response = app
        .clone()
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["succeeded"], 1);

    // The new record carries the remote uid, so future person upserts
    // resolve directly
    let (name, uid): (String, String) =
        sqlx::query_as("SELECT name, person_uid FROM people WHERE person_uid = 'uid-dana'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(name, "Dana");
    assert_eq!(uid, "uid-dana");

    let linked = amity_sync::db::links::resolve_enabled_link(&pool, &conn_id, "uid-dana")
        .await
        .unwrap();
    assert!(linked.is_some());
}

#[tokio::test]
async fn test_create_remote_links_and_queues_the_person() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice", "uid-alice").await;

    let body = json!({
        "connection_id": conn_id,
        "actions": [{"type": "create_remote", "local_person_id": "p1"}]
    });
    let response = app
        .oneshot(user_post("/api/mapping/activate", &body))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["succeeded"], 1);

    // Link uses the person's own stable uid as the remote identity
    let remote_uid = amity_sync::db::links::remote_uid_for_local(&pool, &conn_id, "p1")
        .await
        .unwrap();
    assert_eq!(remote_uid.as_deref(), Some("uid-alice"));

    // Person queued for outbound push
    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sync_outbox WHERE entity_uid = 'uid-alice' AND sent_at IS NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_mapping_state_suggests_name_matches() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice Smith", "uid-alice").await;
    insert_person(&pool, "p2", "Bob", "uid-bob").await;

    amity_sync::db::remote_cache::replace(
        &pool,
        &conn_id,
        &[amity_common::api::types::PeopleEntry {
            person_uid: "uid-remote-alice".to_string(),
            name: "Alice".to_string(),
            relationship_label: None,
        }],
        Utc::now(),
    )
    .await
    .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/mapping/{}", conn_id))
        .header("x-amity-user-id", "user-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    // First-token match staged as a suggested link; Bob defaults to create_remote
    assert_eq!(body["local_mappings"]["p1"]["action"], "link");
    assert_eq!(
        body["local_mappings"]["p1"]["remote_person_uid"],
        "uid-remote-alice"
    );
    assert_eq!(body["local_mappings"]["p2"]["action"], "create_remote");
    assert_eq!(body["suggested"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_changes"], true);
}

#[tokio::test]
async fn test_plan_applies_edits_and_derives_actions() {
    let (app, pool, _dir) = setup().await;
    let (conn_id, _secret) = insert_connection(&pool).await;
    insert_person(&pool, "p1", "Alice Smith", "uid-alice").await;
    insert_person(&pool, "p2", "Bob", "uid-bob").await;

    amity_sync::db::remote_cache::replace(
        &pool,
        &conn_id,
        &[
            amity_common::api::types::PeopleEntry {
                person_uid: "uid-remote-alice".to_string(),
                name: "Alice".to_string(),
                relationship_label: None,
            },
            amity_common::api::types::PeopleEntry {
                person_uid: "uid-remote-carol".to_string(),
                name: "Carol".to_string(),
                relationship_label: None,
            },
        ],
        Utc::now(),
    )
    .await
    .unwrap();

    // Exclude Carol and keep Bob out of sync; Alice's suggested link stands
    let body = json!({"edits": [
        {"op": "set_remote", "remote_person_uid": "uid-remote-carol", "action": "do_not_sync"},
        {"op": "set_local", "local_person_id": "p2", "action": "do_not_sync"},
    ]});
    let response = app
        .clone()
        .oneshot(user_post(&format!("/api/mapping/{}/plan", conn_id), &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let plan = extract_json(response.into_body()).await;
    assert_eq!(plan["has_changes"], true);
    assert!(plan["notices"].as_array().unwrap().is_empty());

    let actions = plan["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().any(|a| a["type"] == "link"
        && a["local_person_id"] == "p1"
        && a["remote_person_uid"] == "uid-remote-alice"));
    assert!(actions
        .iter()
        .any(|a| a["type"] == "exclude" && a["remote_person_uid"] == "uid-remote-carol"));

    // Stealing Alice's remote for Bob reports the reassignment
    let body = json!({"edits": [
        {"op": "link", "local_person_id": "p2", "remote_person_uid": "uid-remote-alice"},
    ]});
    let response = app
        .oneshot(user_post(&format!("/api/mapping/{}/plan", conn_id), &body))
        .await
        .unwrap();
    let plan = extract_json(response.into_body()).await;

    let notices = plan["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["kind"], "reassigned");
    assert_eq!(notices[0]["from_local_id"], "p1");
}
