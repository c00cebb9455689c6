use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use control_hub_client::{ControlHubClient, ControlHubConfig, Receipt, TogglesUpdate};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Clone)]
struct StubState {
    hits: Arc<Mutex<Vec<String>>>,
}

struct ControlApiStub {
    base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ControlApiStub {
    async fn hit_count(&self, name: &str) -> usize {
        let hits = self.hits.lock().await;
        hits.iter().filter(|hit| hit.as_str() == name).count()
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn spawn_control_api_stub() -> Result<ControlApiStub> {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = StubState { hits: hits.clone() };
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/admin/toggles", get(get_toggles).put(put_toggles))
        .route("/api/admin/diagnostics", post(diagnostics))
        .route("/api/receipts", get(receipts))
        .route("/api/mandates/:id", post(revoke_mandate))
        .route("/api/admin/license", put(reject_license))
        .route("/api/broken", get(broken))
        .route("/api/garbage", get(garbage))
        .route("/api/wrong-shape", get(wrong_shape))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });

    Ok(ControlApiStub {
        base_url: format!("http://{addr}"),
        hits,
        shutdown: Some(shutdown_tx),
    })
}

async fn record_hit(hits: &Arc<Mutex<Vec<String>>>, name: &str) {
    let mut guard = hits.lock().await;
    guard.push(name.to_string());
}

async fn health(State(state): State<StubState>) -> Json<Value> {
    record_hit(&state.hits, "health").await;
    Json(json!({"ok": true}))
}

async fn get_toggles(State(state): State<StubState>) -> Json<Value> {
    record_hit(&state.hits, "get_toggles").await;
    Json(json!({"LOOP_ENABLED": true, "SYNTHETIC_RATE": "25"}))
}

async fn put_toggles(State(state): State<StubState>, Json(_body): Json<Value>) -> Json<Value> {
    record_hit(&state.hits, "put_toggles").await;
    Json(json!({"ok": true}))
}

async fn diagnostics(State(state): State<StubState>, Json(_body): Json<Value>) -> Json<Value> {
    record_hit(&state.hits, "diagnostics").await;
    Json(json!({"ok": true}))
}

async fn receipts(State(state): State<StubState>) -> Json<Value> {
    record_hit(&state.hits, "receipts").await;
    Json(json!([
        {"id": 1, "rail": "X402", "status": "CONFIRMED", "createdAt": 1_700_000_000_000_i64,
         "payload": {"memo": "diag"}}
    ]))
}

async fn revoke_mandate(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    Json(_body): Json<Value>,
) -> impl IntoResponse {
    record_hit(&state.hits, "revoke_mandate").await;
    if id == 123 {
        (StatusCode::OK, Json(json!({}))).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response()
    }
}

async fn reject_license(State(state): State<StubState>, Json(_body): Json<Value>) -> impl IntoResponse {
    record_hit(&state.hits, "reject_license").await;
    (StatusCode::BAD_REQUEST, Json(json!({"error": "missing_key"})))
}

async fn broken(State(state): State<StubState>) -> impl IntoResponse {
    record_hit(&state.hits, "broken").await;
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn garbage(State(state): State<StubState>) -> impl IntoResponse {
    record_hit(&state.hits, "garbage").await;
    // 2xx with a body that is not JSON at all.
    (StatusCode::OK, "not json")
}

async fn wrong_shape(State(state): State<StubState>) -> Json<Value> {
    record_hit(&state.hits, "wrong_shape").await;
    // Valid JSON, but not the shape any DTO expects.
    Json(json!({"unexpected": {"nested": true}}))
}

fn client_for(stub: &ControlApiStub, cache_ttl_ms: u64) -> ControlHubClient {
    let mut config = ControlHubConfig::new(stub.base_url.clone());
    config.cache_ttl_ms = cache_ttl_ms;
    ControlHubClient::new(&config)
}

#[tokio::test]
async fn failed_reads_collapse_to_none() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 5_000);

    // Server error.
    assert_eq!(client.fetch_json("/api/broken").await, None);
    // Unknown route (404).
    assert_eq!(client.fetch_json("/api/nope").await, None);
    stub.stop().await;

    // Connection refused: grab a port with no listener behind it.
    let vacant = TcpListener::bind("127.0.0.1:0").await?;
    let addr = vacant.local_addr()?;
    drop(vacant);
    let offline = ControlHubClient::new(&ControlHubConfig::new(format!("http://{addr}")));
    assert_eq!(offline.fetch_json("/api/health").await, None);
    assert!(!offline.health().await);
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_collapse_to_none() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 5_000);

    // 2xx with a non-JSON body never escapes the facade.
    assert_eq!(client.fetch_json("/api/garbage").await, None);
    assert_eq!(stub.hit_count("garbage").await, 1);

    // Valid JSON of the wrong shape fails the typed decode, not the caller.
    assert!(
        client
            .fetch_as::<Vec<Receipt>>("/api/wrong-shape")
            .await
            .is_none()
    );
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn reads_within_ttl_hit_cache_once() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 5_000);

    assert!(client.fetch_json("/api/health").await.is_some());
    assert!(client.fetch_json("/api/health").await.is_some());
    assert_eq!(stub.hit_count("health").await, 1);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn reads_after_ttl_expiry_refetch() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 50);

    assert!(client.fetch_json("/api/health").await.is_some());
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    assert!(client.fetch_json("/api/health").await.is_some());
    assert_eq!(stub.hit_count("health").await, 2);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn successful_write_clears_whole_cache() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 60_000);

    assert!(client.fetch_json("/api/health").await.is_some());
    assert!(client.receipts().await.is_some());
    assert!(client.run_diagnostics().await);

    // Both previously-cached paths re-fetch despite the generous TTL.
    assert!(client.fetch_json("/api/health").await.is_some());
    assert!(client.receipts().await.is_some());
    assert_eq!(stub.hit_count("health").await, 2);
    assert_eq!(stub.hit_count("receipts").await, 2);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn failed_write_leaves_cache_intact() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 60_000);

    assert!(client.fetch_json("/api/health").await.is_some());
    assert!(!client.rotate_license("").await);
    assert!(client.fetch_json("/api/health").await.is_some());
    assert_eq!(stub.hit_count("health").await, 1);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn revoke_reports_success_and_failure() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 60_000);

    assert!(client.fetch_json("/api/health").await.is_some());

    // 404 revocation fails and performs no invalidation.
    assert!(!client.revoke_mandate(999).await);
    assert!(client.fetch_json("/api/health").await.is_some());
    assert_eq!(stub.hit_count("health").await, 1);

    // 200 with an empty-object body succeeds and clears the cache.
    assert!(client.revoke_mandate(123).await);
    assert!(client.fetch_json("/api/health").await.is_some());
    assert_eq!(stub.hit_count("health").await, 2);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn toggles_round_trip_coerces_rate() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 5_000);

    let toggles = client.toggles().await.expect("toggles fetch");
    assert!(toggles.loop_enabled);
    assert_eq!(toggles.synthetic_rate, 25);

    // Resubmission sends the full known field set.
    let update = TogglesUpdate {
        synthetic_rate: 50,
        ..toggles.to_update()
    };
    assert!(client.save_toggles(&update).await);
    assert_eq!(stub.hit_count("put_toggles").await, 1);
    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn receipt_decoding_exposes_payload_memo() -> Result<()> {
    let stub = spawn_control_api_stub().await?;
    let client = client_for(&stub, 5_000);

    let receipts = client.receipts().await.expect("receipts fetch");
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, "CONFIRMED");
    assert_eq!(receipts[0].memo(), Some("diag"));
    stub.stop().await;
    Ok(())
}
