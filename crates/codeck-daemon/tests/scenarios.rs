//! End-to-end scenarios spanning more than one component crate. Each test
//! builds state straight from the component crates' public APIs, the same
//! way `codeck-gateway`'s own router tests do, since this binary has no
//! library target for a `tests/` file to link against.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use codeck_auth::oauth::OAuthProviderConfig;
use codeck_auth::AuthPlane;
use codeck_config::ResolvedConfig;
use codeck_core::dirs::CodeckWorkspace;
use codeck_credstore::CredStore;
use codeck_gateway::{build_router, AppState};
use codeck_indexer::store::IndexStore;
use codeck_memory::store::{MemoryStore, Scope};
use codeck_pty::manager::PtyManager;
use codeck_pty::types::Geometry;
use codeck_scheduler::scheduler::AgentScheduler;

fn test_oauth_config() -> OAuthProviderConfig {
    OAuthProviderConfig {
        authorize_url: "https://example.invalid/authorize".to_string(),
        token_url: "https://example.invalid/token".to_string(),
        client_id: "test-client".to_string(),
        redirect_uri: "https://localhost/callback".to_string(),
        scope: "read".to_string(),
    }
}

async fn test_app_state(root: &std::path::Path) -> Arc<AppState> {
    let ws = CodeckWorkspace::from_path(root.join(".codeck"));
    ws.ensure().unwrap();

    let cred_store = Arc::new(
        CredStore::open(
            ws.credentials_file(),
            ws.credentials_backup_file(),
            ws.root().join("credentials.token-cache.json"),
            ws.auth_file(),
            &ws.encryption_key_file(),
        )
        .unwrap(),
    );
    let auth = Arc::new(AuthPlane::new(
        cred_store,
        ws.auth_sessions_file(),
        ws.root().join("oauth-state.json"),
        test_oauth_config(),
    ));
    auth.restore().await.unwrap();

    let pty = Arc::new(PtyManager::new(ws.clone(), "/bin/sh".to_string()));
    let scheduler = Arc::new(AgentScheduler::new(ws.clone(), "/bin/sh".to_string()));
    let memory = Arc::new(MemoryStore::new(ws.clone()));
    memory.load().await.unwrap();
    let indexer = Arc::new(IndexStore::open(&ws).await.unwrap());

    Arc::new(AppState::new(ws, auth, pty, scheduler, memory, indexer, ResolvedConfig::default()))
}

fn with_peer(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{ip}:9999").parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn login_request(password: &str, ip: &str) -> Request<Body> {
    with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"password":"{password}"}}"#)))
            .unwrap(),
        ip,
    )
}

/// Five wrong passwords from one IP lock it out; the sixth attempt is
/// rejected even with the correct password, with a positive retry-after.
#[tokio::test(flavor = "multi_thread")]
async fn password_lockout_then_rate_limited_on_sixth_attempt() {
    let tmp = tempfile::tempdir().unwrap();
    let app = build_router(test_app_state(tmp.path()).await);

    let setup_request = with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/auth/setup")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"password":"correctHorseBatteryStaple"}"#))
            .unwrap(),
        "10.0.0.1",
    );
    let setup_response = app.clone().oneshot(setup_request).await.unwrap();
    assert_eq!(setup_response.status(), StatusCode::OK);
    let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

    let protected_request = Request::builder()
        .uri("/api/console/list")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.clone().oneshot(protected_request).await.unwrap().status(),
        StatusCode::OK
    );

    for _ in 0..5 {
        let response = app.clone().oneshot(login_request("wrong", "10.0.0.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let sixth = app
        .clone()
        .oneshot(login_request("correctHorseBatteryStaple", "10.0.0.2"))
        .await
        .unwrap();
    assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(sixth).await;
    assert!(json["retryAfter"].as_u64().unwrap() > 0);

    // A different IP is unaffected by the lockout.
    let other_ip = app
        .clone()
        .oneshot(login_request("correctHorseBatteryStaple", "10.0.0.3"))
        .await
        .unwrap();
    assert_eq!(other_ip.status(), StatusCode::OK);
}

/// Detaching a client stops live fan-out and starts buffering into the
/// session's ring; reattaching replays exactly what was buffered, with no
/// loss or duplication.
#[tokio::test(flavor = "multi_thread")]
async fn pty_reattach_replays_exactly_what_was_buffered_while_detached() {
    let tmp = tempfile::tempdir().unwrap();
    let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
    ws.ensure().unwrap();
    let manager = PtyManager::new(ws, "/bin/sh".to_string());

    let id = manager.create_shell_session(tmp.path().to_path_buf()).await.unwrap();
    let client = Uuid::new_v4();
    let (initial, mut rx) = manager.attach(id, client, Geometry::INITIAL).unwrap();
    assert!(initial.is_empty());

    manager
        .write_input(id, b"printf 'ABC\\n'\n".to_vec())
        .await
        .unwrap();

    // Drain the live stream until the shell has echoed the command and its
    // output, so detaching afterward buffers only what comes next.
    let marker_seen = async {
        let mut seen = Vec::new();
        loop {
            let chunk = rx.recv().await.unwrap();
            seen.extend_from_slice(&chunk);
            if seen.windows(3).any(|w| w == b"ABC") {
                return;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), marker_seen)
        .await
        .expect("shell produced ABC before timeout");

    manager.detach(id, client).unwrap();

    manager
        .write_input(id, b"printf 'XYZ123\\n'\n".to_vec())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (replayed, _rx) = manager.attach(id, client, Geometry::INITIAL).unwrap();
    let occurrences = replayed
        .windows(6)
        .filter(|w| *w == b"XYZ123")
        .count();
    assert_eq!(occurrences, 1, "expected XYZ123 exactly once, got: {:?}", String::from_utf8_lossy(&replayed));

    manager.destroy(id).await.unwrap();
}

/// Markdown appended through `MemoryStore` is sanitized at write time; the
/// indexer serves whatever is already on disk, so a search never surfaces
/// the raw secret.
#[tokio::test(flavor = "multi_thread")]
async fn secret_in_daily_log_is_redacted_before_it_is_searchable() {
    let tmp = tempfile::tempdir().unwrap();
    let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
    ws.ensure().unwrap();

    let memory = MemoryStore::new(ws.clone());
    memory
        .append_daily(&Scope::Global, "token leaked: bearer ABCDEFGHIJKLMNOPQRSTUVWX")
        .await
        .unwrap();

    let indexer = IndexStore::open(&ws).await.unwrap();
    let indexed = indexer.full_sweep().await.unwrap();
    assert_eq!(indexed, 1);

    let hits = indexer.query("bearer".into(), 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(!hits[0].snippet.contains("ABCDEFGHIJKLMNOPQRSTUVWX"));
    assert!(hits[0].snippet.contains("[redacted]"));
}

/// A PKCE exchange with a mismatched `state` is rejected, the in-flight
/// login is cleaned up, and no credential is ever written.
#[tokio::test(flavor = "multi_thread")]
async fn oauth_state_mismatch_leaves_no_credential_behind() {
    let tmp = tempfile::tempdir().unwrap();
    let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
    ws.ensure().unwrap();

    let cred_store = Arc::new(
        CredStore::open(
            ws.credentials_file(),
            ws.credentials_backup_file(),
            ws.root().join("credentials.token-cache.json"),
            ws.auth_file(),
            &ws.encryption_key_file(),
        )
        .unwrap(),
    );
    let auth = AuthPlane::new(
        cred_store.clone(),
        ws.auth_sessions_file(),
        ws.root().join("oauth-state.json"),
        test_oauth_config(),
    );

    auth.start_oauth_login().await.unwrap();
    let err = auth.send_oauth_code("somecode#wrong-state").await.unwrap_err();
    assert!(matches!(err, codeck_auth::error::AuthError::OAuthStateMismatch));

    assert!(cred_store.read_cred().await.unwrap().is_none());
}

/// Two working directories whose canonical paths collide on the same
/// `pathId` are reported as a conflict over the real HTTP surface, now that
/// `console::create` runs every cwd through `PathResolver`.
#[tokio::test(flavor = "multi_thread")]
async fn path_id_collision_on_console_create_is_reported_as_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_app_state(tmp.path()).await;

    let real_dir = tmp.path().join("real");
    std::fs::create_dir_all(&real_dir).unwrap();
    let id = state.memory.resolve_path_id(&real_dir).await.unwrap();

    // Seed a prior claim of the same id against a different canonical path,
    // forcing a collision the next time this id is resolved.
    let persisted = serde_json::json!({ "entries": { (id.clone()): "/some/other/path" } });
    tokio::fs::write(
        state.workspace.paths_state_file(),
        serde_json::to_vec(&persisted).unwrap(),
    )
    .await
    .unwrap();

    // Rebuild the gateway state the same way a daemon restart would, so it
    // loads the collision we just seeded instead of the in-memory state
    // that minted `id` above.
    let app = build_router(reloaded_memory_state(tmp.path(), state).await);

    let setup_request = with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/auth/setup")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
            .unwrap(),
        "127.0.0.1",
    );
    let setup_response = app.clone().oneshot(setup_request).await.unwrap();
    let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

    let create_request = Request::builder()
        .method("POST")
        .uri("/api/console/create")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(format!(r#"{{"cwd":"{}"}}"#, real_dir.display())))
        .unwrap();
    let create_response = app.oneshot(create_request).await.unwrap();
    assert_eq!(create_response.status(), StatusCode::CONFLICT);
}

async fn reloaded_memory_state(root: &std::path::Path, previous: Arc<AppState>) -> Arc<AppState> {
    let ws = CodeckWorkspace::from_path(root.join(".codeck"));
    let memory = Arc::new(MemoryStore::new(ws.clone()));
    memory.load().await.unwrap();

    Arc::new(AppState::new(
        ws,
        previous.auth.clone(),
        previous.pty.clone(),
        previous.scheduler.clone(),
        memory,
        previous.indexer.clone(),
        ResolvedConfig::default(),
    ))
}
