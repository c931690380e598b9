//! Assembles the full axum `Router`: routes, auth middleware, and the
//! security/trust layers every response passes through.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth_middleware::require_session;
use crate::http::{agents, auth, config, console, indexer, memory};
use crate::state::SharedState;
use crate::ws::{internal_ws_upgrade, operator_ws_upgrade};

/// Largest request body the gateway accepts; matches the WS input frame
/// cap so no surface admits a larger payload than the other.
const MAX_BODY_BYTES: usize = 64 * 1024;

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Build the complete router for `state`.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/api/auth/status", get(auth::status))
        .route("/api/auth/setup", post(auth::setup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/config", get(config::show))
        .route("/api/console/create", post(console::create))
        .route("/api/console/create-shell", post(console::create_shell))
        .route("/api/console/resize", post(console::resize))
        .route("/api/console/rename", post(console::rename))
        .route("/api/console/destroy", post(console::destroy))
        .route("/api/console/list", get(console::list))
        .route("/api/memory/read", get(memory::read))
        .route("/api/memory/append", post(memory::append))
        .route("/api/memory/flush", post(memory::flush))
        .route("/api/index/search", get(indexer::search))
        .route("/api/index/sweep", post(indexer::sweep))
        .route("/api/index/optimize", post(indexer::optimize))
        .route("/api/agents", get(agents::list).post(agents::create))
        .route("/api/agents/{id}", get(agents::get).put(agents::update).delete(agents::delete))
        .route("/api/agents/{id}/pause", post(agents::pause))
        .route("/api/agents/{id}/resume", post(agents::resume))
        .route("/api/agents/{id}/trigger", post(agents::trigger))
        .route("/ws", get(operator_ws_upgrade))
        .route("/internal/pty/{id}", get(internal_ws_upgrade))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    api.layer(middleware::from_fn(security_headers))
}

// These use `tower::ServiceExt::oneshot` to send requests through the axum
// router without starting a real HTTP server or TLS listener.
#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use codeck_auth::oauth::OAuthProviderConfig;
    use codeck_auth::AuthPlane;
    use codeck_config::ResolvedConfig;
    use codeck_core::dirs::CodeckWorkspace;
    use codeck_credstore::CredStore;
    use codeck_indexer::store::IndexStore;
    use codeck_memory::store::MemoryStore;
    use codeck_pty::manager::PtyManager;
    use codeck_scheduler::scheduler::AgentScheduler;

    use super::build_router;
    use crate::state::AppState;

    fn test_oauth_config() -> OAuthProviderConfig {
        OAuthProviderConfig {
            authorize_url: "https://example.invalid/authorize".to_string(),
            token_url: "https://example.invalid/token".to_string(),
            client_id: "test-client".to_string(),
            redirect_uri: "https://localhost/callback".to_string(),
            scope: "read".to_string(),
        }
    }

    async fn test_state_with_config(root: &std::path::Path, resolved_config: ResolvedConfig) -> Arc<AppState> {
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

        Arc::new(AppState::new(ws, auth, pty, scheduler, memory, indexer, resolved_config))
    }

    async fn test_state(root: &std::path::Path) -> Arc<AppState> {
        test_state_with_config(root, ResolvedConfig::default()).await
    }

    fn with_peer(mut request: Request<Body>) -> Request<Body> {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn auth_status_is_public_and_reports_unconfigured() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let request = Request::builder().uri("/api/auth/status").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["configured"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn protected_route_without_token_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let request = Request::builder().uri("/api/console/list").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["needsAuth"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn setup_then_authenticated_request_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        assert_eq!(setup_response.status(), StatusCode::OK);
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let list_request = Request::builder()
            .uri("/api/console/list")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let list_response = app.oneshot(list_request).await.unwrap();
        assert_eq!(list_response.status(), StatusCode::OK);

        let json = body_json(list_response).await;
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn setup_rejects_short_password() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"short"}"#))
                .unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn setup_twice_is_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let first = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::OK);

        let second = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"another long password"}"#))
                .unwrap(),
        );
        let response = app.oneshot(second).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn security_headers_are_present() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let request = Request::builder().uri("/api/auth/status").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn config_endpoint_redacts_internal_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let mut resolved = ResolvedConfig::default();
        resolved.values.gateway.internal_shared_secret = Some("top-secret".to_string());
        let app = build_router(test_state_with_config(tmp.path(), resolved).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/config")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["values"]["gateway"]["internal_shared_secret"], "***redacted***");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn console_create_shell_and_destroy() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let create_request = Request::builder()
            .method("POST")
            .uri("/api/console/create-shell")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"cwd":"{}"}}"#, tmp.path().display())))
            .unwrap();
        let create_response = app.clone().oneshot(create_request).await.unwrap();
        assert_eq!(create_response.status(), StatusCode::OK);
        let created = body_json(create_response).await;
        let session_id = created["sessionId"].as_str().unwrap().to_string();

        let destroy_request = Request::builder()
            .method("POST")
            .uri("/api/console/destroy")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"sessionId":"{session_id}"}}"#)))
            .unwrap();
        let destroy_response = app.oneshot(destroy_request).await.unwrap();
        assert_eq!(destroy_response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn agent_crud_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let create_body = serde_json::json!({
            "name": "nightly-sweep",
            "cwd": tmp.path().display().to_string(),
            "objective": "sweep the index nightly",
            "cronExpr": "0 3 * * *",
        });
        let create_request = Request::builder()
            .method("POST")
            .uri("/api/agents")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(create_body.to_string()))
            .unwrap();
        let create_response = app.clone().oneshot(create_request).await.unwrap();
        assert_eq!(create_response.status(), StatusCode::OK);
        let created = body_json(create_response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let list_request = Request::builder()
            .uri("/api/agents")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let list_response = app.clone().oneshot(list_request).await.unwrap();
        let list_json = body_json(list_response).await;
        assert_eq!(list_json.as_array().unwrap().len(), 1);

        let delete_request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/agents/{id}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let delete_response = app.oneshot(delete_request).await.unwrap();
        assert_eq!(delete_response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn agent_create_rejects_bad_cron() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let create_body = serde_json::json!({
            "name": "bad-agent",
            "cwd": tmp.path().display().to_string(),
            "objective": "do something",
            "cronExpr": "not a cron expression",
        });
        let create_request = Request::builder()
            .method("POST")
            .uri("/api/agents")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(create_body.to_string()))
            .unwrap();
        let response = app.oneshot(create_request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_append_then_read_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let append_request = Request::builder()
            .method("POST")
            .uri("/api/memory/append")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"markdown":"shipped the release"}"#))
            .unwrap();
        assert_eq!(app.clone().oneshot(append_request).await.unwrap().status(), StatusCode::OK);

        let read_request = Request::builder()
            .uri("/api/memory/read?days=3")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let read_response = app.oneshot(read_request).await.unwrap();
        assert_eq!(read_response.status(), StatusCode::OK);
        let json = body_json(read_response).await;
        assert!(json["markdown"].as_str().unwrap().contains("shipped the release"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn index_search_on_empty_store_returns_no_hits() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()).await);

        let setup_request = with_peer(
            Request::builder()
                .method("POST")
                .uri("/api/auth/setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"password":"correct horse battery staple"}"#))
                .unwrap(),
        );
        let setup_response = app.clone().oneshot(setup_request).await.unwrap();
        let token = body_json(setup_response).await["token"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/index/search?q=release")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["hits"].as_array().unwrap().len(), 0);
    }
}
