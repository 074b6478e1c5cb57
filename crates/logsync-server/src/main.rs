mod auth;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use logsync_db::Db;
use logsync_store::{FsObjectStore, ObjectStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let db = Db::open(&config.data_dir.join("sync.sqlite3"))?;
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.data_dir.join("objects")));
    let bind_addr = config.bind_addr.clone();
    let body_limit = config.max_upload_body_bytes;
    let state = AppState::new(db, store, config);

    let app = build_router(state).layer(DefaultBodyLimit::max(body_limit));

    tracing::info!(%bind_addr, "starting logsync-server");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::health))
        .route("/api/v1/sync/init", post(routes::sync::init))
        .route("/api/v1/sync/chunk", post(routes::sync::chunk))
        .route("/api/v1/sync/event", post(routes::sync::event))
        .route("/api/v1/sessions/{id}/sync/file", get(routes::sessions::read_sync_file))
        .route("/api/v1/sessions/{id}", delete(routes::sessions::delete_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use logsync_store::InMemoryObjectStore;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Db::open_in_memory().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        AppState::new(db, store, AppConfig::from_env())
    }

    /// Creates user `1` and returns a raw API key that resolves to it.
    fn seed_owner_with_api_key(state: &AppState) -> String {
        state
            .db
            .with_conn(|conn| {
                let (sql, values) =
                    logsync_db::queries::users::insert(1, "owner@example.com", "Owner", logsync_core::UserStatus::Active);
                conn.execute(&sql, &*values.as_params())
            })
            .unwrap();

        let raw_key = "test-key-12345";
        let hash = auth::hash_api_key(raw_key);
        state
            .db
            .with_conn(|conn| {
                let (sql, values) =
                    logsync_db::queries::api_keys::insert(uuid::Uuid::new_v4(), 1, &hash, chrono::Utc::now());
                conn.execute(&sql, &*values.as_params())
            })
            .unwrap();
        raw_key.to_string()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn full_sync_and_read_round_trip() {
        let state = test_state();
        let api_key = seed_owner_with_api_key(&state);
        let app = build_router(state);

        let init_body = r#"{"external_id":"sess-1","transcript_path":"/tmp/t.jsonl","metadata":{"cwd":"/home/alice"}}"#;
        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/init")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::from(init_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(init_response.status(), StatusCode::OK);
        let init_json: serde_json::Value = serde_json::from_slice(&body_bytes(init_response).await).unwrap();
        let session_id = init_json["session_id"].as_str().unwrap().to_string();

        let chunk_body = serde_json::json!({
            "session_id": session_id,
            "file_name": "transcript.jsonl",
            "file_type": "transcript",
            "first_line": 1,
            "lines": ["{}", "{}"],
        })
        .to_string();
        let chunk_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/chunk")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::from(chunk_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(chunk_response.status(), StatusCode::OK);
        let chunk_json: serde_json::Value = serde_json::from_slice(&body_bytes(chunk_response).await).unwrap();
        assert_eq!(chunk_json["last_synced_line"], 2);

        let read_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/sessions/{session_id}/sync/file?file_name=transcript.jsonl"))
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(read_response.status(), StatusCode::OK);
        assert_eq!(body_bytes(read_response).await, b"{}\n{}\n");
    }

    #[tokio::test]
    async fn chunk_with_wrong_first_line_is_bad_request() {
        let state = test_state();
        let api_key = seed_owner_with_api_key(&state);
        let app = build_router(state);

        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/init")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::from(r#"{"external_id":"sess-1","transcript_path":"/tmp/t.jsonl"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let init_json: serde_json::Value = serde_json::from_slice(&body_bytes(init_response).await).unwrap();
        let session_id = init_json["session_id"].as_str().unwrap().to_string();

        let chunk_body = serde_json::json!({
            "session_id": session_id,
            "file_name": "transcript.jsonl",
            "file_type": "transcript",
            "first_line": 5,
            "lines": ["{}"],
        })
        .to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/chunk")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::from(chunk_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_session_requires_session_cookie() {
        let state = test_state();
        let api_key = seed_owner_with_api_key(&state);
        let app = build_router(state);

        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/init")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::from(r#"{"external_id":"sess-1","transcript_path":"/tmp/t.jsonl"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let init_json: serde_json::Value = serde_json::from_slice(&body_bytes(init_response).await).unwrap();
        let session_id = init_json["session_id"].as_str().unwrap().to_string();

        let no_cookie_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(no_cookie_response.status(), StatusCode::UNAUTHORIZED);

        let deleted_response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/sessions/{session_id}"))
                    .header("cookie", "session_user_id=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sync_init_without_api_key_is_unauthorized() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/init")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"external_id":"s1","transcript_path":"/t"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
