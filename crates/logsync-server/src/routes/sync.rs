use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use logsync_core::{FileType, InitMetadata, SessionEventType};
use logsync_db::registry::InitParams;
use logsync_db::sync_engine::{ChunkMetadata, UploadChunkRequest};
use logsync_db::{ChunkSyncEngine, SessionRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::ApiKeyAuth;
use crate::error::{bad_request, ApiErr};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InitRequestMetadata {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_info: Option<Value>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct InitRequest {
    pub external_id: String,
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_info: Option<Value>,
    #[serde(default)]
    pub metadata: Option<InitRequestMetadata>,
}

#[derive(Serialize)]
pub struct InitResponse {
    pub session_id: Uuid,
    pub files: HashMap<String, i64>,
}

pub async fn init(
    State(state): State<AppState>,
    ApiKeyAuth { owner_user_id }: ApiKeyAuth,
    Json(req): Json<InitRequest>,
) -> Result<Json<InitResponse>, ApiErr> {
    let metadata = req.metadata.map(|m| InitMetadata {
        cwd: m.cwd,
        git_info: m.git_info,
        hostname: m.hostname,
        username: m.username,
    });

    let registry = SessionRegistry::new(state.db.clone());
    let result = registry.find_or_create(InitParams {
        owner_user_id,
        external_id: req.external_id,
        transcript_path: req.transcript_path,
        deprecated_cwd: req.cwd,
        deprecated_git_info: req.git_info,
        metadata: metadata.unwrap_or_default(),
    })?;

    Ok(Json(InitResponse {
        session_id: result.session_id,
        files: result.files,
    }))
}

#[derive(Deserialize)]
pub struct ChunkRequestMetadata {
    #[serde(default)]
    pub git_info: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub first_user_message: Option<String>,
}

#[derive(Deserialize)]
pub struct ChunkRequest {
    pub session_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub first_line: i64,
    pub lines: Vec<String>,
    #[serde(default)]
    pub metadata: Option<ChunkRequestMetadata>,
}

#[derive(Serialize)]
pub struct ChunkResponse {
    pub last_synced_line: i64,
}

pub async fn chunk(
    State(state): State<AppState>,
    ApiKeyAuth { owner_user_id }: ApiKeyAuth,
    Json(req): Json<ChunkRequest>,
) -> Result<Json<ChunkResponse>, ApiErr> {
    let file_type =
        FileType::parse(&req.file_type).ok_or_else(|| bad_request(format!("invalid file_type: {}", req.file_type)))?;

    let engine = ChunkSyncEngine::with_limits(
        state.db.clone(),
        state.store.clone(),
        state.config.max_chunks_per_file,
        state.config.metadata_deadline,
        state.config.object_store_deadline,
    );
    let result = engine
        .upload_chunk(UploadChunkRequest {
            viewer_user_id: owner_user_id,
            session_id: req.session_id,
            file_name: req.file_name,
            file_type,
            first_line: req.first_line,
            lines: req.lines,
            metadata: req.metadata.map(|m| ChunkMetadata {
                git_info: m.git_info,
                summary: m.summary,
                first_user_message: m.first_user_message,
            }),
        })
        .await?;

    Ok(Json(ChunkResponse {
        last_synced_line: result.last_synced_line,
    }))
}

#[derive(Deserialize)]
pub struct EventRequest {
    pub session_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub success: bool,
}

pub async fn event(
    State(state): State<AppState>,
    ApiKeyAuth { owner_user_id }: ApiKeyAuth,
    Json(req): Json<EventRequest>,
) -> Result<Json<EventResponse>, ApiErr> {
    let event_type = SessionEventType::parse(&req.event_type)
        .ok_or_else(|| bad_request(format!("invalid event_type: {}", req.event_type)))?;

    let session = state
        .db
        .with_conn(|conn| {
            let (sql, values) = logsync_db::queries::sessions::get_by_id(req.session_id);
            conn.query_row(&sql, &*values.as_params(), logsync_db::queries::sessions::row_to_session)
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ApiErr(logsync_core::ServiceError::not_found("session not found"))
            }
            e => ApiErr(logsync_core::ServiceError::from_db::<rusqlite::Error>("loading session")(e)),
        })?;

    if session.owner_user_id != owner_user_id {
        return Err(ApiErr(logsync_core::ServiceError::forbidden("not the session owner")));
    }

    state
        .db
        .with_conn(|conn| {
            let (sql, values) = logsync_db::queries::events::insert(
                Uuid::new_v4(),
                req.session_id,
                event_type.as_str(),
                req.timestamp,
                &req.payload,
            );
            conn.execute(&sql, &*values.as_params())
        })
        .map_err(|e| ApiErr(logsync_core::ServiceError::from_db::<rusqlite::Error>("inserting event")(e)))?;

    Ok(Json(EventResponse { success: true }))
}
