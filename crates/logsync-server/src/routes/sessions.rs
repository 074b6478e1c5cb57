use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logsync_core::ServiceError;
use logsync_db::Reader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{OptionalViewer, SessionUser};
use crate::error::{bad_request, ApiErr};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SyncFileQuery {
    pub file_name: String,
    #[serde(default)]
    pub line_offset: Option<i64>,
}

pub async fn read_sync_file(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SyncFileQuery>,
    OptionalViewer(viewer_user_id): OptionalViewer,
) -> Result<Response, ApiErr> {
    let line_offset = query.line_offset.unwrap_or(0);
    if line_offset < 0 {
        return Err(bad_request("line_offset must be >= 0"));
    }

    let reader = Reader::with_limits(
        state.db.clone(),
        state.store.clone(),
        state.config.metadata_deadline,
        state.config.object_store_deadline,
    );
    let outcome = reader
        .read_file(session_id, &query.file_name, viewer_user_id, line_offset)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        outcome.body,
    )
        .into_response())
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub message: String,
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    SessionUser(viewer_user_id): SessionUser,
) -> Result<Json<DeleteResponse>, ApiErr> {
    let session = state
        .db
        .with_conn(|conn| {
            let (sql, values) = logsync_db::queries::sessions::get_by_id(session_id);
            conn.query_row(&sql, &*values.as_params(), logsync_db::queries::sessions::row_to_session)
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ApiErr(ServiceError::not_found("session not found")),
            e => ApiErr(ServiceError::from_db::<rusqlite::Error>("loading session")(e)),
        })?;

    if session.owner_user_id != viewer_user_id {
        return Err(ApiErr(ServiceError::forbidden("not the session owner")));
    }

    let prefix = logsync_core::session_chunk_prefix(session.owner_user_id, &session.external_id);
    if let Err(e) = state.store.delete_prefix(&prefix).await {
        tracing::warn!(error = %e, "delete_session: object store prefix deletion failed, continuing");
    }

    state
        .db
        .with_conn(|conn| {
            let (sql, values) = logsync_db::queries::sessions::delete(session_id);
            conn.execute(&sql, &*values.as_params())
        })
        .map_err(|e| ApiErr(ServiceError::from_db::<rusqlite::Error>("deleting session")(e)))?;

    Ok(Json(DeleteResponse {
        success: true,
        session_id,
        message: "session deleted".to_string(),
    }))
}
