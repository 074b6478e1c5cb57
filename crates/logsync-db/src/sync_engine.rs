//! Chunk Sync Engine: validates and persists one uploaded chunk of a file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use logsync_core::{
    chunk_object_key, validate, FileType, ServiceError, UserStatus, DEFAULT_METADATA_DEADLINE,
    DEFAULT_OBJECT_STORE_DEADLINE, MAX_CHUNKS_PER_FILE,
};
use logsync_store::ObjectStore;
use serde_json::Value;
use uuid::Uuid;

use crate::db::Db;
use crate::queries::sessions::{self, MetadataUpdate};
use crate::queries::{sync_files, users};

/// Per-chunk metadata, applied only when the file being uploaded is a
/// transcript.
#[derive(Debug, Clone, Default)]
pub struct ChunkMetadata {
    pub git_info: Option<Value>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadChunkRequest {
    pub viewer_user_id: i64,
    pub session_id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub first_line: i64,
    pub lines: Vec<String>,
    pub metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunkResult {
    pub last_synced_line: i64,
}

pub struct ChunkSyncEngine<S: ObjectStore> {
    db: Db,
    store: S,
    max_chunks_per_file: i64,
    metadata_deadline: Duration,
    object_store_deadline: Duration,
}

impl<S: ObjectStore> ChunkSyncEngine<S> {
    pub fn new(db: Db, store: S) -> Self {
        Self::with_limits(
            db,
            store,
            MAX_CHUNKS_PER_FILE,
            DEFAULT_METADATA_DEADLINE,
            DEFAULT_OBJECT_STORE_DEADLINE,
        )
    }

    /// Constructor that takes the operator-configured overrides
    /// (`SYNC_MAX_CHUNKS_PER_FILE`, `SYNC_METADATA_DEADLINE_MS`,
    /// `SYNC_OBJECT_STORE_DEADLINE_MS`) instead of the defaults.
    pub fn with_limits(
        db: Db,
        store: S,
        max_chunks_per_file: i64,
        metadata_deadline: Duration,
        object_store_deadline: Duration,
    ) -> Self {
        Self {
            db,
            store,
            max_chunks_per_file,
            metadata_deadline,
            object_store_deadline,
        }
    }

    pub async fn upload_chunk(&self, req: UploadChunkRequest) -> Result<UploadChunkResult, ServiceError> {
        validate::file_name(&req.file_name)?;
        if req.first_line < 1 {
            return Err(ServiceError::bad_request("first_line must be >= 1"));
        }
        if req.lines.is_empty() {
            return Err(ServiceError::bad_request("lines must not be empty"));
        }
        if let Some(meta) = &req.metadata {
            if let Some(summary) = &meta.summary {
                validate::summary(summary)?;
            }
            if let Some(msg) = &meta.first_user_message {
                validate::first_user_message(msg)?;
            }
        }

        let (owner_user_id, external_id) = self.load_session_identity(req.session_id).await?;
        if req.viewer_user_id != owner_user_id {
            return Err(ServiceError::forbidden("not the session owner"));
        }
        if self.owner_status(owner_user_id).await? == UserStatus::Inactive {
            return Err(ServiceError::forbidden("session owner account is inactive"));
        }

        let existing = self.load_sync_file(req.session_id, &req.file_name).await?;
        let expected_first_line = existing.as_ref().map(|f| f.last_synced_line + 1).unwrap_or(1);
        if req.first_line != expected_first_line {
            return Err(ServiceError::bad_request(format!(
                "first_line must be {expected_first_line}, got {}",
                req.first_line
            )));
        }

        if let Some(count) = existing.as_ref().and_then(|f| f.chunk_count) {
            if count >= self.max_chunks_per_file {
                return Err(ServiceError::bad_request(format!(
                    "file has reached the maximum of {} chunks",
                    self.max_chunks_per_file
                )));
            }
        }

        let last_line = req.first_line + req.lines.len() as i64 - 1;
        let content = {
            let mut buf = req.lines.join("\n");
            buf.push('\n');
            buf.into_bytes()
        };

        let latest_message_ts = if req.file_type == FileType::Transcript {
            scan_max_timestamp(&req.lines)
        } else {
            None
        };

        let key = chunk_object_key(owner_user_id, &external_id, &req.file_name, req.first_line, last_line);
        match tokio::time::timeout(self.object_store_deadline, self.store.put_object(&key, content)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ServiceError::from(e)),
            Err(_elapsed) => return Err(ServiceError::service_unavailable("object store deadline exceeded")),
        }

        // Chunk is durable now; a failure below orphans it harmlessly —
        // the next retry starts from the same unchanged expected_first_line.
        self.apply_post_upload(req, last_line, latest_message_ts).await?;

        Ok(UploadChunkResult {
            last_synced_line: last_line,
        })
    }

    async fn load_session_identity(&self, session_id: Uuid) -> Result<(i64, String), ServiceError> {
        self.db
            .with_conn_timeout(
                self.metadata_deadline,
                move |conn| {
                    let (sql, values) = sessions::get_by_id(session_id);
                    conn.query_row(&sql, &*values.as_params(), sessions::row_to_session)
                },
                |e| match e {
                    rusqlite::Error::QueryReturnedNoRows => ServiceError::not_found("session not found"),
                    e => ServiceError::from_db("loading session")(e),
                },
            )
            .await
            .map(|s| (s.owner_user_id, s.external_id))
    }

    async fn owner_status(&self, owner_user_id: i64) -> Result<UserStatus, ServiceError> {
        self.db
            .with_conn_timeout(
                self.metadata_deadline,
                move |conn| {
                    let (sql, values) = users::get_by_id(owner_user_id);
                    conn.query_row(&sql, &*values.as_params(), users::row_to_user)
                },
                ServiceError::from_db("loading session owner"),
            )
            .await
            .map(|u| u.status)
    }

    async fn load_sync_file(
        &self,
        session_id: Uuid,
        file_name: &str,
    ) -> Result<Option<logsync_core::SyncFile>, ServiceError> {
        let file_name = file_name.to_string();
        self.db
            .with_conn_timeout(
                self.metadata_deadline,
                move |conn| {
                    let (sql, values) = sync_files::get(session_id, &file_name);
                    match conn.query_row(&sql, &*values.as_params(), sync_files::row_to_sync_file) {
                        Ok(f) => Ok(Some(f)),
                        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                        Err(e) => Err(e),
                    }
                },
                ServiceError::from_db("loading sync file"),
            )
            .await
    }

    async fn apply_post_upload(
        &self,
        req: UploadChunkRequest,
        last_line: i64,
        latest_message_ts: Option<DateTime<Utc>>,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        self.db
            .with_conn_timeout(
                self.metadata_deadline,
                move |conn| {
                    let (sql, values) = sync_files::upsert_after_chunk(
                        req.session_id,
                        &req.file_name,
                        req.file_type,
                        last_line,
                        latest_message_ts,
                        now,
                    );
                    conn.execute(&sql, &*values.as_params())?;

                    if req.file_type == FileType::Transcript {
                        if let Some(meta) = &req.metadata {
                            let update = MetadataUpdate {
                                git_info: meta
                                    .git_info
                                    .as_ref()
                                    .map(serde_json::to_string)
                                    .transpose()
                                    .map_err(|e| {
                                        rusqlite::Error::ToSqlConversionFailure(e.into())
                                    })?,
                                summary: meta.summary.clone(),
                                first_user_message: None,
                                last_message_at: latest_message_ts,
                            };
                            if update.git_info.is_some() || update.summary.is_some() || update.last_message_at.is_some() {
                                let (sql, values) = sessions::update_metadata(req.session_id, &update, now);
                                conn.execute(&sql, &*values.as_params())?;
                            }

                            if let Some(first_message) = &meta.first_user_message {
                                // first-write-wins: only set if currently NULL.
                                conn.execute(
                                    "UPDATE sessions SET first_user_message = ?1 WHERE id = ?2 AND first_user_message IS NULL",
                                    rusqlite::params![first_message, req.session_id.to_string()],
                                )?;
                            }
                        }
                    }
                    Ok(())
                },
                ServiceError::from_db("applying post-upload metadata"),
            )
            .await
    }
}

/// Scan transcript lines for a top-level `timestamp` field in RFC3339 or
/// RFC3339Nano form, tracking the maximum seen.
fn scan_max_timestamp(lines: &[String]) -> Option<DateTime<Utc>> {
    let mut max: Option<DateTime<Utc>> = None;
    for line in lines {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(ts_str) = value.get("timestamp").and_then(Value::as_str) else {
            continue;
        };
        let Ok(parsed) = DateTime::parse_from_rfc3339(ts_str) else {
            continue;
        };
        let parsed = parsed.with_timezone(&Utc);
        max = Some(match max {
            Some(current) if current >= parsed => current,
            _ => parsed,
        });
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsync_core::UserStatus;
    use logsync_store::InMemoryObjectStore;

    fn engine_with_session() -> (ChunkSyncEngine<InMemoryObjectStore>, Uuid) {
        let (db, session_id) = db_with_session();
        (ChunkSyncEngine::new(db, InMemoryObjectStore::new()), session_id)
    }

    fn db_with_session() -> (Db, Uuid) {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (sql, values) = crate::queries::users::insert(1, "a@example.com", "Alice", UserStatus::Active);
            conn.execute(&sql, &*values.as_params())
        })
        .unwrap();

        let registry = crate::registry::SessionRegistry::new(db.clone());
        let init = registry
            .find_or_create(crate::registry::InitParams {
                owner_user_id: 1,
                external_id: "sess-1".to_string(),
                transcript_path: "/tmp/t.jsonl".to_string(),
                deprecated_cwd: None,
                deprecated_git_info: None,
                metadata: logsync_core::InitMetadata {
                    cwd: Some("/home/alice".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();

        (db, init.session_id)
    }

    fn upload(session_id: Uuid, first_line: i64, lines: Vec<&str>) -> UploadChunkRequest {
        UploadChunkRequest {
            viewer_user_id: 1,
            session_id,
            file_name: "transcript.jsonl".to_string(),
            file_type: FileType::Transcript,
            first_line,
            lines: lines.into_iter().map(String::from).collect(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn first_chunk_must_start_at_line_one() {
        let (engine, session_id) = engine_with_session();
        let err = engine
            .upload_chunk(upload(session_id, 2, vec!["{}"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn sequential_chunks_advance_last_synced_line() {
        let (engine, session_id) = engine_with_session();
        let first = engine
            .upload_chunk(upload(session_id, 1, vec!["{}", "{}"]))
            .await
            .unwrap();
        assert_eq!(first.last_synced_line, 2);

        let second = engine
            .upload_chunk(upload(session_id, 3, vec!["{}"]))
            .await
            .unwrap();
        assert_eq!(second.last_synced_line, 3);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let (engine, session_id) = engine_with_session();
        let mut req = upload(session_id, 1, vec!["{}"]);
        req.viewer_user_id = 999;
        let err = engine.upload_chunk(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn first_user_message_wins_on_first_write_only() {
        let (engine, session_id) = engine_with_session();
        let mut req1 = upload(session_id, 1, vec!["{}"]);
        req1.metadata = Some(ChunkMetadata {
            first_user_message: Some("hello".to_string()),
            ..Default::default()
        });
        engine.upload_chunk(req1).await.unwrap();

        let mut req2 = upload(session_id, 2, vec!["{}"]);
        req2.metadata = Some(ChunkMetadata {
            first_user_message: Some("should not overwrite".to_string()),
            ..Default::default()
        });
        engine.upload_chunk(req2).await.unwrap();

        let session = engine
            .db
            .with_conn(|conn| {
                let (sql, values) = sessions::get_by_id(session_id);
                conn.query_row(&sql, &*values.as_params(), sessions::row_to_session)
            })
            .unwrap();
        assert_eq!(session.first_user_message.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn inactive_owner_is_forbidden_even_for_the_owner() {
        let (db, session_id) = db_with_session();
        db.with_conn(|conn| conn.execute("UPDATE users SET status = 'inactive' WHERE id = 1", []))
            .unwrap();
        let engine = ChunkSyncEngine::new(db, InMemoryObjectStore::new());
        let err = engine
            .upload_chunk(upload(session_id, 1, vec!["{}"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    /// Simulates a crash between a committed object-store PUT and the
    /// metadata update that should follow it, then a client retry once it
    /// notices the upload never completed.
    #[tokio::test]
    async fn retry_after_orphaned_put_is_gated_until_client_reinits() {
        let (engine, session_id) = engine_with_session();

        engine
            .upload_chunk(upload(session_id, 1, vec!["A", "B"]))
            .await
            .unwrap();

        // The object for lines 3-4 lands in the store directly, bypassing
        // upload_chunk entirely, standing in for a PUT that committed right
        // before the process died before the metadata upsert ran. Metadata
        // still reports last_synced_line = 2.
        let orphan_key = logsync_core::chunk_object_key(1, "sess-1", "transcript.jsonl", 3, 4);
        engine.store.put_object(&orphan_key, b"C\nD\n".to_vec()).await.unwrap();

        // A client that believes the orphaned chunk's metadata update
        // succeeded and tries to continue from line 5 is rejected: the
        // contiguity gate trusts only the database, which still expects 3.
        let err = engine
            .upload_chunk(upload(session_id, 5, vec!["E"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        // Re-reading state the way a client does via init reports the
        // pre-failure high-water mark, not the orphaned chunk's range.
        let registry = crate::registry::SessionRegistry::new(engine.db.clone());
        let reinit = registry
            .find_or_create(crate::registry::InitParams {
                owner_user_id: 1,
                external_id: "sess-1".to_string(),
                transcript_path: "/tmp/t.jsonl".to_string(),
                deprecated_cwd: None,
                deprecated_git_info: None,
                metadata: logsync_core::InitMetadata::default(),
            })
            .unwrap();
        assert_eq!(reinit.files.get("transcript.jsonl"), Some(&2));

        // Retrying from the reported high-water mark succeeds, overwriting
        // the orphaned object at the same key with the client's resend.
        let retried = engine
            .upload_chunk(upload(session_id, 3, vec!["C", "D"]))
            .await
            .unwrap();
        assert_eq!(retried.last_synced_line, 4);
    }
}
