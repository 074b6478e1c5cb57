//! Reader: canonical file read with bounded-concurrency chunk download.

use std::sync::Arc;
use std::time::Duration;

use logsync_core::merge::{filter_from_offset, merge_chunks};
use logsync_core::{
    chunk_prefix, parse_chunk_key, AccessType, DownloadedChunk, ServiceError, Session,
    DEFAULT_METADATA_DEADLINE, DEFAULT_OBJECT_STORE_DEADLINE, READ_DOWNLOAD_CONCURRENCY,
};
use logsync_store::ObjectStore;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::access::AccessResolver;
use crate::db::Db;
use crate::queries::sync_files;

pub struct ReadOutcome {
    pub session: Session,
    pub body: Vec<u8>,
}

pub struct Reader<S: ObjectStore + ?Sized> {
    db: Db,
    store: Arc<S>,
    access: AccessResolver,
    metadata_deadline: Duration,
    object_store_deadline: Duration,
}

impl<S: ObjectStore + ?Sized> Reader<S> {
    pub fn new(db: Db, store: Arc<S>) -> Self {
        Self::with_limits(db, store, DEFAULT_METADATA_DEADLINE, DEFAULT_OBJECT_STORE_DEADLINE)
    }

    /// Constructor that takes the operator-configured deadline overrides
    /// (`SYNC_METADATA_DEADLINE_MS`, `SYNC_OBJECT_STORE_DEADLINE_MS`)
    /// instead of the defaults.
    pub fn with_limits(
        db: Db,
        store: Arc<S>,
        metadata_deadline: Duration,
        object_store_deadline: Duration,
    ) -> Self {
        let access = AccessResolver::new(db.clone());
        Self {
            db,
            store,
            access,
            metadata_deadline,
            object_store_deadline,
        }
    }

    pub async fn read_file(
        &self,
        session_id: Uuid,
        file_name: &str,
        viewer_user_id: Option<i64>,
        line_offset: i64,
    ) -> Result<ReadOutcome, ServiceError> {
        if line_offset < 0 {
            return Err(ServiceError::bad_request("line_offset must be >= 0"));
        }

        let resolved = self.access.resolve(session_id, viewer_user_id)?;
        let projected_session = resolved.session.project_for(resolved.access_type);

        let file_name_owned = file_name.to_string();
        let sync_file = self
            .db
            .with_conn_timeout(
                self.metadata_deadline,
                move |conn| {
                    let (sql, values) = sync_files::get(session_id, &file_name_owned);
                    match conn.query_row(&sql, &*values.as_params(), sync_files::row_to_sync_file) {
                        Ok(f) => Ok(Some(f)),
                        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                        Err(e) => Err(e),
                    }
                },
                ServiceError::from_db("loading sync file"),
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("file not found"))?;

        if line_offset >= sync_file.last_synced_line {
            return Ok(ReadOutcome {
                session: projected_session,
                body: Vec::new(),
            });
        }

        let prefix = chunk_prefix(resolved.session.owner_user_id, &resolved.session.external_id, file_name);
        let listed = match tokio::time::timeout(self.object_store_deadline, self.store.list_objects(&prefix)).await {
            Ok(Ok(listed)) => listed,
            Ok(Err(e)) => return Err(ServiceError::from(e)),
            Err(_elapsed) => return Err(ServiceError::service_unavailable("object store deadline exceeded")),
        };

        let mut parsed: Vec<(String, logsync_core::ChunkKey)> = Vec::new();
        for obj in &listed {
            match parse_chunk_key(&obj.key) {
                Some(key) => parsed.push((obj.key.clone(), key)),
                None => tracing::warn!(key = %obj.key, "reader: unparseable chunk key, skipping"),
            }
        }

        if resolved.access_type == AccessType::Owner && line_offset == 0 {
            let observed = parsed.len() as i64;
            if sync_file.chunk_count != Some(observed) {
                let file_name_owned = file_name.to_string();
                if let Err(e) = self
                    .db
                    .with_conn_timeout(
                        self.metadata_deadline,
                        move |conn| {
                            let (sql, values) = sync_files::set_chunk_count(session_id, &file_name_owned, observed);
                            conn.execute(&sql, &*values.as_params())
                        },
                        ServiceError::from_db("self-heal chunk_count update"),
                    )
                    .await
                {
                    tracing::warn!(error = %e, "reader: self-heal chunk_count update failed");
                }
            }
        }

        let relevant: Vec<(String, logsync_core::ChunkKey)> = if line_offset > 0 {
            parsed.into_iter().filter(|(_, k)| k.last_line > line_offset).collect()
        } else {
            parsed
        };

        if relevant.is_empty() {
            return Ok(ReadOutcome {
                session: projected_session,
                body: Vec::new(),
            });
        }

        let min_first_line = relevant.iter().map(|(_, k)| k.first_line).min().unwrap_or(1);

        let semaphore = Arc::new(Semaphore::new(READ_DOWNLOAD_CONCURRENCY));
        let mut tasks = Vec::with_capacity(relevant.len());
        for (key, chunk_key) in relevant {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let object_store_deadline = self.object_store_deadline;
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let data = match tokio::time::timeout(object_store_deadline, store.get_object(&key)).await {
                    Ok(Ok(data)) => data,
                    Ok(Err(e)) => return Err(ServiceError::from(e)),
                    Err(_elapsed) => return Err(ServiceError::service_unavailable("object store deadline exceeded")),
                };
                Ok::<_, ServiceError>(DownloadedChunk {
                    first_line: chunk_key.first_line,
                    last_line: chunk_key.last_line,
                    data,
                })
            }));
        }

        let mut downloaded = Vec::with_capacity(tasks.len());
        for task in tasks {
            let chunk = task
                .await
                .map_err(|e| ServiceError::Internal(format!("download task panicked: {e}")))??;
            downloaded.push(chunk);
        }
        downloaded.sort_by_key(|c| (c.first_line, c.last_line));

        let merged = merge_chunks(&downloaded);
        let body = if line_offset > 0 {
            filter_from_offset(&merged, min_first_line, line_offset)
        } else {
            merged
        };

        Ok(ReadOutcome {
            session: projected_session,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsync_core::{FileType, InitMetadata, UserStatus};
    use logsync_store::InMemoryObjectStore;

    async fn reader_with_data() -> (Reader<InMemoryObjectStore>, Uuid) {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (sql, values) = crate::queries::users::insert(1, "a@example.com", "A", UserStatus::Active);
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
                metadata: InitMetadata {
                    cwd: Some("/home/a".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();

        let store = Arc::new(InMemoryObjectStore::new());
        let engine = crate::sync_engine::ChunkSyncEngine::new(db.clone(), Arc::clone(&store));
        engine
            .upload_chunk(crate::sync_engine::UploadChunkRequest {
                viewer_user_id: 1,
                session_id: init.session_id,
                file_name: "transcript.jsonl".to_string(),
                file_type: FileType::Transcript,
                first_line: 1,
                lines: vec!["{}".to_string(), "{}".to_string(), "{}".to_string()],
                metadata: None,
            })
            .await
            .unwrap();

        (Reader::new(db, store), init.session_id)
    }

    #[tokio::test]
    async fn offset_past_high_water_mark_short_circuits_empty() {
        let (reader, session_id) = reader_with_data().await;
        let outcome = reader
            .read_file(session_id, "transcript.jsonl", Some(1), 10)
            .await
            .unwrap();
        assert!(outcome.body.is_empty());
    }

    #[tokio::test]
    async fn full_read_returns_three_lines() {
        let (reader, session_id) = reader_with_data().await;
        let outcome = reader
            .read_file(session_id, "transcript.jsonl", Some(1), 0)
            .await
            .unwrap();
        assert_eq!(outcome.body, b"{}\n{}\n{}\n");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (reader, session_id) = reader_with_data().await;
        let err = reader
            .read_file(session_id, "nope.jsonl", Some(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
