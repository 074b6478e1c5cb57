use std::sync::Arc;
use std::time::Duration;

use logsync_db::Db;
use logsync_store::ObjectStore;

use crate::auth::hash_api_key;

#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: std::path::PathBuf,
    pub bind_addr: String,
    pub max_chunks_per_file: i64,
    pub max_upload_body_bytes: usize,
    pub metadata_deadline: Duration,
    pub object_store_deadline: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: env_trimmed("SYNC_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            bind_addr: env_trimmed("SYNC_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            max_chunks_per_file: env_trimmed("SYNC_MAX_CHUNKS_PER_FILE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(logsync_core::MAX_CHUNKS_PER_FILE),
            max_upload_body_bytes: env_trimmed("SYNC_MAX_UPLOAD_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(16 * 1024 * 1024),
            metadata_deadline: env_trimmed("SYNC_METADATA_DEADLINE_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(5)),
            object_store_deadline: env_trimmed("SYNC_OBJECT_STORE_DEADLINE_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Db, store: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        Self {
            db,
            store,
            config: Arc::new(config),
        }
    }

    /// Resolve a raw bearer token to an owner id via the `api_keys` table.
    /// Returns `None` on any miss or revoked key; callers turn that into
    /// `Unauthorized`.
    pub fn resolve_api_key(&self, raw_key: &str) -> Option<i64> {
        let hash = hash_api_key(raw_key);
        self.db
            .with_conn(|conn| {
                let (sql, values) = logsync_db::queries::api_keys::owner_by_key_hash(&hash);
                match conn.query_row(&sql, &*values.as_params(), |row| row.get::<_, i64>(0)) {
                    Ok(id) => Ok(Some(id)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .ok()
            .flatten()
    }
}
