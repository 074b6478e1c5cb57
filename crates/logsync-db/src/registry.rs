//! Session Registry: finds or creates the session a client is syncing to.

use std::collections::HashMap;

use chrono::Utc;
use logsync_core::{validate, InitMetadata, ServiceError};
use serde_json::Value;
use uuid::Uuid;

use crate::db::Db;
use crate::queries::sessions::{self, NewSession};
use crate::queries::sync_files;

#[derive(Debug, Clone)]
pub struct InitParams {
    pub owner_user_id: i64,
    pub external_id: String,
    pub transcript_path: String,
    /// Deprecated top-level `cwd`, used only when `metadata.cwd` is absent/empty.
    pub deprecated_cwd: Option<String>,
    /// Deprecated top-level `git_info`, used only when `metadata.git_info` is absent/empty.
    pub deprecated_git_info: Option<Value>,
    pub metadata: InitMetadata,
}

#[derive(Debug, Clone)]
pub struct InitResult {
    pub session_id: Uuid,
    pub files: HashMap<String, i64>,
}

pub struct SessionRegistry {
    db: Db,
}

impl SessionRegistry {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn find_or_create(&self, params: InitParams) -> Result<InitResult, ServiceError> {
        validate::external_id(&params.external_id)?;
        validate::transcript_path(&params.transcript_path)?;

        let cwd = non_empty(params.metadata.cwd).or(params.deprecated_cwd).unwrap_or_default();
        validate::cwd(&cwd)?;

        if let Some(hostname) = &params.metadata.hostname {
            validate::hostname(hostname)?;
        }
        if let Some(username) = &params.metadata.username {
            validate::username(username)?;
        }

        let git_info = non_empty_json(params.metadata.git_info).or(params.deprecated_git_info);
        let git_info_json = git_info
            .map(|v| serde_json::to_string(&v))
            .transpose()
            .map_err(ServiceError::from_db("serializing git_info"))?;

        let new_session = NewSession {
            id: Uuid::new_v4(),
            owner_user_id: params.owner_user_id,
            external_id: params.external_id.clone(),
            transcript_path: params.transcript_path,
            cwd,
            hostname: params.metadata.hostname,
            username: params.metadata.username,
            git_info: git_info_json,
        };

        self.db
            .with_conn(|conn| {
                let now = Utc::now();
                let (sql, values) = sessions::insert_new(&new_session, now);
                conn.execute(&sql, &*values.as_params())?;
                Ok(())
            })
            .map_err(ServiceError::from_db("inserting session"))?;

        let session = self
            .db
            .with_conn(|conn| {
                let (sql, values) =
                    sessions::get_by_owner_and_external_id(params.owner_user_id, &params.external_id);
                conn.query_row(&sql, &*values.as_params(), sessions::row_to_session)
            })
            .map_err(ServiceError::from_db("loading session after find-or-create"))?;

        let files = self
            .db
            .with_conn(|conn| {
                let (sql, values) = sync_files::list_for_session(session.id);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(&*values.as_params(), sync_files::row_to_sync_file)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(ServiceError::from_db("listing sync files"))?
            .into_iter()
            .map(|f| (f.file_name, f.last_synced_line))
            .collect();

        Ok(InitResult {
            session_id: session.id,
            files,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn non_empty_json(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;

    fn registry_with_owner() -> (SessionRegistry, i64) {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (sql, values) = users::insert(1, "a@example.com", "Alice", logsync_core::UserStatus::Active);
            conn.execute(&sql, &*values.as_params())
        })
        .unwrap();
        (SessionRegistry::new(db), 1)
    }

    fn params(owner: i64, external_id: &str) -> InitParams {
        InitParams {
            owner_user_id: owner,
            external_id: external_id.to_string(),
            transcript_path: "/tmp/t.jsonl".to_string(),
            deprecated_cwd: None,
            deprecated_git_info: None,
            metadata: InitMetadata {
                cwd: Some("/home/alice/project".to_string()),
                git_info: None,
                hostname: Some("alice-laptop".to_string()),
                username: Some("alice".to_string()),
            },
        }
    }

    #[test]
    fn creates_on_first_call_and_returns_same_id_on_second() {
        let (registry, owner) = registry_with_owner();
        let first = registry.find_or_create(params(owner, "sess-1")).unwrap();
        let second = registry.find_or_create(params(owner, "sess-1")).unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert!(second.files.is_empty());
    }

    #[test]
    fn falls_back_to_deprecated_cwd_when_nested_is_absent() {
        let (registry, owner) = registry_with_owner();
        let mut p = params(owner, "sess-2");
        p.metadata.cwd = None;
        p.deprecated_cwd = Some("/legacy/cwd".to_string());
        let result = registry.find_or_create(p).unwrap();
        assert!(result.files.is_empty());
    }

    #[test]
    fn rejects_overlong_external_id() {
        let (registry, owner) = registry_with_owner();
        let mut p = params(owner, "sess-3");
        p.external_id = "x".repeat(10_000);
        assert!(registry.find_or_create(p).is_err());
    }
}
