//! Access Resolver: computes a viewer's access grant on a session.

use chrono::Utc;
use logsync_core::{AccessType, ServiceError, Session, ShareKind, UserStatus};
use uuid::Uuid;

use crate::db::Db;
use crate::queries::{session_shares, sessions, users};

pub struct ResolvedAccess {
    pub access_type: AccessType,
    pub session: Session,
    pub viewer_user_id: Option<i64>,
}

pub struct AccessResolver {
    db: Db,
}

impl AccessResolver {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// `resolve` never distinguishes "session doesn't exist" from "session
    /// exists but viewer has no grant" in its public error surface — both
    /// collapse to `not_found` at the caller. This method itself returns
    /// `not_found` directly for a missing session so callers don't need to
    /// special-case it.
    pub fn resolve(&self, session_id: Uuid, viewer_user_id: Option<i64>) -> Result<ResolvedAccess, ServiceError> {
        let session = self
            .db
            .with_conn(|conn| {
                let (sql, values) = sessions::get_by_id(session_id);
                conn.query_row(&sql, &*values.as_params(), sessions::row_to_session)
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => ServiceError::not_found("session not found"),
                e => ServiceError::from_db("loading session")(e),
            })?;

        let owner = self
            .db
            .with_conn(|conn| {
                let (sql, values) = users::get_by_id(session.owner_user_id);
                conn.query_row(&sql, &*values.as_params(), users::row_to_user)
            })
            .map_err(ServiceError::from_db("loading session owner"))?;

        if owner.status == UserStatus::Inactive {
            return Err(ServiceError::forbidden("session owner account is inactive"));
        }

        let viewer_email = match viewer_user_id {
            Some(id) => Some(
                self.db
                    .with_conn(|conn| {
                        let (sql, values) = users::get_by_id(id);
                        conn.query_row(&sql, &*values.as_params(), users::row_to_user)
                    })
                    .map(|u| u.email)
                    .map_err(ServiceError::from_db("loading viewer"))?,
            ),
            None => None,
        };

        if viewer_user_id == Some(session.owner_user_id) {
            return Ok(ResolvedAccess {
                access_type: AccessType::Owner,
                session,
                viewer_user_id,
            });
        }

        let shares = self
            .db
            .with_conn(|conn| {
                let (sql, values) = session_shares::list_for_session(session_id);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(&*values.as_params(), session_shares::row_to_share)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(ServiceError::from_db("loading session shares"))?;

        let now = Utc::now();
        let live = |share: &&logsync_core::SessionShare| !share.is_expired(now);

        let access_type = if let Some(email) = &viewer_email {
            if shares
                .iter()
                .filter(live)
                .any(|s| s.share_kind == ShareKind::Recipient && s.recipient_email.as_deref() == Some(email.as_str()))
            {
                AccessType::Recipient
            } else if viewer_user_id.is_some()
                && shares.iter().filter(live).any(|s| s.share_kind == ShareKind::System)
            {
                AccessType::System
            } else if shares.iter().filter(live).any(|s| s.share_kind == ShareKind::Public) {
                AccessType::Public
            } else {
                AccessType::None
            }
        } else if shares.iter().filter(live).any(|s| s.share_kind == ShareKind::Public) {
            AccessType::Public
        } else {
            AccessType::None
        };

        if access_type == AccessType::None {
            return Err(ServiceError::not_found("session not found"));
        }

        Ok(ResolvedAccess {
            access_type,
            session,
            viewer_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsync_core::{InitMetadata, UserStatus};

    fn setup() -> (AccessResolver, Db, Uuid, i64) {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (sql, values) = users::insert(1, "owner@example.com", "Owner", UserStatus::Active);
            conn.execute(&sql, &*values.as_params())?;
            let (sql, values) = users::insert(2, "other@example.com", "Other", UserStatus::Active);
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
                    cwd: Some("/home/owner".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();

        (AccessResolver::new(db.clone()), db, init.session_id, 2)
    }

    #[test]
    fn owner_gets_owner_access() {
        let (resolver, _db, session_id, _other) = setup();
        let resolved = resolver.resolve(session_id, Some(1)).unwrap();
        assert_eq!(resolved.access_type, AccessType::Owner);
    }

    #[test]
    fn stranger_with_no_share_gets_not_found() {
        let (resolver, _db, session_id, other) = setup();
        let err = resolver.resolve(session_id, Some(other)).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn unauthenticated_viewer_with_public_share_gets_public_access() {
        let (resolver, db, session_id, _other) = setup();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_shares (id, session_id, share_token, share_kind, created_at) VALUES (?1, ?2, ?3, 'public', ?4)",
                rusqlite::params![Uuid::new_v4().to_string(), session_id.to_string(), "tok", Utc::now().to_rfc3339()],
            )
        })
        .unwrap();
        let resolved = resolver.resolve(session_id, None).unwrap();
        assert_eq!(resolved.access_type, AccessType::Public);
    }

    #[test]
    fn inactive_owner_forbids_even_the_owner() {
        let (resolver, db, session_id, _other) = setup();
        db.with_conn(|conn| conn.execute("UPDATE users SET status = 'inactive' WHERE id = 1", []))
            .unwrap();
        let err = resolver.resolve(session_id, Some(1)).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
