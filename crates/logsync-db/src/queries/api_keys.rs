use chrono::{DateTime, Utc};
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use uuid::Uuid;

use super::Built;
use crate::tables::ApiKeys;

pub fn insert(id: Uuid, owner_user_id: i64, key_hash: &str, now: DateTime<Utc>) -> Built {
    Query::insert()
        .into_table(ApiKeys::Table)
        .columns([
            ApiKeys::Id,
            ApiKeys::OwnerUserId,
            ApiKeys::KeyHash,
            ApiKeys::CreatedAt,
        ])
        .values_panic([
            id.to_string().into(),
            owner_user_id.into(),
            key_hash.into(),
            now.to_rfc3339().into(),
        ])
        .build_rusqlite(SqliteQueryBuilder)
}

/// Resolve the owner of a live (non-revoked) key by its hash.
pub fn owner_by_key_hash(key_hash: &str) -> Built {
    Query::select()
        .from(ApiKeys::Table)
        .column(ApiKeys::OwnerUserId)
        .and_where(Expr::col(ApiKeys::KeyHash).eq(key_hash))
        .and_where(Expr::col(ApiKeys::RevokedAt).is_null())
        .build_rusqlite(SqliteQueryBuilder)
}
