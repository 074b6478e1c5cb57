use chrono::{DateTime, Utc};
use logsync_core::Session;
use rusqlite::Row;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use uuid::Uuid;

use super::Built;
use crate::tables::Sessions;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub owner_user_id: i64,
    pub external_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub git_info: Option<String>,
}

/// `INSERT ... ON CONFLICT (owner_user_id, external_id) DO NOTHING`, no
/// `RETURNING`: sea-query's sqlite backend doesn't surface a `last_insert_rowid`
/// equivalent for a text primary key, so the registry follows the insert with
/// an explicit `get_by_owner_and_external_id` select on either outcome and
/// checks which id comes back — see `logsync-db::registry`.
pub fn insert_new(session: &NewSession, now: DateTime<Utc>) -> Built {
    let (sql, values) = Query::insert()
        .into_table(Sessions::Table)
        .columns([
            Sessions::Id,
            Sessions::OwnerUserId,
            Sessions::ExternalId,
            Sessions::TranscriptPath,
            Sessions::Cwd,
            Sessions::Hostname,
            Sessions::Username,
            Sessions::GitInfo,
            Sessions::CreatedAt,
            Sessions::UpdatedAt,
        ])
        .values_panic([
            session.id.to_string().into(),
            session.owner_user_id.into(),
            session.external_id.clone().into(),
            session.transcript_path.clone().into(),
            session.cwd.clone().into(),
            session.hostname.clone().into(),
            session.username.clone().into(),
            session.git_info.clone().into(),
            now.to_rfc3339().into(),
            now.to_rfc3339().into(),
        ])
        .on_conflict(
            OnConflict::columns([Sessions::OwnerUserId, Sessions::ExternalId])
                .do_nothing()
                .to_owned(),
        )
        .build_rusqlite(SqliteQueryBuilder);
    (sql, values)
}

pub fn get_by_owner_and_external_id(owner_user_id: i64, external_id: &str) -> Built {
    Query::select()
        .from(Sessions::Table)
        .columns(all_columns())
        .and_where(Expr::col(Sessions::OwnerUserId).eq(owner_user_id))
        .and_where(Expr::col(Sessions::ExternalId).eq(external_id))
        .build_rusqlite(SqliteQueryBuilder)
}

pub fn get_by_id(id: Uuid) -> Built {
    Query::select()
        .from(Sessions::Table)
        .columns(all_columns())
        .and_where(Expr::col(Sessions::Id).eq(id.to_string()))
        .build_rusqlite(SqliteQueryBuilder)
}

pub fn delete(id: Uuid) -> Built {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::Id).eq(id.to_string()))
        .build_rusqlite(SqliteQueryBuilder)
}

/// Per-chunk metadata update, last-write-wins across chunks except
/// `first_user_message`, which is applied with a conditional write so only
/// the first non-null value ever sticks. Pass `None` for a field to leave
/// it unchanged; `summary = Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub git_info: Option<String>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

pub fn update_metadata(id: Uuid, update: &MetadataUpdate, now: DateTime<Utc>) -> Built {
    let mut stmt = Query::update();
    stmt.table(Sessions::Table)
        .value(Sessions::UpdatedAt, now.to_rfc3339());

    if let Some(git_info) = &update.git_info {
        stmt.value(Sessions::GitInfo, git_info.clone());
    }
    if let Some(summary) = &update.summary {
        stmt.value(Sessions::Summary, summary.clone());
    }
    if let Some(first_user_message) = &update.first_user_message {
        stmt.value(Sessions::FirstUserMessage, first_user_message.clone());
    }
    if let Some(ts) = update.last_message_at {
        stmt.value(Sessions::LastMessageAt, ts.to_rfc3339());
    }

    stmt.and_where(Expr::col(Sessions::Id).eq(id.to_string()))
        .build_rusqlite(SqliteQueryBuilder)
}

fn all_columns() -> [Sessions; 13] {
    [
        Sessions::Id,
        Sessions::OwnerUserId,
        Sessions::ExternalId,
        Sessions::TranscriptPath,
        Sessions::Cwd,
        Sessions::Hostname,
        Sessions::Username,
        Sessions::GitInfo,
        Sessions::Summary,
        Sessions::FirstUserMessage,
        Sessions::LastMessageAt,
        Sessions::CreatedAt,
        Sessions::UpdatedAt,
    ]
}

pub fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get("id")?;
    let git_info: Option<String> = row.get("git_info")?;
    let last_message_at: Option<String> = row.get("last_message_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Session {
        id: Uuid::parse_str(&id).map_err(|e| invalid_column("id", e))?,
        owner_user_id: row.get("owner_user_id")?,
        external_id: row.get("external_id")?,
        transcript_path: row.get("transcript_path")?,
        cwd: row.get("cwd")?,
        hostname: row.get("hostname")?,
        username: row.get("username")?,
        git_info: git_info
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| invalid_column("git_info", e))?,
        summary: row.get("summary")?,
        first_user_message: row.get("first_user_message")?,
        last_message_at: last_message_at
            .map(|s| parse_rfc3339(&s))
            .transpose()?,
        created_at: parse_rfc3339(&created_at)?,
        updated_at: parse_rfc3339(&updated_at)?,
    })
}

fn parse_rfc3339(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid_column("timestamp", e))
}

fn invalid_column(name: &'static str, e: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(format!("invalid {name}: {e}").into())
}
