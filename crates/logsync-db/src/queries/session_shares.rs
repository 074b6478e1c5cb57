use chrono::{DateTime, Utc};
use logsync_core::{ShareKind, SessionShare};
use rusqlite::Row;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use uuid::Uuid;

use super::Built;
use crate::tables::SessionShares;

pub fn list_for_session(session_id: Uuid) -> Built {
    Query::select()
        .from(SessionShares::Table)
        .columns(all_columns())
        .and_where(Expr::col(SessionShares::SessionId).eq(session_id.to_string()))
        .build_rusqlite(SqliteQueryBuilder)
}

fn all_columns() -> [SessionShares; 7] {
    [
        SessionShares::Id,
        SessionShares::SessionId,
        SessionShares::ShareToken,
        SessionShares::ShareKind,
        SessionShares::RecipientEmail,
        SessionShares::ExpiresAt,
        SessionShares::CreatedAt,
    ]
}

pub fn row_to_share(row: &Row<'_>) -> rusqlite::Result<SessionShare> {
    let id: String = row.get("id")?;
    let session_id: String = row.get("session_id")?;
    let share_kind: String = row.get("share_kind")?;
    let expires_at: Option<String> = row.get("expires_at")?;
    let created_at: String = row.get("created_at")?;

    Ok(SessionShare {
        id: Uuid::parse_str(&id).map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
        session_id: Uuid::parse_str(&session_id)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
        share_token: row.get("share_token")?,
        share_kind: ShareKind::parse(&share_kind).ok_or_else(|| {
            rusqlite::Error::ToSqlConversionFailure(format!("bad share_kind: {share_kind}").into())
        })?,
        recipient_email: row.get("recipient_email")?,
        expires_at: expires_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))
            })
            .transpose()?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
    })
}
