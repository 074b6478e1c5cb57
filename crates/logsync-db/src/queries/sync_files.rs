use chrono::{DateTime, Utc};
use logsync_core::{FileType, SyncFile};
use rusqlite::Row;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use uuid::Uuid;

use super::Built;
use crate::tables::SyncFiles;

pub fn get(session_id: Uuid, file_name: &str) -> Built {
    Query::select()
        .from(SyncFiles::Table)
        .columns(all_columns())
        .and_where(Expr::col(SyncFiles::SessionId).eq(session_id.to_string()))
        .and_where(Expr::col(SyncFiles::FileName).eq(file_name))
        .build_rusqlite(SqliteQueryBuilder)
}

pub fn list_for_session(session_id: Uuid) -> Built {
    Query::select()
        .from(SyncFiles::Table)
        .columns(all_columns())
        .and_where(Expr::col(SyncFiles::SessionId).eq(session_id.to_string()))
        .build_rusqlite(SqliteQueryBuilder)
}

/// Create the row on first chunk, or bump it on every later chunk.
/// `chunk_count` folds as `coalesce(chunk_count,0)+1`; `latest_message_ts`
/// folds as a max.
pub fn upsert_after_chunk(
    session_id: Uuid,
    file_name: &str,
    file_type: FileType,
    last_synced_line: i64,
    latest_message_ts: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Built {
    let mut insert = Query::insert();
    insert
        .into_table(SyncFiles::Table)
        .columns([
            SyncFiles::SessionId,
            SyncFiles::FileName,
            SyncFiles::FileType,
            SyncFiles::LastSyncedLine,
            SyncFiles::ChunkCount,
            SyncFiles::LatestMessageTs,
            SyncFiles::UpdatedAt,
        ])
        .values_panic([
            session_id.to_string().into(),
            file_name.into(),
            file_type.as_str().into(),
            last_synced_line.into(),
            1i64.into(),
            latest_message_ts.map(|t| t.to_rfc3339()).into(),
            now.to_rfc3339().into(),
        ]);

    let mut on_conflict = OnConflict::columns([SyncFiles::SessionId, SyncFiles::FileName]);
    on_conflict
        .update_value(SyncFiles::LastSyncedLine, last_synced_line)
        .update_expr(
            SyncFiles::ChunkCount,
            Expr::cust("COALESCE(chunk_count, 0) + 1"),
        )
        .update_value(SyncFiles::UpdatedAt, now.to_rfc3339());
    if let Some(ts) = latest_message_ts {
        on_conflict.update_expr(
            SyncFiles::LatestMessageTs,
            Expr::cust_with_values(
                "MAX(COALESCE(latest_message_ts, ?), ?)",
                [ts.to_rfc3339(), ts.to_rfc3339()],
            ),
        );
    }

    insert.on_conflict(on_conflict).build_rusqlite(SqliteQueryBuilder)
}

/// Overwrite `chunk_count` with a freshly-observed value (self-heal against
/// the object store's actual chunk list, performed during full reads by
/// the owner).
pub fn set_chunk_count(session_id: Uuid, file_name: &str, chunk_count: i64) -> Built {
    Query::update()
        .table(SyncFiles::Table)
        .value(SyncFiles::ChunkCount, chunk_count)
        .and_where(Expr::col(SyncFiles::SessionId).eq(session_id.to_string()))
        .and_where(Expr::col(SyncFiles::FileName).eq(file_name))
        .build_rusqlite(SqliteQueryBuilder)
}

fn all_columns() -> [SyncFiles; 7] {
    [
        SyncFiles::SessionId,
        SyncFiles::FileName,
        SyncFiles::FileType,
        SyncFiles::LastSyncedLine,
        SyncFiles::ChunkCount,
        SyncFiles::LatestMessageTs,
        SyncFiles::UpdatedAt,
    ]
}

pub fn row_to_sync_file(row: &Row<'_>) -> rusqlite::Result<SyncFile> {
    let session_id: String = row.get("session_id")?;
    let file_type: String = row.get("file_type")?;
    let latest_message_ts: Option<String> = row.get("latest_message_ts")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SyncFile {
        session_id: Uuid::parse_str(&session_id)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
        file_name: row.get("file_name")?,
        file_type: FileType::parse(&file_type)
            .ok_or_else(|| rusqlite::Error::ToSqlConversionFailure(format!("bad file_type: {file_type}").into()))?,
        last_synced_line: row.get("last_synced_line")?,
        chunk_count: row.get("chunk_count")?,
        latest_message_ts: latest_message_ts
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))
            })
            .transpose()?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
    })
}
