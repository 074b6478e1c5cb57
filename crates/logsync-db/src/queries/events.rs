use chrono::{DateTime, Utc};
use sea_query::{Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use serde_json::Value;
use uuid::Uuid;

use super::Built;
use crate::tables::SessionEvents;

pub fn insert(
    id: Uuid,
    session_id: Uuid,
    event_type: &str,
    event_timestamp: DateTime<Utc>,
    payload: &Value,
) -> Built {
    Query::insert()
        .into_table(SessionEvents::Table)
        .columns([
            SessionEvents::Id,
            SessionEvents::SessionId,
            SessionEvents::EventType,
            SessionEvents::EventTimestamp,
            SessionEvents::Payload,
        ])
        .values_panic([
            id.to_string().into(),
            session_id.to_string().into(),
            event_type.into(),
            event_timestamp.to_rfc3339().into(),
            payload.to_string().into(),
        ])
        .build_rusqlite(SqliteQueryBuilder)
}
