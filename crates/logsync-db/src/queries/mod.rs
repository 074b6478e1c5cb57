//! Sea-query builders for each table, one module per entity (teacher's
//! `db::sessions` / `db::tables` split).

pub mod api_keys;
pub mod events;
pub mod session_shares;
pub mod sessions;
pub mod sync_files;
pub mod users;

use sea_query_rusqlite::RusqliteValues;

/// A built `(sql, values)` pair, ready for `conn.prepare(&sql)?.query(&*values.as_params())`.
pub type Built = (String, RusqliteValues);
