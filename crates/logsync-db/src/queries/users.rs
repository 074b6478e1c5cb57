use logsync_core::{User, UserStatus};
use rusqlite::Row;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;

use super::Built;
use crate::tables::Users;

pub fn get_by_id(id: i64) -> Built {
    Query::select()
        .from(Users::Table)
        .columns([Users::Id, Users::Email, Users::Name, Users::Status])
        .and_where(Expr::col(Users::Id).eq(id))
        .build_rusqlite(SqliteQueryBuilder)
}

pub fn insert(id: i64, email: &str, name: &str, status: UserStatus) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Id, Users::Email, Users::Name, Users::Status])
        .values_panic([id.into(), email.into(), name.into(), status_str(status).into()])
        .build_rusqlite(SqliteQueryBuilder)
}

fn status_str(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "active",
        UserStatus::Inactive => "inactive",
    }
}

pub fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let status: String = row.get("status")?;
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        status: match status.as_str() {
            "inactive" => UserStatus::Inactive,
            _ => UserStatus::Active,
        },
    })
}
