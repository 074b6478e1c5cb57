//! Schema migrations, applied idempotently at startup.

pub type Migration = (&'static str, &'static str);

pub const MIGRATIONS: &[Migration] = &[("0001_init", include_str!("../migrations/0001_init.sql"))];
