//! Metadata store and framework-agnostic service logic: the Session
//! Registry, Chunk Sync Engine, Access Resolver, and Reader.
//! No Axum here — `logsync-server` is the only crate that knows HTTP.

pub mod access;
pub mod db;
pub mod migrations;
pub mod queries;
pub mod reader;
pub mod registry;
pub mod sync_engine;
pub mod tables;

pub use access::{AccessResolver, ResolvedAccess};
pub use db::Db;
pub use reader::Reader;
pub use registry::{InitResult, SessionRegistry};
pub use sync_engine::{ChunkSyncEngine, UploadChunkRequest, UploadChunkResult};
