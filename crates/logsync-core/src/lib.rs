//! Domain types and pure algorithms for the transcript sync service.
//!
//! This crate has no I/O. It defines the shapes that flow between the
//! object store, the metadata store, and the HTTP layer, plus the two
//! algorithms (chunk key codec, merge-on-read) that have to behave
//! identically regardless of which concrete backend stores the bytes.

pub mod chunk;
pub mod error;
pub mod merge;
pub mod model;
pub mod validate;

pub use chunk::{chunk_object_key, chunk_prefix, parse_chunk_key, session_chunk_prefix, ChunkKey};
pub use error::ServiceError;
pub use merge::DownloadedChunk;
pub use model::{
    AccessType, FileType, GitInfo, InitMetadata, Session, SessionEvent, SessionEventType,
    SessionShare, ShareKind, SyncFile, User, UserStatus,
};

/// Soft cap on the number of chunks a single `(session_id, file_name)` may
/// accumulate before new uploads are rejected with a client error.
///
/// Advisory, not authoritative: concurrent uploads can race past this by a
/// small margin (the metadata store's `chunk_count` column is only updated
/// after the object-store PUT succeeds), and the reader self-heals the
/// count against the object store's actual listing on full reads by the
/// owner.
pub const MAX_CHUNKS_PER_FILE: i64 = 10_000;

/// Fixed concurrency cap for the reader's parallel chunk download fan-out.
pub const READ_DOWNLOAD_CONCURRENCY: usize = 10;

/// Default deadline for a single metadata-store query, overridable per
/// deployment.
pub const DEFAULT_METADATA_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

/// Default deadline for a single object-store call, overridable per
/// deployment.
pub const DEFAULT_OBJECT_STORE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);
