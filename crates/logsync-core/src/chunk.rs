//! Chunk object key layout.
//!
//! `{owner_user_id}/claude-code/{external_id}/chunks/{file_name}/chunk_{first:08d}_{last:08d}.jsonl`
//!
//! Zero-padding to 8 digits is mandatory: `ListObjects` returns keys in
//! lexicographic order, and the reader relies on lexicographic order of
//! the padded `first` component being equal to numeric order.

/// The `(first_line, last_line)` encoded in a chunk key, after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkKey {
    pub first_line: i64,
    pub last_line: i64,
}

const WIDTH: usize = 8;

/// Build the object-store prefix under which every chunk of one file lives.
pub fn chunk_prefix(owner_user_id: i64, external_id: &str, file_name: &str) -> String {
    format!("{owner_user_id}/claude-code/{external_id}/chunks/{file_name}/")
}

/// Build the object-store prefix under which every file of a session lives,
/// across all of its files — used by session delete to reclaim everything
/// in one prefix sweep.
pub fn session_chunk_prefix(owner_user_id: i64, external_id: &str) -> String {
    format!("{owner_user_id}/claude-code/{external_id}/chunks/")
}

/// Build the full object key for one chunk.
pub fn chunk_object_key(
    owner_user_id: i64,
    external_id: &str,
    file_name: &str,
    first_line: i64,
    last_line: i64,
) -> String {
    format!(
        "{}chunk_{:0width$}_{:0width$}.jsonl",
        chunk_prefix(owner_user_id, external_id, file_name),
        first_line,
        last_line,
        width = WIDTH,
    )
}

/// Parse the `chunk_{first:08d}_{last:08d}.jsonl` basename out of a full
/// object key (or a bare basename). Returns `None` if the key doesn't
/// match the expected shape, or if it parses to an invalid range
/// (`first < 1` or `first > last`) — callers should keep unparseable keys
/// around (to preserve list completeness for diagnostics) but skip them at
/// download time with a warning.
pub fn parse_chunk_key(key: &str) -> Option<ChunkKey> {
    let basename = key.rsplit('/').next().unwrap_or(key);
    let stem = basename.strip_prefix("chunk_")?.strip_suffix(".jsonl")?;
    let (first_str, last_str) = stem.split_once('_')?;
    if first_str.len() != WIDTH || last_str.len() != WIDTH {
        return None;
    }
    let first_line: i64 = first_str.parse().ok()?;
    let last_line: i64 = last_str.parse().ok()?;
    if first_line < 1 || first_line > last_line {
        return None;
    }
    Some(ChunkKey {
        first_line,
        last_line,
    })
}
