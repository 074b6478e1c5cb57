//! Merge-on-read algorithm and line-offset filtering.

/// One chunk as downloaded from the object store, ready to be merged.
#[derive(Debug, Clone)]
pub struct DownloadedChunk {
    pub first_line: i64,
    pub last_line: i64,
    pub data: Vec<u8>,
}

/// Merge a set of (possibly overlapping) chunks into the canonical file.
///
/// Chunks are processed in the order given — callers must supply them
/// already lex-sorted by key (so same-`first_line` chunks are ordered by
/// `last_line` ascending) for the "longer retry wins" property to hold.
/// Last writer wins per line index; a slot re-filled with *different*
/// bytes than it already held is logged as a warning (indicates upstream
/// corruption) but does not abort the merge.
pub fn merge_chunks(chunks: &[DownloadedChunk]) -> Vec<u8> {
    let Some(max_line) = chunks.iter().map(|c| c.last_line).max() else {
        return Vec::new();
    };
    if max_line < 1 {
        return Vec::new();
    }

    let mut slots: Vec<Option<Vec<u8>>> = vec![None; max_line as usize + 1];

    for chunk in chunks {
        let lines = split_lines(&chunk.data);
        for (i, line) in lines.into_iter().enumerate() {
            let index = chunk.first_line + i as i64;
            if index < 1 || index as usize >= slots.len() {
                continue;
            }
            let slot = &mut slots[index as usize];
            if let Some(existing) = slot {
                if existing != &line {
                    tracing::warn!(
                        line_index = index,
                        "merge: overlapping chunks disagree on line content"
                    );
                }
            }
            *slot = Some(line);
        }
    }

    let mut out = Vec::new();
    for slot in slots.into_iter().skip(1) {
        if let Some(line) = slot {
            out.extend_from_slice(&line);
            out.push(b'\n');
        }
    }
    out
}

/// Split raw chunk bytes on `\n`, discarding the trailing empty segment
/// produced by the chunk's trailing newline.
fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut lines: Vec<Vec<u8>> = data.split(|&b| b == b'\n').map(|s| s.to_vec()).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Drop lines at or before `line_offset` from an already-merged buffer.
///
/// `min_first_line` is the smallest `first_line` among the chunks that were
/// downloaded to produce `merged` (the caller has already dropped chunks
/// that could not contain any retained line before merging). If the first
/// retained chunk already starts beyond the offset, the whole buffer is
/// returned untouched.
pub fn filter_from_offset(merged: &[u8], min_first_line: i64, line_offset: i64) -> Vec<u8> {
    if line_offset <= 0 || min_first_line >= line_offset + 1 {
        return merged.to_vec();
    }

    let skip = (line_offset - min_first_line + 1).max(0) as usize;
    let mut lines = split_lines(merged);
    if skip >= lines.len() {
        return Vec::new();
    }
    lines.drain(0..skip);

    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(&line);
        out.push(b'\n');
    }
    out
}
