//! Parsing and canonicalisation of HTTP `Range: bytes=...` headers, as used by the media-type
//! output handler to serve partial content.

use itertools::Itertools;

/// A half-open byte interval `[start, end)` over an entity body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Inclusive start offset
    pub start: u64,
    /// Exclusive end offset
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by this range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
}

/// Parses a single range spec token (`a-b`, `a-`, `-n` or a bare `a`) against the total length.
/// Returns `None` if the token is unsatisfiable against `total`.
fn parse_token(token: &str, total: u64) -> Option<ByteRange> {
    let token = token.trim();
    if let Some(rest) = token.strip_prefix('-') {
        let suffix_len: u64 = rest.parse().ok()?;
        if suffix_len == 0 || total == 0 {
            return None;
        }
        let start = total.saturating_sub(suffix_len);
        Some(ByteRange { start, end: total })
    } else if let Some((start_str, end_str)) = token.split_once('-') {
        let start: u64 = start_str.parse().ok()?;
        if start >= total {
            return None;
        }
        let end = if end_str.is_empty() {
            total
        } else {
            let end: u64 = end_str.parse().ok()?;
            (end + 1).min(total)
        };
        if end <= start {
            return None;
        }
        Some(ByteRange { start, end })
    } else {
        let start: u64 = token.parse().ok()?;
        if start >= total {
            return None;
        }
        Some(ByteRange { start, end: start + 1 })
    }
}

/// Sorts ranges ascending by start and merges any that overlap or touch.
fn coalesce(mut ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    ranges.sort_by_key(|r| r.start);
    let mut result: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match result.last_mut() {
            Some(last) if range.start <= last.end => {
                last.end = last.end.max(range.end);
            }
            _ => result.push(range),
        }
    }
    result
}

/// Parses a `Range: bytes=...` header value against an entity of `total` bytes. Returns `None` if
/// the header is absent/malformed or no token is satisfiable, in which case callers should fall
/// back to serving the full entity as a single `200` response. Returns `Some(ranges)` - sorted and
/// coalesced, never empty - otherwise.
pub fn parse_range_header(header: Option<&str>, total: u64) -> Option<Vec<ByteRange>> {
    let header = header?;
    let spec = header.strip_prefix("bytes=")?;
    let ranges: Vec<ByteRange> = spec
        .split(',')
        .filter_map(|token| parse_token(token, total))
        .collect_vec();
    if ranges.is_empty() {
        None
    } else {
        Some(coalesce(ranges))
    }
}

/// Formats the `Content-Range` header value for a single served range.
pub fn content_range_header(range: &ByteRange, total: u64) -> String {
    format!("bytes {}-{}/{}", range.start, range.end - 1, total)
}

/// Formats the `Content-Range` header value for multiple served ranges (used only when the
/// combined ranges are reported back to the client prior to serving each one individually).
pub fn content_range_header_multi(ranges: &[ByteRange], total: u64) -> String {
    let parts = ranges
        .iter()
        .map(|r| format!("{}-{}", r.start, r.end - 1))
        .join(",");
    format!("bytes {}/{}", parts, total)
}
