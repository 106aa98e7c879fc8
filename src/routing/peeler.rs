//! Left-to-right URI path segment decoding.
//!
//! # Design Decisions
//! - Segments are percent-decoded one at a time, so `%2F` never splits a segment
//! - `remaining()` stays raw so leaf resources can run their own parser on it
//! - `/` yields exactly one empty segment, `/a/` ends with an empty segment

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Error returned for paths that do not start with `/`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path '{0}' does not start with '/'")]
pub struct NotAbsolute(pub String);

/// Consumes a raw request path one segment at a time.
#[derive(Debug, Clone)]
pub struct SegmentPeeler<'a> {
    path: &'a str,
    /// Byte offset of the `/` preceding the next segment, or `path.len()`
    /// once exhausted.
    cursor: usize,
}

impl<'a> SegmentPeeler<'a> {
    /// Create a peeler over a raw, still percent-encoded path.
    pub fn new(path: &'a str) -> Result<Self, NotAbsolute> {
        if !path.starts_with('/') {
            return Err(NotAbsolute(path.to_string()));
        }
        Ok(Self { path, cursor: 0 })
    }

    /// The raw suffix not yet consumed, including its leading `/`, or an
    /// empty string once every segment has been peeled.
    pub fn remaining(&self) -> &'a str {
        &self.path[self.cursor..]
    }

    /// Whether no more segments are available.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.path.len()
    }

    /// Peel the next segment, percent-decoded.
    pub fn next_segment(&mut self) -> Option<Cow<'a, str>> {
        self.next_raw().map(decode)
    }

    /// Peel the next segment without decoding it.
    pub fn next_raw(&mut self) -> Option<&'a str> {
        if self.is_exhausted() {
            return None;
        }
        let start = self.cursor + 1;
        let end = self.path[start..]
            .find('/')
            .map_or(self.path.len(), |offset| start + offset);
        self.cursor = end;
        Some(&self.path[start..end])
    }
}

impl<'a> Iterator for SegmentPeeler<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment()
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}
