//! Header rewriting for the header-rewrite send mode
//!
//! Replaces the value of the first `From:` and `To:` header lines of a raw
//! message. Only the header block (everything before the first empty line)
//! is inspected, so the body is carried over byte for byte. Both CRLF and
//! bare LF line endings end the header block. Header bytes are matched as
//! raw bytes, so 8-bit header values survive untouched.

use regex::bytes::{NoExpand, Regex};
use tracing::debug;

const CRLF_SEPARATOR: &[u8] = b"\r\n\r\n";
const LF_SEPARATOR: &[u8] = b"\n\n";

/// Rewrites sender and recipient header lines of raw messages
#[derive(Debug, Clone)]
pub struct HeaderRewriter {
    from_header: Regex,
    to_header: Regex,
}

impl Default for HeaderRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRewriter {
    /// Create a new rewriter
    pub fn new() -> Self {
        Self {
            from_header: header_pattern("From"),
            to_header: header_pattern("To"),
        }
    }

    /// Return a copy of `data` with the first `From:` header set to `from`
    /// and the first `To:` header set to `to`.
    ///
    /// Missing headers are not added.
    pub fn rewrite(&self, data: &[u8], from: &str, to: &str) -> Vec<u8> {
        let (headers, rest) = split_headers(data);

        let from_line = format!("From: {}", from);
        let to_line = format!("To: {}", to);

        let rewritten = self
            .from_header
            .replacen(headers, 1, NoExpand(from_line.as_bytes()));
        let rewritten = self
            .to_header
            .replacen(&rewritten, 1, NoExpand(to_line.as_bytes()));

        debug!(
            from_replaced = self.from_header.is_match(headers),
            to_replaced = self.to_header.is_match(headers),
            "Rewrote message headers"
        );

        let mut out = Vec::with_capacity(rewritten.len() + rest.len());
        out.extend_from_slice(&rewritten);
        out.extend_from_slice(rest);
        out
    }
}

/// Matches a header line starting at a line boundary, including folded
/// continuation lines.
fn header_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"(?mi-u)^{}:[^\r\n]*(?:\r?\n[ \t][^\r\n]*)*", name))
        .expect("static header pattern")
}

/// Split a raw message into its header block and the remainder, which
/// starts with the separating empty line.
fn split_headers(data: &[u8]) -> (&[u8], &[u8]) {
    let end = [CRLF_SEPARATOR, LF_SEPARATOR]
        .iter()
        .filter_map(|sep| find(data, sep))
        .min()
        .unwrap_or(data.len());
    data.split_at(end)
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}
