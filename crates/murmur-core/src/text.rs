//! Wire-safety text transforms.
//!
//! Relayed lines reach naive renderers (a browser dashboard inserting the
//! payload into the DOM), so sanitation happens exactly once, server-side,
//! before fan-out: strip every piece of markup, escape what remains.

use std::sync::LazyLock;

use regex::Regex;

/// Matches any complete HTML/XML tag, including attributes.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Sanitize a line for fan-out: strip all markup, then HTML-escape the rest.
///
/// Stray metacharacters that never formed a complete tag (an unmatched `<`,
/// a bare `&`) are escaped rather than removed, so the output is always safe
/// to insert verbatim into an HTML document.
#[must_use]
pub fn sanitize_line(line: &str) -> String {
    let stripped = TAG_RE.replace_all(line, "");
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Derive the sender name used on the wire from a peer identifier.
///
/// Transport identities often look like `name@domain`; everything from the
/// `@` on is dropped before the identifier appears in a broadcast frame.
#[must_use]
pub fn display_name(peer: &str) -> &str {
    match peer.find('@') {
        Some(at) => &peer[..at],
        None => peer,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
