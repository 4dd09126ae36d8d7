//! Expression markers
//!
//! The compiler stitches a template's literal fragments together with a
//! marker at every expression position. The bare marker stands for an
//! expression inside an attribute value; the same marker wrapped in a comment
//! stands for an expression in node position.

use std::sync::LazyLock;

use ulid::Ulid;

// A random suffix keeps the marker from colliding with literal template text
static MARKER: LazyLock<String> =
    LazyLock::new(|| format!("{{{{lit-{}}}}}", Ulid::new().to_string().to_lowercase()));

static NODE_MARKER: LazyLock<String> = LazyLock::new(|| format!("<!--{}-->", marker()));

/// Marker for an attribute-position expression
pub fn marker() -> &'static str {
    MARKER.as_str()
}

/// Marker for a node-position expression
pub fn node_marker() -> &'static str {
    NODE_MARKER.as_str()
}

/// Split `text` around marker occurrences. A marker wrapped as a comment is
/// removed together with its `<!--`/`-->`. The result always has one more
/// element than the number of markers found.
pub fn split_markers(text: &str) -> Vec<&str> {
    let marker = marker();
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some(found) = rest.find(marker) {
        let mut start = found;
        let mut end = found + marker.len();
        if rest[..start].ends_with("<!--") && rest[end..].starts_with("-->") {
            start -= 4;
            end += 3;
        }
        parts.push(&rest[..start]);
        rest = &rest[end..];
    }
    parts.push(rest);
    parts
}
