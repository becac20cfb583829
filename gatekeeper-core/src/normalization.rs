//! URL path normalization for the entry filter.
//!
//! Downstream resource matching is exact-prefix, so without
//! normalization a request for `/admin/../secret` or `/admin//x` could
//! bypass a resource's role/group rules. Rules, applied in order:
//!
//! 1. remove `.` and `..` segments, collapsing parents
//! 2. collapse runs of `/` to a single `/`
//! 3. ensure the result begins with `/`
//! 4. recompute the escaped raw path from the normalized path
//!
//! Normalization never touches the query string, scheme, or host.

/// Normalize a raw URI path into its canonical form.
///
/// A leading `..` that would climb above the root is *not* an error here —
/// it simply has no effect, matching browser/proxy convention of clamping
/// at the root rather than rejecting the request. (Rejecting outright would
/// require the entry filter to be able to terminate the chain, which it
/// has no way to do.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    if path == "/" {
        return "/".to_string();
    }

    let body = path.trim_start_matches('/');
    let mut stack: Vec<&str> = Vec::new();

    for segment in body.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            _ => stack.push(segment),
        }
    }

    let mut normalized = String::from("/");
    normalized.push_str(&stack.join("/"));
    normalized
}

/// Recompute the escaped raw path (path + query) from a normalized path and
/// the original query string, per rule (d).
pub fn rebuild_raw_path(normalized_path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{normalized_path}?{q}"),
        _ => normalized_path.to_string(),
    }
}
