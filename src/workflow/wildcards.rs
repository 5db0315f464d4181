//! Wildcard Pattern Matching
//!
//! Glob-style matching used by URL filters. Only `*` is special: it
//! matches any run of characters, including none. Everything else,
//! including `?` and `[`, is literal.

/// Returns true if the pattern contains a `*` wildcard.
///
/// # Example
/// ```
/// use stepline::workflow::wildcards::has_wildcards;
///
/// assert!(has_wildcards("https://*.example.com/*"));
/// assert!(!has_wildcards("https://example.com/"));
/// ```
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains('*')
}

/// Matches `text` against a `*`-only glob pattern, anchored at both ends.
///
/// # Example
/// ```
/// use stepline::workflow::wildcards::matches_pattern;
///
/// assert!(matches_pattern("https://*.example.com/*", "https://docs.example.com/page"));
/// assert!(!matches_pattern("https://example.com/*", "https://example.org/"));
/// ```
pub fn matches_pattern(pattern: &str, text: &str) -> bool {
    if !has_wildcards(pattern) {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !text.starts_with(first) {
        return false;
    }
    let mut rest = &text[first.len()..];

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

/// Extracts the origin (`scheme://host[:port]`) from a URL.
///
/// Returns None when the URL has no `scheme://` prefix or no host.
pub fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, host))
}
