/// Normalize a raw tag string: trim, collapse whitespace runs, lowercase.
/// Returns `None` for missing or blank input.
pub fn normalize_tags(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        return None;
    }
    Some(joined.to_lowercase())
}

/// Split a tag string into individual tags.
pub fn tokens(tags: &str) -> impl Iterator<Item = &str> {
    tags.split_whitespace()
}

/// Render tags as `#tag` hashtags for confirmation messages.
pub fn hashtags(tags: &str) -> String {
    tokens(tags)
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}
