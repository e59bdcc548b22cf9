//! Filename extraction from a URL token.

/// Extracts the last path segment of a decoded URL token for use as a filename hint.
///
/// Query string and fragment are dropped first. Works on the decoded token text
/// rather than a parsed URL so names with spaces survive (`Photo Final.PNG`).
/// Returns `None` when nothing usable is left.
pub fn filename_from_url(url: &str) -> Option<String> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let without_query = &url[..end];
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    // Host alone is not a filename.
    let (_, path) = after_scheme.split_once('/')?;
    let segment = path.rsplit('/').next()?;
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Everything after the last `/` of a decoded URL token, query included.
///
/// `https://x/get?file=scan.pdf` gives `get?file=scan.pdf`. Used when the path
/// alone carries no usable extension.
pub fn last_segment(url: &str) -> Option<String> {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (_, path) = after_scheme.split_once('/')?;
    let segment = path.rsplit('/').next()?;
    (!segment.is_empty()).then(|| segment.to_string())
}
