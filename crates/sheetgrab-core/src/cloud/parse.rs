//! Parse resource-resolution API replies.

use serde::Deserialize;

/// Body of the resource-resolution endpoint: either a link or an error.
#[derive(Debug, Deserialize)]
struct ResourceLinkBody {
    href: Option<String>,
    error: Option<String>,
    message: Option<String>,
    description: Option<String>,
}

/// What the API said, independent of the HTTP status.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ApiReply {
    Link(String),
    Error { message: String },
}

/// Parses the JSON reply. `Err` carries a description when the body is not a
/// recognizable reply.
pub(crate) fn parse_reply(body: &[u8]) -> Result<ApiReply, String> {
    let parsed: ResourceLinkBody =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;
    if let Some(code) = parsed.error {
        let message = parsed.message.or(parsed.description).unwrap_or(code);
        return Ok(ApiReply::Error { message });
    }
    match parsed.href {
        Some(href) if !href.is_empty() => Ok(ApiReply::Link(href)),
        _ => Err("reply carries neither href nor error".to_string()),
    }
}

/// Decoded `filename` query field of a direct download link.
pub(crate) fn filename_from_href(href: &str) -> Option<String> {
    let parsed = url::Url::parse(href).ok()?;
    let (_, value) = parsed.query_pairs().find(|(k, _)| k == "filename")?;
    if value.is_empty() {
        return None;
    }
    Some(value.into_owned())
}
