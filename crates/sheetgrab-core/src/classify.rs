//! URL token classification.
//!
//! Decides, from the token text alone, which resolution strategy applies:
//! a directly linked file, a cloud-disk public file, a public folder, or a
//! file nested inside a public folder.

use std::fmt;

use crate::extensions::AssetExtensions;

/// Default public-link host of the cloud disk service.
pub const DEFAULT_PUBLIC_URL: &str = "https://disk.yandex.ru";

/// One URL string taken from a cell, percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlToken(String);

impl UrlToken {
    /// Percent-decodes `raw`; invalid UTF-8 sequences become U+FFFD.
    pub fn decode(raw: &str) -> Self {
        let bytes = urlencoding::decode_binary(raw.as_bytes());
        Self(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public-link host of the cloud disk (e.g. `https://disk.yandex.ru`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudHost {
    public_url: String,
}

impl Default for CloudHost {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_URL)
    }
}

impl CloudHost {
    pub fn new(public_url: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Prefix of single-file public links (`<host>/i/`).
    pub fn file_prefix(&self) -> String {
        format!("{}/i/", self.public_url)
    }

    /// Prefix of public folder links (`<host>/d/`).
    pub fn folder_prefix(&self) -> String {
        format!("{}/d/", self.public_url)
    }
}

/// Resolution strategy for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// Plain URL pointing at an asset file.
    DirectAsset,
    /// Public link to a single cloud file.
    CloudSingleFile { public_key: String },
    /// Public link to a cloud folder; downloaded as a ZIP bundle.
    CloudFolder { public_key: String },
    /// File inside a public folder: folder key plus the path within it.
    CloudFileInFolder { public_key: String, path: String },
    /// Matches no rule; never downloaded.
    Unrecognized,
}

/// Classifies `token`. Rules are evaluated in priority order; the first match wins.
pub fn classify(token: &UrlToken, host: &CloudHost, extensions: &AssetExtensions) -> UrlKind {
    let url = token.as_str();
    let folder_prefix = host.folder_prefix();
    let has_extension = extensions.appears_in(url);

    if has_extension {
        if let Some((folder_id, path)) =
            strip_prefix_ignore_case(url, &folder_prefix).and_then(split_folder_path)
        {
            return UrlKind::CloudFileInFolder {
                public_key: format!("{folder_prefix}{folder_id}"),
                path: path.to_string(),
            };
        }
        return UrlKind::DirectAsset;
    }

    if strip_prefix_ignore_case(url, &host.file_prefix()).is_some() {
        return UrlKind::CloudSingleFile {
            public_key: url.to_string(),
        };
    }

    if strip_prefix_ignore_case(url, &folder_prefix).is_some() {
        return UrlKind::CloudFolder {
            public_key: url.to_string(),
        };
    }

    UrlKind::Unrecognized
}

/// Splits `<folder-id>/<rest>` into the id and `/<rest>`; both parts must be non-empty.
fn split_folder_path(rest: &str) -> Option<(&str, &str)> {
    let slash = rest.find('/')?;
    let (folder_id, path) = rest.split_at(slash);
    if folder_id.is_empty() || path.trim_matches('/').is_empty() {
        return None;
    }
    Some((folder_id, path))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(url: &str) -> UrlKind {
        classify(
            &UrlToken::decode(url),
            &CloudHost::default(),
            &AssetExtensions::default(),
        )
    }

    #[test]
    fn token_is_percent_decoded() {
        let t = UrlToken::decode("https://example.com/Photo%20Final.PNG");
        assert_eq!(t.as_str(), "https://example.com/Photo Final.PNG");
        let bad = UrlToken::decode("https://example.com/%FF.png");
        assert_eq!(bad.as_str(), "https://example.com/\u{FFFD}.png");
    }

    #[test]
    fn direct_asset() {
        assert_eq!(kind("https://example.com/images/a.png"), UrlKind::DirectAsset);
        assert_eq!(
            kind("https://example.com/get?name=scan.PDF"),
            UrlKind::DirectAsset
        );
    }

    #[test]
    fn file_in_folder_wins_over_direct_asset() {
        assert_eq!(
            kind("https://disk.yandex.ru/d/AbC123/photos/Фото 1.jpg"),
            UrlKind::CloudFileInFolder {
                public_key: "https://disk.yandex.ru/d/AbC123".to_string(),
                path: "/photos/Фото 1.jpg".to_string(),
            }
        );
    }

    #[test]
    fn file_in_folder_prefix_is_case_insensitive() {
        assert_eq!(
            kind("HTTPS://DISK.YANDEX.RU/d/key/scan.pdf"),
            UrlKind::CloudFileInFolder {
                public_key: "https://disk.yandex.ru/d/key".to_string(),
                path: "/scan.pdf".to_string(),
            }
        );
    }

    #[test]
    fn single_file_link() {
        assert_eq!(
            kind("https://disk.yandex.ru/i/Xyz987"),
            UrlKind::CloudSingleFile {
                public_key: "https://disk.yandex.ru/i/Xyz987".to_string()
            }
        );
    }

    #[test]
    fn folder_link() {
        assert_eq!(
            kind("https://disk.yandex.ru/d/Folder42"),
            UrlKind::CloudFolder {
                public_key: "https://disk.yandex.ru/d/Folder42".to_string()
            }
        );
        // Nested path without an asset extension is still a folder link.
        assert_eq!(
            kind("https://disk.yandex.ru/d/Folder42/sub"),
            UrlKind::CloudFolder {
                public_key: "https://disk.yandex.ru/d/Folder42/sub".to_string()
            }
        );
    }

    #[test]
    fn unrecognized() {
        assert_eq!(kind("not a url"), UrlKind::Unrecognized);
        assert_eq!(kind("https://example.com/page.html"), UrlKind::Unrecognized);
        assert_eq!(kind(""), UrlKind::Unrecognized);
    }

    #[test]
    fn custom_host() {
        let host = CloudHost::new("http://127.0.0.1:8080/");
        let exts = AssetExtensions::default();
        assert_eq!(
            classify(&UrlToken::decode("http://127.0.0.1:8080/i/k"), &host, &exts),
            UrlKind::CloudSingleFile {
                public_key: "http://127.0.0.1:8080/i/k".to_string()
            }
        );
    }
}
