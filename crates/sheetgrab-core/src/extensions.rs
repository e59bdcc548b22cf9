//! Allowed asset extensions.
//!
//! Two matching policies exist on purpose. URL tokens are matched by
//! substring because the extension is often followed by a query string or a
//! fragment (`scan.pdf?dl=1`). Bundle entries are bare paths and are matched
//! by suffix, so `notes.pdf.txt` inside an archive is skipped.

/// Extensions recognized as downloadable assets.
pub const DEFAULT_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".pdf", ".bmp"];

/// Set of allowed asset extensions (lowercase, with leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExtensions {
    extensions: Vec<String>,
}

impl Default for AssetExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl AssetExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_ascii_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        Self { extensions }
    }

    /// True if any extension occurs anywhere in `text` (case-insensitive).
    pub fn appears_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.extensions.iter().any(|e| lower.contains(e.as_str()))
    }

    /// True if `path` ends with one of the extensions (case-insensitive).
    pub fn ends(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.extensions.iter().any(|e| lower.ends_with(e.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}
