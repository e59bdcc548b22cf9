//! Cell rewriting: one cell's text in, local filenames out.

use crate::classify::UrlToken;
use crate::error::ResolveError;
use crate::resolver::UrlResolver;

/// Characters separating tokens inside one cell.
const SEPARATORS: &[char] = &[' ', '\t', '\r', '\n', ','];

/// Splits cell text on runs of whitespace and commas and percent-decodes each part.
pub fn split_tokens(text: &str) -> Vec<UrlToken> {
    text.split(SEPARATORS)
        .filter(|part| !part.is_empty())
        .map(UrlToken::decode)
        .collect()
}

/// Result of rewriting one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellRewriteResult {
    /// Newline-joined stored filenames; `None` leaves the cell untouched.
    pub value: Option<String>,
    /// The hyperlink must be removed (some token resolved).
    pub clear_hyperlink: bool,
    pub resolved: usize,
    pub failed: usize,
}

impl CellRewriteResult {
    pub fn is_changed(&self) -> bool {
        self.value.is_some()
    }
}

pub struct CellRewriter {
    resolver: UrlResolver,
}

impl CellRewriter {
    pub fn new(resolver: UrlResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Resolves every token of `text` in order. A failing token contributes
    /// nothing and the others still resolve. Each recognized token that fails
    /// logs its own warning; tokens of no known URL type share one warning
    /// per cell, so prose such as `not a url` is reported once.
    pub fn rewrite(&self, text: &str) -> CellRewriteResult {
        let mut names = Vec::new();
        let mut unrecognized = Vec::new();
        let mut failed = 0;
        let mut resolved = 0;

        for token in split_tokens(text) {
            match self.resolver.resolve(&token) {
                Ok(stored) => {
                    resolved += 1;
                    names.extend(stored);
                }
                Err(ResolveError::UnrecognizedUrl) => {
                    failed += 1;
                    unrecognized.push(token.as_str().to_string());
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(token = %token, error = %e, "could not resolve token");
                }
            }
        }
        if !unrecognized.is_empty() {
            tracing::warn!(
                token = %unrecognized.join(" "),
                error = %ResolveError::UnrecognizedUrl,
                "could not resolve token"
            );
        }

        let changed = !names.is_empty();
        CellRewriteResult {
            value: changed.then(|| names.join("\n")),
            clear_hyperlink: changed,
            resolved,
            failed,
        }
    }
}
