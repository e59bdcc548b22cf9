//! Filesystem-safe filename normalization.

/// Normalizes a candidate filename into a filesystem-safe ASCII name.
///
/// - Transliterates non-ASCII characters to their closest ASCII form
/// - Replaces every run of characters other than `[A-Za-z0-9_.-]` with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing underscores
///
/// Idempotent; may return an empty string for degenerate input.
pub fn normalize_filename(name: &str) -> String {
    let ascii = deunicode::deunicode(name);

    let mut out = String::with_capacity(ascii.len());
    let mut prev_underscore = false;

    for c in ascii.chars() {
        let replacement = if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
            c
        } else {
            '_'
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    out.trim_matches('_').to_string()
}
