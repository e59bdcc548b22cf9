//! URL token naming and filename normalization.
//!
//! Derives safe local filenames for downloaded assets from URL paths, cloud
//! download links and bundle entry names.

mod normalize;
mod path;

pub use normalize::normalize_filename;
pub use path::{filename_from_url, last_segment};

/// Default filename when normalization leaves nothing usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Normalizes `raw` into the name an asset is stored under.
///
/// Falls back to [`DEFAULT_FILENAME`] when the normalized name is empty or a
/// directory reference (`.` / `..`).
///
/// # Examples
///
/// - `asset_filename("Photo Final.PNG")` → `"Photo_Final.PNG"`
/// - `asset_filename("???")` → `"download.bin"`
pub fn asset_filename(raw: &str) -> String {
    let normalized = normalize_filename(raw);
    if normalized.is_empty() || normalized == "." || normalized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        normalized
    }
}

/// Base name of a `/`-separated path (bundle entries, cloud-internal paths).
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}
