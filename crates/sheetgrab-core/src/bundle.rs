//! Folder bundle extraction.
//!
//! A public folder downloads as one ZIP archive. Only entries whose path ends
//! with an allowed extension are kept; each is flattened to its normalized
//! base name in the assets directory.

use std::io::{Cursor, Read};

use crate::error::ResolveError;
use crate::extensions::AssetExtensions;
use crate::storage::AssetStore;
use crate::url_model::{asset_filename, base_name};

/// Extracts matching entries from `bundle` and returns their stored names in archive order.
///
/// Returns [`ResolveError::EmptyBundle`] when nothing matched.
pub fn extract(
    bundle: &[u8],
    extensions: &AssetExtensions,
    store: &AssetStore,
) -> Result<Vec<String>, ResolveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bundle))?;
    let mut names = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let entry_path = entry.name().to_string();
        if !extensions.ends(&entry_path) {
            tracing::debug!(entry = %entry_path, "skipping bundle entry");
            continue;
        }

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;

        let name = asset_filename(base_name(&entry_path));
        let stored = store.save(&name, &content)?;
        tracing::debug!(entry = %entry_path, stored = %stored, "extracted bundle entry");
        names.push(stored);
    }

    if names.is_empty() {
        return Err(ResolveError::EmptyBundle);
    }
    Ok(names)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Builds an in-memory ZIP; names ending in `/` become directories.
    pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_only_allowed_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        let bundle = zip_bytes(&[
            ("Album/", b""),
            ("Album/Фото 1.JPG", b"jpeg-bytes"),
            ("Album/readme.txt", b"ignore me"),
            ("Album/scans/Scan (2).pdf", b"%PDF"),
            ("Album/notes.pdf.txt", b"ignore me too"),
        ]);

        let names = extract(&bundle, &AssetExtensions::default(), &store).unwrap();
        assert_eq!(names, vec!["Foto_1.JPG", "Scan_2_.pdf"]);
        assert_eq!(
            std::fs::read(dir.path().join("Foto_1.JPG")).unwrap(),
            b"jpeg-bytes"
        );
        assert_eq!(std::fs::read(dir.path().join("Scan_2_.pdf")).unwrap(), b"%PDF");
        assert!(!dir.path().join("readme.txt").exists());
    }

    #[test]
    fn no_match_is_empty_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        let bundle = zip_bytes(&[("readme.txt", b"text")]);
        let err = extract(&bundle, &AssetExtensions::default(), &store).unwrap_err();
        assert!(matches!(err, ResolveError::EmptyBundle));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_bundle_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        let err = extract(b"not a zip", &AssetExtensions::default(), &store).unwrap_err();
        assert!(matches!(err, ResolveError::Bundle(_)));
    }

    #[test]
    fn same_base_name_in_two_folders_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        let bundle = zip_bytes(&[("a/cover.png", b"one"), ("b/cover.png", b"two")]);
        let names = extract(&bundle, &AssetExtensions::default(), &store).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "cover.png");
        assert_ne!(names[1], "cover.png");
        assert!(names[1].starts_with("cover-") && names[1].ends_with(".png"));
    }
}
