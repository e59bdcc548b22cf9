//! Assets directory: where downloaded files land.
//!
//! Every asset is written to a `.part` temp file and renamed into place, so a
//! returned name always refers to a complete file. Name collisions between
//! different contents are handled by [`CollisionPolicy`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::sha256_bytes;
use crate::config::CollisionPolicy;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Hex digits of the content hash appended on collision.
const HASH_SUFFIX_LEN: usize = 8;

/// Path for the temp file: appends `.part` to the final path (e.g. `scan.pdf` → `scan.pdf.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// `photo.png` + `1a2b3c4d` → `photo-1a2b3c4d.png`.
fn hashed_name(name: &str, hash: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{hash}.{ext}"),
        _ => format!("{name}-{hash}"),
    }
}

/// Writes assets into one shared directory.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    collision: CollisionPolicy,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, collision: CollisionPolicy) -> Self {
        Self {
            dir: dir.into(),
            collision,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores `data` under `name` (already normalized) and returns the name it
    /// was actually stored under. The file exists on disk when this returns.
    pub fn save(&self, name: &str, data: &[u8]) -> io::Result<String> {
        let path = self.dir.join(name);
        if self.collision == CollisionPolicy::Overwrite || !path.exists() {
            write_atomic(&path, data)?;
            return Ok(name.to_string());
        }

        if same_content(&path, data)? {
            tracing::debug!(name, "identical asset already stored");
            return Ok(name.to_string());
        }

        let digest = sha256_bytes(data);
        let renamed = hashed_name(name, &digest[..HASH_SUFFIX_LEN]);
        let renamed_path = self.dir.join(&renamed);
        if renamed_path.exists() && same_content(&renamed_path, data)? {
            return Ok(renamed);
        }
        tracing::info!(name, stored_as = %renamed, "asset name taken by different content");
        write_atomic(&renamed_path, data)?;
        Ok(renamed)
    }
}

fn same_content(path: &Path, data: &[u8]) -> io::Result<bool> {
    if fs::metadata(path)?.len() != data.len() as u64 {
        return Ok(false);
    }
    Ok(fs::read(path)? == data)
}

fn write_atomic(final_path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(final_path);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, final_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("scan.pdf"));
        assert_eq!(p.to_string_lossy(), "scan.pdf.part");
    }

    #[test]
    fn hashed_name_keeps_extension() {
        assert_eq!(hashed_name("photo.png", "1a2b3c4d"), "photo-1a2b3c4d.png");
        assert_eq!(hashed_name("a.b.jpg", "00ff00ff"), "a.b-00ff00ff.jpg");
        assert_eq!(hashed_name("noext", "deadbeef"), "noext-deadbeef");
        assert_eq!(hashed_name(".png", "deadbeef"), ".png-deadbeef");
    }

    #[test]
    fn save_writes_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        let name = store.save("scan.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(name, "scan.pdf");
        assert_eq!(fs::read(dir.path().join("scan.pdf")).unwrap(), b"%PDF-1.4");
        assert!(!dir.path().join("scan.pdf.part").exists());
    }

    #[test]
    fn identical_content_reuses_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        store.save("a.png", b"same").unwrap();
        assert_eq!(store.save("a.png", b"same").unwrap(), "a.png");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn different_content_gets_hash_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::HashSuffix);
        store.save("a.png", b"first").unwrap();
        let second = store.save("a.png", b"second").unwrap();
        let expected = format!("a-{}.png", &sha256_bytes(b"second")[..8]);
        assert_eq!(second, expected);
        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join(&expected)).unwrap(), b"second");
        // Same colliding content again maps to the same suffixed name.
        assert_eq!(store.save("a.png", b"second").unwrap(), expected);
    }

    #[test]
    fn overwrite_policy_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), CollisionPolicy::Overwrite);
        store.save("a.png", b"first").unwrap();
        assert_eq!(store.save("a.png", b"second").unwrap(), "a.png");
        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"second");
    }
}
