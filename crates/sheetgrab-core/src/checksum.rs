//! SHA-256 digests of stored assets, as lowercase hex.
//!
//! Tells identical downloads apart from name collisions and backs the
//! `checksum` command.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Streams the file through the hasher.
pub fn sha256_path(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn known_digests() {
        assert_eq!(sha256_bytes(b""), EMPTY);
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(sha256_path(&empty).unwrap(), EMPTY);

        // Larger than one read buffer.
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let big = dir.path().join("big.bin");
        std::fs::write(&big, &data).unwrap();
        assert_eq!(sha256_path(&big).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_path(&dir.path().join("absent.png")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.png"));
    }
}
