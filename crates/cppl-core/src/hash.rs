//! Content hashing for up-to-date checks.
//!
//! Artifact staleness is decided by comparing MD5 digests of file contents,
//! never timestamps. Hashes are stored inline in `Meta` records as fixed
//! 16-byte arrays; equality is plain byte equality.

use md5::{Digest, Md5};
use std::path::Path;

use crate::error::{CoreError, Result};

/// A 16-byte MD5 digest.
pub type ContentHash = [u8; 16];

/// Hash a byte buffer.
pub fn md5_of(bytes: &[u8]) -> ContentHash {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hash a file's contents.
///
/// Reads the whole file into memory; unit sources and artifacts are small
/// enough that streaming is not worth the complexity.
pub fn md5_of_file(path: &Path) -> Result<ContentHash> {
    let contents = std::fs::read(path).map_err(|e| CoreError::io(path, e))?;
    Ok(md5_of(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        assert_eq!(md5_of(b"unit body"), md5_of(b"unit body"));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(md5_of(b"decl"), md5_of(b"decl "));
    }

    #[test]
    fn empty_input_is_stable() {
        // MD5 of the empty string is a well-known constant.
        let expected: ContentHash = [
            0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
            0x42, 0x7e,
        ];
        assert_eq!(md5_of(b""), expected);
    }

    #[test]
    fn hash_file_matches_buffer_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.cppl");
        std::fs::write(&path, b"import pkg::a;\n").unwrap();
        assert_eq!(md5_of_file(&path).unwrap(), md5_of(b"import pkg::a;\n"));
    }

    #[test]
    fn hash_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = md5_of_file(&dir.path().join("absent.cppl")).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
