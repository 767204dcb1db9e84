//! Content hashing for change detection and transfer integrity.
//!
//! Packs are identified as changed/unchanged by a 128-bit MD5 digest in
//! lowercase hex. MD5 is fine here: the hash detects accidental corruption
//! and server-side edits, it is not a security boundary.

use md5::{Digest, Md5};
use std::io::Read;

/// Hashes a byte slice, returning the digest as lowercase hex.
#[must_use]
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hashes everything a reader yields, returning lowercase hex.
///
/// Streams in fixed-size chunks so multi-megabyte pack files are never
/// loaded whole.
pub fn content_hash_reader<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares two hex digests ignoring case.
#[must_use]
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
