//! Content-addressed build caching. The emitter doesn't know about caching at all — this
//! module hashes its *output* together with the compiler invocation that
//! would consume it, using `sha2` for a stable content fingerprint.
//!
//! The hash is embedded as a one-line comment at the top of the generated C
//! and mirrored into a sidecar file next to the produced binary, so a
//! rebuild can compare without re-running the compiler just to inspect its
//! own output.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

const HEADER_PREFIX: &str = "/* emberc-cache: ";

/// A stable fingerprint of everything that influences whether recompiling
/// would change the output: the emitted C text plus the exact toolchain
/// invocation that would consume it.
pub fn compute_hash(c_source: &str, cc: &str, cflags: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(c_source.as_bytes());
    hasher.update(b"\0cc=");
    hasher.update(cc.as_bytes());
    hasher.update(b"\0cflags=");
    hasher.update(cflags.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Prefix `c_source` with a comment line carrying its own cache hash, so the
/// generated file is self-describing even if the sidecar is lost.
pub fn embed_hash_header(c_source: &str, hash: &str) -> String {
    format!("{HEADER_PREFIX}{hash} */\n{c_source}")
}

/// Pull the hash back out of a previously generated file's header comment,
/// if it has one.
pub fn extract_hash_header(c_source: &str) -> Option<&str> {
    let line = c_source.lines().next()?;
    let rest = line.strip_prefix(HEADER_PREFIX)?;
    rest.strip_suffix(" */")
}

fn sidecar_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".emberc-hash");
    dest.with_file_name(name)
}

/// Whether `dest` (and its sidecar hash file) already reflects `hash` — i.e.
/// whether the toolchain invocation that would produce `dest` can be
/// skipped entirely.
pub fn is_fresh(dest: &Path, hash: &str) -> bool {
    if !dest.exists() {
        return false;
    }
    match std::fs::read_to_string(sidecar_path(dest)) {
        Ok(stored) => stored.trim() == hash,
        Err(_) => false,
    }
}

/// Record `hash` as the fingerprint that produced `dest`, for the next
/// build's [`is_fresh`] check.
pub fn record_hash(dest: &Path, hash: &str) -> std::io::Result<()> {
    std::fs::write(sidecar_path(dest), hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_with_flags_even_if_source_is_identical() {
        let a = compute_hash("int main(void){return 0;}", "cc", "-O2");
        let b = compute_hash("int main(void){return 0;}", "cc", "-O0");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_round_trips_through_the_embedded_header() {
        let hash = compute_hash("int main(void){return 0;}", "cc", "");
        let embedded = embed_hash_header("int main(void){return 0;}", &hash);
        assert_eq!(extract_hash_header(&embedded), Some(hash.as_str()));
    }

    #[test]
    fn a_destination_with_no_sidecar_is_never_fresh() {
        let dir = std::env::temp_dir().join("emberc-cache-test-missing-sidecar");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("out");
        std::fs::write(&dest, b"binary").unwrap();
        assert!(!is_fresh(&dest, "deadbeef"));
    }

    #[test]
    fn a_recorded_hash_makes_the_destination_fresh() {
        let dir = std::env::temp_dir().join("emberc-cache-test-fresh");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("out");
        std::fs::write(&dest, b"binary").unwrap();
        record_hash(&dest, "deadbeef").unwrap();
        assert!(is_fresh(&dest, "deadbeef"));
        assert!(!is_fresh(&dest, "other"));
    }
}
