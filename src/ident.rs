//! Stable asset identifiers
//!
//! Item identifiers are derived from the canonical absolute source path so
//! re-running ingestion over the same tree always produces the same ids.
//! Callers canonicalize before hashing; ingestion already resolves every
//! candidate path once and hashes that spelling.

/// Prefix marking filesystem-derived identifiers
const ID_PREFIX: &str = "fs-";

/// Derive an identifier from an already-canonical path string.
pub fn id_for_canonical(canonical: &str) -> String {
    let hash = blake3::hash(canonical.as_bytes());
    format!("{}{}", ID_PREFIX, hash.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable() {
        let a = id_for_canonical("/data/tiles/n40w105.tif");
        let b = id_for_canonical("/data/tiles/n40w105.tif");
        assert_eq!(a, b);
        assert!(a.starts_with("fs-"));
        // blake3 hex digest is 64 chars
        assert_eq!(a.len(), 3 + 64);
    }

    #[test]
    fn test_distinct_paths_distinct_ids() {
        let a = id_for_canonical("/data/a.tif");
        let b = id_for_canonical("/data/b.tif");
        assert_ne!(a, b);
    }
}
