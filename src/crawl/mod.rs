//! Filesystem crawling for candidate assets
//!
//! This module provides:
//! - Recursive directory walking rooted at the collection directory
//! - Exclusion of the derivative subtree and hidden files
//! - Extension-based candidate filtering
//! - Fixed-size batching for storage round trips

use crate::geom::extract::FileKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filesystem walker producing candidate asset paths
pub struct Crawler {
    root: PathBuf,
    exclude_dir: String,
}

impl Crawler {
    pub fn new(root: impl Into<PathBuf>, exclude_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            exclude_dir: exclude_dir.into(),
        }
    }

    /// Walk the root and collect every recognized candidate file, sorted
    /// by path so runs are deterministic.
    ///
    /// Unreadable directory entries are logged and skipped, never fatal.
    pub fn collect_candidates(&self) -> Vec<PathBuf> {
        let exclude = self.exclude_dir.as_str();
        let mut candidates: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded(e.path(), exclude))
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| FileKind::detect(p).is_some())
            .collect();
        candidates.sort();
        debug!(
            "Found {} candidate files under {:?}",
            candidates.len(),
            self.root
        );
        candidates
    }
}

/// Whether an entry should be pruned from the walk: hidden names and the
/// configured derivative directory.
fn is_excluded(path: &Path, exclude_dir: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with('.') || name == exclude_dir
}

/// Iterator adaptor yielding fixed-size chunks, last chunk possibly short.
pub struct Batched<I: Iterator> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Batched<I> {
    pub fn new(inner: I, size: usize) -> Self {
        assert!(size > 0, "batch size must be positive");
        Self { inner, size }
    }
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.size);
        for item in self.inner.by_ref() {
            batch.push(item);
            if batch.len() == self.size {
                return Some(batch);
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Batch any iterator.
pub fn batched<I: IntoIterator>(iter: I, size: usize) -> Batched<I::IntoIter> {
    Batched::new(iter.into_iter(), size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_collect_candidates_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("tiles")).unwrap();
        touch(&root.join("tiles/b.tif"));
        touch(&root.join("tiles/a.tif"));
        touch(&root.join("boundary.geojson"));
        touch(&root.join("readme.txt"));

        let found = Crawler::new(root, "derived").collect_candidates();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["boundary.geojson", "tiles/a.tif", "tiles/b.tif"]);
    }

    #[test]
    fn test_excluded_and_hidden_dirs_pruned() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("derived")).unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        touch(&root.join("derived/thumb.tif"));
        touch(&root.join(".cache/cached.tif"));
        touch(&root.join(".hidden.tif"));
        touch(&root.join("keep.tif"));

        let found = Crawler::new(root, "derived").collect_candidates();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("keep.tif"));
    }

    #[test]
    fn test_batched_chunks() {
        let batches: Vec<Vec<i32>> = batched(1..=7, 3).collect();
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn test_batched_exact_multiple() {
        let batches: Vec<Vec<i32>> = batched(1..=4, 2).collect();
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_batched_empty() {
        let batches: Vec<Vec<i32>> = batched(std::iter::empty(), 5).collect();
        assert!(batches.is_empty());
    }
}
