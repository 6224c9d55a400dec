//! Recursive depth-first walker
//!
//! Walks one subtree, writing one record per resolved entry to a
//! [`RecordSink`] and returning `(count, total_size)` for the subtree.
//! Entry-level failures are logged and counted, never propagated.

use crate::error::StatWalkerError;
use crate::fs::record::StatRecord;
use crate::fs::resolver::{MetadataSource, OsMetadata, OwnerLookup, StatResolver, Unresolved};
use crate::fs::skip::SkipSet;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::warn;

/// Destination for emitted records
pub trait RecordSink {
    /// Write one record
    fn write_record(&mut self, record: &StatRecord) -> io::Result<()>;
}

impl RecordSink for Vec<StatRecord> {
    fn write_record(&mut self, record: &StatRecord) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Counters for entry-level failures
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    /// Entries that could not be stat'ed
    pub stat_errors: u64,
    /// Directories that could not be listed
    pub list_errors: u64,
    /// Records a sink refused
    pub write_errors: u64,
}

impl FailureCounts {
    /// Log an entry-level failure and count it
    pub fn note(&mut self, err: &StatWalkerError) {
        match err {
            StatWalkerError::Stat { .. } => self.stat_errors += 1,
            StatWalkerError::List { .. } => self.list_errors += 1,
            _ => self.write_errors += 1,
        }
        warn!("{}", err);
    }

    /// Add another set of counters
    pub fn merge(&mut self, other: &FailureCounts) {
        self.stat_errors += other.stat_errors;
        self.list_errors += other.list_errors;
        self.write_errors += other.write_errors;
    }

    /// All failures
    pub fn total(&self) -> u64 {
        self.stat_errors + self.list_errors + self.write_errors
    }
}

/// Depth-first subtree walker
pub struct Walker<'a, M = OsMetadata, L = Unresolved> {
    resolver: &'a StatResolver<M, L>,
    skip: &'a SkipSet,
    failures: FailureCounts,
}

impl<'a, M: MetadataSource, L: OwnerLookup> Walker<'a, M, L> {
    /// Create a walker over a resolver and skip set
    pub fn new(resolver: &'a StatResolver<M, L>, skip: &'a SkipSet) -> Self {
        Self {
            resolver,
            skip,
            failures: FailureCounts::default(),
        }
    }

    /// Walk `path`, returning the entry count and the logical size of the
    /// files beneath it
    pub fn walk<S: RecordSink>(&mut self, path: &Path, sink: &mut S) -> (u64, u64) {
        let resolved = match self.resolver.resolve(path) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.failures.note(&err);
                return (0, 0);
            }
        };

        if let Err(e) = sink.write_record(&resolved.record) {
            warn!("Cannot write record for '{}': {}", path.display(), e);
            self.failures.write_errors += 1;
        }

        if !resolved.is_dir {
            return (1, resolved.size);
        }

        let children = match self.resolver.list(path) {
            Ok(children) => children,
            Err(err) => {
                self.failures.note(&err);
                Vec::new()
            }
        };

        let mut count = 1;
        let mut size = 0;
        for child in children {
            if self.skip.matches(&child) {
                continue;
            }
            let (c, s) = self.walk(&child, sink);
            count += c;
            size += s;
        }
        (count, size)
    }

    /// Failures seen so far
    pub fn failures(&self) -> FailureCounts {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::record::EntryKind;
    use crate::fs::resolver::RawStat;
    use std::ffi::OsString;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, len: usize) {
        File::create(path).unwrap().write_all(&vec![0u8; len]).unwrap();
    }

    /// root/{a(10), b(20), c/{d(5), e/{f(1)}}}
    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_file(&root.join("a"), 10);
        write_file(&root.join("b"), 20);
        std::fs::create_dir_all(root.join("c/e")).unwrap();
        write_file(&root.join("c/d"), 5);
        write_file(&root.join("c/e/f"), 1);
        dir
    }

    /// Source that fails to stat or list configured names
    struct FailingSource {
        stat_fails: &'static str,
        list_fails: &'static str,
    }

    impl MetadataSource for FailingSource {
        fn stat_entry(&self, path: &Path) -> io::Result<RawStat> {
            if path.ends_with(self.stat_fails) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            OsMetadata.stat_entry(path)
        }

        fn list_children(&self, path: &Path) -> io::Result<Vec<OsString>> {
            if path.ends_with(self.list_fails) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            OsMetadata.list_children(path)
        }
    }

    #[test]
    fn test_walk_counts_and_sizes() {
        let dir = create_test_tree();
        let resolver = StatResolver::new();
        let skip = SkipSet::default();
        let mut walker = Walker::new(&resolver, &skip);
        let mut sink: Vec<StatRecord> = Vec::new();

        let (count, size) = walker.walk(dir.path(), &mut sink);

        // root, a, b, c, d, e, f
        assert_eq!(count, 7);
        assert_eq!(sink.len(), 7);
        assert_eq!(size, 36);
        assert_eq!(walker.failures().total(), 0);
        assert_eq!(sink[0].path, dir.path());
    }

    #[test]
    fn test_walk_single_file() {
        let dir = create_test_tree();
        let resolver = StatResolver::new();
        let skip = SkipSet::default();
        let mut sink: Vec<StatRecord> = Vec::new();

        let (count, size) = Walker::new(&resolver, &skip).walk(&dir.path().join("b"), &mut sink);
        assert_eq!((count, size), (1, 20));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_walk_respects_skip() {
        let dir = create_test_tree();
        let resolver = StatResolver::new();
        let skip = SkipSet::new(["/c"]);
        let mut sink: Vec<StatRecord> = Vec::new();

        let (count, size) = Walker::new(&resolver, &skip).walk(dir.path(), &mut sink);
        assert_eq!(count, 3);
        assert_eq!(size, 30);
        assert!(sink.iter().all(|r| !r.path.starts_with(dir.path().join("c"))));
    }

    #[test]
    fn test_stat_failure_skips_entry_only() {
        let dir = create_test_tree();
        let resolver = StatResolver::with_parts(
            FailingSource { stat_fails: "e", list_fails: "none" },
            Unresolved,
        );
        let skip = SkipSet::default();
        let mut walker = Walker::new(&resolver, &skip);
        let mut sink: Vec<StatRecord> = Vec::new();

        let (count, size) = walker.walk(dir.path(), &mut sink);

        // e and everything under it vanish, siblings survive
        assert_eq!(count, 5);
        assert_eq!(size, 35);
        assert_eq!(walker.failures().stat_errors, 1);
        assert!(!sink.iter().any(|r| r.path.ends_with("f")));
    }

    #[test]
    fn test_list_failure_keeps_directory_record() {
        let dir = create_test_tree();
        let resolver = StatResolver::with_parts(
            FailingSource { stat_fails: "none", list_fails: "c" },
            Unresolved,
        );
        let skip = SkipSet::default();
        let mut walker = Walker::new(&resolver, &skip);
        let mut sink: Vec<StatRecord> = Vec::new();

        let (count, _) = walker.walk(dir.path(), &mut sink);

        assert_eq!(count, 4);
        assert_eq!(walker.failures().list_errors, 1);
        assert!(sink.iter().any(|r| r.path == dir.path().join("c")));
        assert!(!sink.iter().any(|r| r.path == dir.path().join("c/d")));
    }

    #[test]
    fn test_unresolvable_root() {
        let dir = TempDir::new().unwrap();
        let resolver = StatResolver::new();
        let skip = SkipSet::default();
        let mut walker = Walker::new(&resolver, &skip);
        let mut sink: Vec<StatRecord> = Vec::new();

        assert_eq!(walker.walk(&dir.path().join("missing"), &mut sink), (0, 0));
        assert!(sink.is_empty());
        assert_eq!(walker.failures().stat_errors, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_recorded_once_not_traversed() {
        let dir = create_test_tree();
        let link = dir.path().join("loop");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();

        let resolver = StatResolver::new();
        let skip = SkipSet::default();
        let mut sink: Vec<StatRecord> = Vec::new();
        let (count, _) = Walker::new(&resolver, &skip).walk(dir.path(), &mut sink);

        assert_eq!(count, 8);
        let links: Vec<&StatRecord> = sink.iter().filter(|r| r.path.starts_with(&link)).collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind(), EntryKind::Link);
    }

    #[test]
    fn test_failure_counts_merge() {
        let mut a = FailureCounts { stat_errors: 1, list_errors: 2, write_errors: 0 };
        let b = FailureCounts { stat_errors: 3, list_errors: 0, write_errors: 1 };
        a.merge(&b);
        assert_eq!(a.total(), 7);
        assert_eq!(a.stat_errors, 4);
    }
}
