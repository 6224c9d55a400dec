//! Stat resolution without following symbolic links
//!
//! [`StatResolver`] turns a path into a [`StatRecord`] through two explicit
//! collaborators: a [`MetadataSource`] for the raw stat and directory listing
//! primitives, and an [`OwnerLookup`] used when the platform has no numeric
//! owner id.

use crate::error::{Result, StatWalkerError};
use crate::fs::record::{EntryKind, OwnerId, StatRecord};
use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Raw stat fields as returned by the operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawStat {
    /// Device id
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// Access time, unix seconds
    pub atime: i64,
    /// Modify time, unix seconds
    pub mtime: i64,
    /// Numeric owner, if the platform has one
    pub uid: Option<u32>,
    /// Numeric group, if the platform has one
    pub gid: Option<u32>,
    /// Raw mode bits
    pub mode: u32,
    /// Logical size
    pub size: u64,
    /// Allocated 512-byte blocks
    pub blocks: Option<u64>,
}

impl RawStat {
    /// Extract raw fields from `lstat` metadata
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
            mode: meta.mode(),
            size: meta.size(),
            blocks: Some(meta.blocks()),
        }
    }

    /// Extract raw fields from metadata, synthesizing the mode bits
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        fn secs(time: io::Result<SystemTime>) -> i64 {
            time.ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs() as i64)
        }

        let file_type = meta.file_type();
        let (kind, perms) = if file_type.is_symlink() {
            (EntryKind::Link, 0o777)
        } else if file_type.is_dir() {
            (EntryKind::Dir, 0o777)
        } else {
            (EntryKind::File, 0o666)
        };
        let perms = if meta.permissions().readonly() { perms & !0o222 } else { perms };

        Self {
            dev: 0,
            ino: 0,
            atime: secs(meta.accessed()),
            mtime: secs(meta.modified()),
            uid: None,
            gid: None,
            mode: kind.type_bits() | perms,
            size: meta.len(),
            blocks: None,
        }
    }
}

/// Raw filesystem primitives used by the scanner
pub trait MetadataSource: Send + Sync {
    /// Stat an entry without following symbolic links
    fn stat_entry(&self, path: &Path) -> io::Result<RawStat>;

    /// List the names of a directory's children
    fn list_children(&self, path: &Path) -> io::Result<Vec<OsString>>;
}

/// [`MetadataSource`] backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsMetadata;

impl MetadataSource for OsMetadata {
    fn stat_entry(&self, path: &Path) -> io::Result<RawStat> {
        std::fs::symlink_metadata(path).map(|meta| RawStat::from_metadata(&meta))
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<OsString>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }
}

/// Owner identity lookup for platforms without numeric owners
///
/// Implementations must not fail; an unknown owner is `None`.
pub trait OwnerLookup: Send + Sync {
    /// Owner identifier string of `path`
    fn owner_of(&self, path: &Path) -> Option<String>;
}

/// Lookup that never resolves an owner
#[derive(Debug, Default, Clone, Copy)]
pub struct Unresolved;

impl OwnerLookup for Unresolved {
    fn owner_of(&self, _path: &Path) -> Option<String> {
        None
    }
}

impl<F> OwnerLookup for F
where
    F: Fn(&Path) -> Option<String> + Send + Sync,
{
    fn owner_of(&self, path: &Path) -> Option<String> {
        self(path)
    }
}

/// A resolved entry: its record plus what traversal needs from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Directory to descend into
    pub is_dir: bool,
    /// Logical size
    pub size: u64,
    /// Record to emit
    pub record: StatRecord,
}

/// Resolves paths into stat records
#[derive(Debug, Default, Clone)]
pub struct StatResolver<M = OsMetadata, L = Unresolved> {
    source: M,
    owners: L,
}

impl StatResolver {
    /// Resolver backed by the operating system
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: MetadataSource, L: OwnerLookup> StatResolver<M, L> {
    /// Resolver over explicit collaborators
    pub fn with_parts(source: M, owners: L) -> Self {
        Self { source, owners }
    }

    /// Stat `path` without following links
    pub fn resolve(&self, path: &Path) -> Result<Resolved> {
        let raw = self
            .source
            .stat_entry(path)
            .map_err(|e| StatWalkerError::stat(path, e))?;

        let owner = match raw.uid {
            Some(uid) => OwnerId::Numeric(uid),
            None => self
                .owners
                .owner_of(path)
                .map_or(OwnerId::Unresolved, OwnerId::Sid),
        };

        let record = StatRecord {
            dev: raw.dev,
            ino: raw.ino,
            atime: raw.atime,
            mtime: raw.mtime,
            owner,
            gid: raw.gid.unwrap_or(0),
            mode: raw.mode,
            size: raw.size,
            blocks: raw.blocks,
            path: path.to_path_buf(),
        };

        Ok(Resolved {
            is_dir: record.kind() == EntryKind::Dir,
            size: raw.size,
            record,
        })
    }

    /// Full paths of the children of `dir`, sorted by name
    pub fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut names = self
            .source
            .list_children(dir)
            .map_err(|e| StatWalkerError::list(dir, e))?;
        names.sort_unstable();
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Source reporting no numeric owner, like a non-POSIX platform
    struct NoUidSource;

    impl MetadataSource for NoUidSource {
        fn stat_entry(&self, path: &Path) -> io::Result<RawStat> {
            let mut raw = OsMetadata.stat_entry(path)?;
            raw.uid = None;
            raw.gid = None;
            raw.blocks = None;
            Ok(raw)
        }

        fn list_children(&self, path: &Path) -> io::Result<Vec<OsString>> {
            OsMetadata.list_children(path)
        }
    }

    #[test]
    fn test_resolve_file_and_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        File::create(&file).unwrap().write_all(&[7u8; 10]).unwrap();

        let resolver = StatResolver::new();

        let resolved = resolver.resolve(&file).unwrap();
        assert!(!resolved.is_dir);
        assert_eq!(resolved.size, 10);
        assert_eq!(resolved.record.kind(), EntryKind::File);
        assert_eq!(resolved.record.path, file);

        let resolved = resolver.resolve(dir.path()).unwrap();
        assert!(resolved.is_dir);
        assert_eq!(resolved.record.kind(), EntryKind::Dir);
    }

    #[test]
    fn test_resolve_missing_is_stat_error() {
        let dir = TempDir::new().unwrap();
        let err = StatResolver::new()
            .resolve(&dir.path().join("vanished"))
            .unwrap_err();
        assert!(matches!(err, StatWalkerError::Stat { .. }));
    }

    #[test]
    fn test_list_sorted_and_errors() {
        let dir = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let resolver = StatResolver::new();
        let children = resolver.list(dir.path()).unwrap();
        let names: Vec<_> = children.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let err = resolver.list(&dir.path().join("a")).unwrap_err();
        assert!(matches!(err, StatWalkerError::List { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_not_followed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("target"), &link).unwrap();

        let resolved = StatResolver::new().resolve(&link).unwrap();
        assert!(!resolved.is_dir);
        assert_eq!(resolved.record.kind(), EntryKind::Link);
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_owner_and_disk() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        File::create(&file).unwrap().write_all(&vec![1u8; 64 * 1024]).unwrap();

        let meta = std::fs::symlink_metadata(&file).unwrap();
        let record = StatResolver::new().resolve(&file).unwrap().record;

        assert_eq!(record.owner, OwnerId::Numeric(meta.uid()));
        assert_eq!(record.gid, meta.gid());
        assert_eq!(record.disk(), meta.blocks() * 512);
        assert_eq!(record.inode_key(), format!("{}-{}", meta.dev(), meta.ino()));
    }

    #[test]
    fn test_owner_lookup_fallback() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("owned");
        File::create(&file).unwrap();

        let lookup = |_: &Path| Some("S-1-5-21-1001".to_string());
        let record = StatResolver::with_parts(NoUidSource, lookup)
            .resolve(&file)
            .unwrap()
            .record;
        assert_eq!(record.owner, OwnerId::Sid("S-1-5-21-1001".to_string()));
        assert_eq!(record.gid, 0);
        assert_eq!(record.disk(), 0);

        let record = StatResolver::with_parts(NoUidSource, Unresolved)
            .resolve(&file)
            .unwrap()
            .record;
        assert_eq!(record.owner, OwnerId::Unresolved);
    }
}
