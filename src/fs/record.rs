//! Stat records and the CSV output schema
//!
//! One [`StatRecord`] is produced per successfully stat'ed entry and encoded
//! as one CSV line:
//!
//! ```text
//! INODE,ATIME,MTIME,UID,GID,MODE,SIZE,DISK,PATH
//! 2049-131075,1700000000,1700000000,1000,1000,33188,10,4096,"/data/a.txt"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

/// CSV header line (without newline)
pub const HEADER: &str = "INODE,ATIME,MTIME,UID,GID,MODE,SIZE,DISK,PATH";

/// Unit of the allocated block count reported by stat
pub const BLOCK_SIZE: u64 = 512;

const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Entry type decoded from the mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link (never followed)
    Link,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Named pipe
    Fifo,
    /// Unix socket
    Socket,
    /// Type bits not recognized
    Unknown,
}

impl EntryKind {
    /// Decode the `S_IFMT` bits of a raw mode
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::File,
            S_IFDIR => Self::Dir,
            S_IFLNK => Self::Link,
            S_IFBLK => Self::BlockDevice,
            S_IFCHR => Self::CharDevice,
            S_IFIFO => Self::Fifo,
            S_IFSOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }

    /// Type bits for this kind, used when a platform has no raw mode
    pub fn type_bits(self) -> u32 {
        match self {
            Self::File => S_IFREG,
            Self::Dir => S_IFDIR,
            Self::Link => S_IFLNK,
            Self::BlockDevice => S_IFBLK,
            Self::CharDevice => S_IFCHR,
            Self::Fifo => S_IFIFO,
            Self::Socket => S_IFSOCK,
            Self::Unknown => 0,
        }
    }
}

/// Owner identity of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerId {
    /// POSIX numeric uid
    Numeric(u32),
    /// Platform owner string (e.g. a Windows SID)
    Sid(String),
    /// Lookup failed or is not available
    Unresolved,
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(uid) => write!(f, "{}", uid),
            Self::Sid(sid) => f.write_str(sid),
            Self::Unresolved => Ok(()),
        }
    }
}

/// Raw metadata of one filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatRecord {
    /// Device id
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// Access time, unix seconds
    pub atime: i64,
    /// Modify time, unix seconds
    pub mtime: i64,
    /// Owner
    pub owner: OwnerId,
    /// Group id (0 where groups are not available)
    pub gid: u32,
    /// Raw mode bits (type + permissions)
    pub mode: u32,
    /// Logical size in bytes
    pub size: u64,
    /// Allocated 512-byte blocks, if the platform reports them
    pub blocks: Option<u64>,
    /// Absolute path at time of stat
    pub path: PathBuf,
}

impl StatRecord {
    /// Entry type
    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode)
    }

    /// Is this entry a directory (links to directories are not)
    pub fn is_dir(&self) -> bool {
        self.kind() == EntryKind::Dir
    }

    /// Allocated disk usage in bytes
    pub fn disk(&self) -> u64 {
        self.blocks
            .map_or(0, |blocks| blocks.saturating_mul(BLOCK_SIZE))
    }

    /// Composite `device-inode` identifier
    pub fn inode_key(&self) -> String {
        format!("{}-{}", self.dev, self.ino)
    }

    /// Append this record as one CSV line, newline included
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(
            out,
            "{}-{},{},{},{},{},{},{},{},",
            self.dev,
            self.ino,
            self.atime,
            self.mtime,
            self.owner,
            self.gid,
            self.mode,
            self.size,
            self.disk()
        )?;
        write_quoted_path(out, &self.path)?;
        out.write_all(b"\n")
    }

    /// CSV line as a string, without newline
    pub fn to_csv_line(&self) -> String {
        let mut buf = Vec::with_capacity(128);
        // writing into a Vec cannot fail
        let _ = self.write_csv(&mut buf);
        buf.pop();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_quoted_path<W: Write>(out: &mut W, path: &std::path::Path) -> io::Result<()> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes()
    };

    #[cfg(not(unix))]
    let lossy = path.to_string_lossy();
    #[cfg(not(unix))]
    let bytes = lossy.as_bytes();

    out.write_all(b"\"")?;
    let mut parts = bytes.split(|b| *b == b'"');
    if let Some(first) = parts.next() {
        out.write_all(first)?;
    }
    for part in parts {
        out.write_all(b"\"\"")?;
        out.write_all(part)?;
    }
    out.write_all(b"\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, mode: u32, blocks: Option<u64>) -> StatRecord {
        StatRecord {
            dev: 2049,
            ino: 131075,
            atime: 1_700_000_000,
            mtime: 1_700_000_100,
            owner: OwnerId::Numeric(1000),
            gid: 100,
            mode,
            size: 10,
            blocks,
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_entry_kind_from_mode() {
        assert_eq!(EntryKind::from_mode(0o100644), EntryKind::File);
        assert_eq!(EntryKind::from_mode(0o040755), EntryKind::Dir);
        assert_eq!(EntryKind::from_mode(0o120777), EntryKind::Link);
        assert_eq!(EntryKind::from_mode(0o060660), EntryKind::BlockDevice);
        assert_eq!(EntryKind::from_mode(0o020666), EntryKind::CharDevice);
        assert_eq!(EntryKind::from_mode(0o010644), EntryKind::Fifo);
        assert_eq!(EntryKind::from_mode(0o140755), EntryKind::Socket);
        assert_eq!(EntryKind::from_mode(0o644), EntryKind::Unknown);

        for kind in [EntryKind::File, EntryKind::Dir, EntryKind::Link, EntryKind::Socket] {
            assert_eq!(EntryKind::from_mode(kind.type_bits() | 0o600), kind);
        }
    }

    #[test]
    fn test_disk_usage() {
        assert_eq!(record("/a", 0o100644, Some(8)).disk(), 4096);
        assert_eq!(record("/a", 0o100644, Some(0)).disk(), 0);
        assert_eq!(record("/a", 0o100644, None).disk(), 0);
    }

    #[test]
    fn test_csv_line() {
        let line = record("/data/a.txt", 0o100644, Some(8)).to_csv_line();
        assert_eq!(
            line,
            "2049-131075,1700000000,1700000100,1000,100,33188,10,4096,\"/data/a.txt\""
        );
        assert_eq!(line.split(',').count(), HEADER.split(',').count());
    }

    #[test]
    fn test_csv_quotes_are_doubled() {
        let line = record("/data/say \"hi\",x", 0o100644, None).to_csv_line();
        assert!(line.ends_with(",0,\"/data/say \"\"hi\"\",x\""));
    }

    #[test]
    fn test_owner_rendering() {
        let mut rec = record("/a", 0o100644, None);
        rec.owner = OwnerId::Sid("S-1-5-21-1001".to_string());
        assert!(rec.to_csv_line().contains(",S-1-5-21-1001,100,"));

        rec.owner = OwnerId::Unresolved;
        assert!(rec.to_csv_line().contains(",1700000100,,100,"));
    }

    #[test]
    fn test_write_csv_ends_with_newline() {
        let mut buf = Vec::new();
        record("/a", 0o040755, Some(8)).write_csv(&mut buf).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);
    }
}
