//! Remote entry types and catalogue records
//!
//! `RemoteEntry` is what a directory listing yields; `CatalogueEntry` is the
//! record persisted to the store and the append log for every file leaf.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Type of remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (never followed)
    Symlink,
    /// Device, socket, fifo or unknown
    Other,
}

impl EntryKind {
    /// Convert from Unix mode bits as reported by the server
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => EntryKind::File,      // S_IFREG
            0o040000 => EntryKind::Directory, // S_IFDIR
            0o120000 => EntryKind::Symlink,   // S_IFLNK
            _ => EntryKind::Other,
        }
    }

    pub fn is_file(&self) -> bool {
        *self == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        *self == EntryKind::Directory
    }
}

/// A single child returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name (not full path)
    pub name: String,

    /// Entry type
    pub kind: EntryKind,

    /// Size in bytes, if the server reported one
    pub size: Option<u64>,

    /// Modification time as a Unix timestamp, if reported
    pub mtime: Option<i64>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: Some(size),
            mtime: Some(mtime),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: None,
            mtime: None,
        }
    }

    /// Check if this is "." or ".."
    pub fn is_special(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// Size in bytes (0 if not reported)
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// Join a directory path and a child name without doubling slashes
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// One observed file, as persisted to the store and the append log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Absolute remote path (identity key)
    pub path: String,

    /// Size at time of observation
    pub size_bytes: u64,

    /// Modification time, second precision, remote clock (UTC)
    #[serde(with = "iso_seconds")]
    pub last_modified: NaiveDateTime,
}

impl CatalogueEntry {
    pub fn new(path: impl Into<String>, size_bytes: u64, last_modified: NaiveDateTime) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            last_modified,
        }
    }

    /// Build an entry for a file child of `dir`
    ///
    /// A missing mtime falls back to the Unix epoch.
    pub fn from_remote(dir: &str, entry: &RemoteEntry) -> Self {
        Self {
            path: join_path(dir, &entry.name),
            size_bytes: entry.size_or_zero(),
            last_modified: timestamp_to_naive(entry.mtime.unwrap_or(0)),
        }
    }

    /// `last_modified` rendered as stored (`YYYY-MM-DDTHH:MM:SS`)
    pub fn last_modified_iso(&self) -> String {
        format_iso(&self.last_modified)
    }
}

/// Convert a Unix timestamp to a second-precision UTC datetime
pub fn timestamp_to_naive(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .naive_utc()
}

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_iso(value: &NaiveDateTime) -> String {
    value.format(ISO_FORMAT).to_string()
}

pub fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, ISO_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

mod iso_seconds {
    use super::{format_iso, parse_iso};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_iso(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_iso(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_from_mode() {
        assert_eq!(EntryKind::from_mode(0o100644), EntryKind::File);
        assert_eq!(EntryKind::from_mode(0o040755), EntryKind::Directory);
        assert_eq!(EntryKind::from_mode(0o120777), EntryKind::Symlink);
        assert_eq!(EntryKind::from_mode(0o020666), EntryKind::Other);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/free", "prod1"), "/free/prod1");
        assert_eq!(join_path("/", "free"), "/free");
        assert_eq!(join_path("/free/", "x.csv"), "/free/x.csv");
    }

    #[test]
    fn test_catalogue_entry_from_remote() {
        let remote = RemoteEntry::file("a.csv", 100, 1_704_888_000);
        let entry = CatalogueEntry::from_remote("/free/prodABC/2024-01-10", &remote);
        assert_eq!(entry.path, "/free/prodABC/2024-01-10/a.csv");
        assert_eq!(entry.size_bytes, 100);
        assert_eq!(entry.last_modified_iso(), "2024-01-10T12:00:00");
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let remote = RemoteEntry {
            name: "odd".into(),
            kind: EntryKind::File,
            size: None,
            mtime: None,
        };
        let entry = CatalogueEntry::from_remote("/free", &remote);
        assert_eq!(entry.size_bytes, 0);
        assert_eq!(entry.last_modified_iso(), "1970-01-01T00:00:00");
    }

    #[test]
    fn test_json_shape() {
        let entry = CatalogueEntry::new(
            "/free/prod1/2024/01/02/f.zip",
            42,
            timestamp_to_naive(1_704_153_600),
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"path":"/free/prod1/2024/01/02/f.zip","size_bytes":42,"last_modified":"2024-01-02T00:00:00"}"#
        );
        let back: CatalogueEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
