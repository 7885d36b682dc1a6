/*!
 * VFS Types
 * Errors, metadata and directory entries of the backing store
 */

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::core::limits::{MODE_DIR, MODE_PERM};
use crate::syscalls::types::{DirEntry, Errno, FileInfo};

/// VFS operation result
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Out of space")]
    OutOfSpace,

    #[error("File too large")]
    FileTooLarge,

    #[error("Read-only filesystem")]
    ReadOnly,
}

impl VfsError {
    /// Errno relayed to a process for this failure
    #[must_use]
    pub const fn errno(&self) -> Errno {
        match self {
            VfsError::NotFound(_) => Errno::Enoent,
            VfsError::AlreadyExists(_) => Errno::Eexist,
            VfsError::PermissionDenied(_) | VfsError::ReadOnly => Errno::Eacces,
            VfsError::NotADirectory(_) => Errno::Enotdir,
            VfsError::IsADirectory(_) => Errno::Eisdir,
            VfsError::InvalidPath(_) => Errno::Einval,
            VfsError::NotSupported(_) => Errno::Enosys,
            VfsError::IoError(_) | VfsError::OutOfSpace | VfsError::FileTooLarge => Errno::Eio,
        }
    }
}

/// File type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    #[default]
    File,
    Directory,
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub file_type: FileType,
    pub size: u64,
    /// Permission bits (`0o777` mask)
    pub permissions: u32,
    pub modified: SystemTime,
}

impl Metadata {
    #[inline(always)]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    #[inline(always)]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    /// Wire mode: type bits plus permission bits
    #[must_use]
    pub const fn mode(&self) -> u32 {
        file_mode(self.file_type, self.permissions)
    }

    /// Modification time in whole seconds since the UNIX epoch
    #[must_use]
    pub fn modified_secs(&self) -> u64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// File info as reported by `stat`, named after the final path component
    #[must_use]
    pub fn to_file_info(&self, name: impl Into<String>) -> FileInfo {
        FileInfo::new(name, self.mode(), self.size).with_modified(self.modified_secs())
    }
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub file_type: FileType,
    pub permissions: u32,
}

impl Entry {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, file_type: FileType, permissions: u32) -> Self {
        Self {
            name: name.into(),
            file_type,
            permissions,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

impl From<Entry> for DirEntry {
    fn from(entry: Entry) -> Self {
        DirEntry::new(entry.name, file_mode(entry.file_type, entry.permissions))
    }
}

#[inline]
const fn file_mode(file_type: FileType, permissions: u32) -> u32 {
    let perm = permissions & MODE_PERM;
    match file_type {
        FileType::Directory => MODE_DIR | perm,
        FileType::File => perm,
    }
}
