/*!
 * Syscall Result Types
 * Structured values reconstructed from stat/readdir replies
 */

use serde::{Deserialize, Serialize};

use crate::core::limits::{MODE_CHAR_DEVICE, MODE_DEVICE, MODE_DIR, MODE_PERM, MODE_TYPE};

/// File information returned by `stat` and `fstat`
///
/// `mode` carries the type in its high bits (see `core::limits::MODE_*`)
/// and the permission bits in the low nine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub mode: u32,
    pub size: u64,
    /// Modification time, seconds since the UNIX epoch
    pub modified: u64,
}

impl FileInfo {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, mode: u32, size: u64) -> Self {
        Self {
            name: name.into(),
            mode,
            size,
            modified: 0,
        }
    }

    /// Info with only a mode set, as reconstructed from a bare reply
    #[inline]
    #[must_use]
    pub fn from_mode(mode: u32) -> Self {
        Self::new(String::new(), mode, 0)
    }

    #[inline]
    #[must_use]
    pub fn with_modified(mut self, modified: u64) -> Self {
        self.modified = modified;
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    /// Plain file: no type bit set
    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.mode & MODE_TYPE == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_char_device(&self) -> bool {
        self.mode & (MODE_DEVICE | MODE_CHAR_DEVICE) == (MODE_DEVICE | MODE_CHAR_DEVICE)
    }

    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.mode & MODE_PERM
    }
}

/// One entry of a `readdir` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub mode: u32,
}

impl DirEntry {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.mode & MODE_TYPE == 0
    }
}
