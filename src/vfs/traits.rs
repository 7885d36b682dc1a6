/*!
 * VFS Traits
 * Core filesystem abstraction traits
 */

use std::path::Path;

use super::types::*;

/// Virtual filesystem trait
///
/// Backing store for the relay's file syscalls. Paths handed to a
/// filesystem are absolute and already resolved against the caller's
/// working directory. Optional operations default to `NotSupported`,
/// which processes see as ENOSYS.
pub trait FileSystem: Send + Sync {
    /// Get file metadata
    fn metadata(&self, path: &Path) -> VfsResult<Metadata>;

    /// List directory contents
    fn list_dir(&self, path: &Path) -> VfsResult<Vec<Entry>>;

    /// Create an empty file; fails if the path exists
    fn create(&self, path: &Path, permissions: u32) -> VfsResult<()>;

    /// Read up to `len` bytes starting at `offset`; empty at end of file
    fn read_at(&self, path: &Path, offset: u64, len: usize) -> VfsResult<Vec<u8>>;

    /// Write `data` at `offset`, growing the file as needed
    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<usize>;

    /// Check if file/directory exists
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    /// Truncate file to specified size
    fn truncate(&self, path: &Path, _size: u64) -> VfsResult<()> {
        Err(VfsError::NotSupported(format!("truncate {}", path.display())))
    }

    /// Create directory (including parents)
    fn create_dir(&self, path: &Path) -> VfsResult<()> {
        Err(VfsError::NotSupported(format!("mkdir {}", path.display())))
    }

    /// Get filesystem name/type
    fn name(&self) -> &str;

    /// Check if filesystem is read-only
    fn readonly(&self) -> bool {
        false
    }
}
