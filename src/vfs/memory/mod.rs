/*!
 * In-Memory Filesystem Backend
 * Fast, volatile filesystem for testing and temporary storage
 */

mod dir_ops;
mod file_ops;
mod node;

use ahash::RandomState;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::FileSystem;
use super::types::*;
use node::Node;

/// In-memory filesystem implementation
///
/// Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemFS {
    pub(super) nodes: Arc<DashMap<PathBuf, Node, RandomState>>,
    pub(super) max_size: Option<usize>,
    pub(super) current_size: Arc<AtomicUsize>,
}

impl MemFS {
    /// Create new in-memory filesystem
    pub fn new() -> Self {
        let nodes = DashMap::with_hasher(RandomState::new());
        nodes.insert(PathBuf::from("/"), Node::directory(0o755));

        Self {
            nodes: Arc::new(nodes),
            max_size: None,
            current_size: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create with size limit
    pub fn with_capacity(max_size: usize) -> Self {
        let mut fs = Self::new();
        fs.max_size = Some(max_size);
        fs
    }

    /// Total bytes held by file contents
    pub fn used_bytes(&self) -> usize {
        self.current_size.load(Ordering::SeqCst)
    }

    /// Normalize path (make absolute and clean)
    pub(super) fn normalize(&self, path: &Path) -> PathBuf {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new("/").join(path)
        };

        PathBuf::from(path_clean::clean(&path))
    }

    /// Check if space is available and reserve it atomically
    pub(super) fn check_and_reserve_space(&self, additional: usize) -> VfsResult<()> {
        let Some(max) = self.max_size else {
            self.current_size.fetch_add(additional, Ordering::SeqCst);
            return Ok(());
        };

        loop {
            let current = self.current_size.load(Ordering::SeqCst);
            if current + additional > max {
                return Err(VfsError::OutOfSpace);
            }
            if self
                .current_size
                .compare_exchange(
                    current,
                    current + additional,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    pub(super) fn release_space(&self, amount: usize) {
        self.current_size.fetch_sub(amount, Ordering::SeqCst);
    }

    /// Get file name from path
    pub(super) fn file_name(&self, path: &Path) -> VfsResult<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| VfsError::InvalidPath(format!("invalid path: {}", path.display())))
    }

    /// Parent path of a normalized, non-root path
    pub(super) fn parent_of(&self, path: &Path) -> VfsResult<PathBuf> {
        path.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| VfsError::InvalidPath(format!("no parent: {}", path.display())))
    }

    /// Ensure parent directory exists and is writable
    pub(super) fn ensure_parent(&self, path: &Path) -> VfsResult<PathBuf> {
        let parent = self.parent_of(path)?;
        let node = self.nodes.get(&parent).ok_or_else(|| {
            VfsError::NotFound(format!("parent directory not found: {}", parent.display()))
        })?;

        if !node.is_dir() {
            return Err(VfsError::NotADirectory(parent.display().to_string()));
        }
        if node.permissions() & 0o200 == 0 {
            return Err(VfsError::PermissionDenied(format!(
                "parent directory is readonly: {}",
                parent.display()
            )));
        }
        Ok(parent)
    }

    /// Add child to parent directory
    pub(super) fn add_child(
        &self,
        parent_path: &Path,
        child_name: &str,
        child_path: &Path,
    ) -> VfsResult<()> {
        match self.nodes.get_mut(parent_path) {
            Some(mut node) => match node.value_mut() {
                Node::Directory { children, .. } => {
                    children.insert(child_name.to_string(), child_path.to_path_buf());
                    Ok(())
                }
                Node::File { .. } => Err(VfsError::NotADirectory(parent_path.display().to_string())),
            },
            None => Err(VfsError::NotFound(parent_path.display().to_string())),
        }
    }
}

impl Default for MemFS {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFS {
    fn metadata(&self, path: &Path) -> VfsResult<Metadata> {
        self.metadata_impl(path)
    }

    fn list_dir(&self, path: &Path) -> VfsResult<Vec<Entry>> {
        self.list_dir_impl(path)
    }

    fn create(&self, path: &Path, permissions: u32) -> VfsResult<()> {
        self.create_impl(path, permissions)
    }

    fn read_at(&self, path: &Path, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        self.read_at_impl(path, offset, len)
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<usize> {
        self.write_at_impl(path, offset, data)
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(&self.normalize(path))
    }

    fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        self.truncate_impl(path, size)
    }

    fn create_dir(&self, path: &Path) -> VfsResult<()> {
        self.create_dir_impl(path)
    }

    fn name(&self) -> &str {
        "memfs"
    }
}
