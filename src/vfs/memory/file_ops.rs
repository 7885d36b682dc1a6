/*!
 * File Operations Implementation
 * Positional file I/O for the in-memory backend
 */

use std::path::Path;
use std::time::SystemTime;

use super::super::types::*;
use super::node::Node;
use super::MemFS;

impl MemFS {
    pub(super) fn create_impl(&self, path: &Path, permissions: u32) -> VfsResult<()> {
        let path = self.normalize(path);
        if self.nodes.contains_key(&path) {
            return Err(VfsError::AlreadyExists(path.display().to_string()));
        }

        let parent = self.ensure_parent(&path)?;
        let name = self.file_name(&path)?;

        self.nodes.insert(path.clone(), Node::file(permissions));
        self.add_child(&parent, &name, &path)
    }

    pub(super) fn read_at_impl(&self, path: &Path, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        let path = self.normalize(path);

        match self.nodes.get(&path).as_deref() {
            Some(Node::File { data, .. }) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                let end = start.saturating_add(len).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Node::Directory { .. }) => Err(VfsError::IsADirectory(path.display().to_string())),
            None => Err(VfsError::NotFound(path.display().to_string())),
        }
    }

    pub(super) fn write_at_impl(&self, path: &Path, offset: u64, buf: &[u8]) -> VfsResult<usize> {
        let path = self.normalize(path);
        let start = usize::try_from(offset).map_err(|_| VfsError::FileTooLarge)?;
        let end = start.checked_add(buf.len()).ok_or(VfsError::FileTooLarge)?;

        let mut node = self
            .nodes
            .get_mut(&path)
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))?;

        match node.value_mut() {
            Node::File {
                data,
                permissions,
                modified,
            } => {
                if *permissions & 0o200 == 0 {
                    return Err(VfsError::PermissionDenied(format!(
                        "file is readonly: {}",
                        path.display()
                    )));
                }
                if end > data.len() {
                    self.check_and_reserve_space(end - data.len())?;
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(buf);
                *modified = SystemTime::now();
                Ok(buf.len())
            }
            Node::Directory { .. } => Err(VfsError::IsADirectory(path.display().to_string())),
        }
    }

    pub(super) fn truncate_impl(&self, path: &Path, size: u64) -> VfsResult<()> {
        let path = self.normalize(path);
        let size = usize::try_from(size).map_err(|_| VfsError::FileTooLarge)?;

        let mut node = self
            .nodes
            .get_mut(&path)
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))?;

        match node.value_mut() {
            Node::File { data, modified, .. } => {
                let old = data.len();
                if size > old {
                    self.check_and_reserve_space(size - old)?;
                } else {
                    self.release_space(old - size);
                }
                data.resize(size, 0);
                *modified = SystemTime::now();
                Ok(())
            }
            Node::Directory { .. } => Err(VfsError::IsADirectory(path.display().to_string())),
        }
    }
}
