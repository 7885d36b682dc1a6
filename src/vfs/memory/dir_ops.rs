/*!
 * Directory Operations Implementation
 * Listing, lookup and directory creation
 */

use std::path::{Path, PathBuf};

use super::super::types::*;
use super::node::Node;
use super::MemFS;

impl MemFS {
    pub(super) fn metadata_impl(&self, path: &Path) -> VfsResult<Metadata> {
        let path = self.normalize(path);
        self.nodes
            .get(&path)
            .map(|node| node.metadata())
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))
    }

    pub(super) fn list_dir_impl(&self, path: &Path) -> VfsResult<Vec<Entry>> {
        let path = self.normalize(path);

        // Clone the child list so no shard lock is held while visiting children
        let children = match self.nodes.get(&path).as_deref() {
            Some(Node::Directory { children, .. }) => children.clone(),
            Some(Node::File { .. }) => {
                return Err(VfsError::NotADirectory(path.display().to_string()))
            }
            None => return Err(VfsError::NotFound(path.display().to_string())),
        };

        let mut entries: Vec<Entry> = children
            .into_iter()
            .filter_map(|(name, child_path)| {
                self.nodes
                    .get(&child_path)
                    .map(|node| Entry::new(name, node.file_type(), node.permissions()))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub(super) fn create_dir_impl(&self, path: &Path) -> VfsResult<()> {
        let path = self.normalize(path);

        let mut current = PathBuf::from("/");
        for component in path.components().skip(1) {
            current.push(component);

            let existing_is_dir = self.nodes.get(&current).map(|node| node.is_dir());
            match existing_is_dir {
                Some(true) => continue,
                Some(false) => return Err(VfsError::NotADirectory(current.display().to_string())),
                None => {}
            }

            let parent = self.ensure_parent(&current)?;
            let name = self.file_name(&current)?;
            self.nodes.insert(current.clone(), Node::directory(0o755));
            self.add_child(&parent, &name, &current)?;
        }

        Ok(())
    }
}
