/*!
 * Filesystem Node Types
 * Internal representation of files and directories
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use super::super::types::{FileType, Metadata};

/// In-memory filesystem node
#[derive(Debug, Clone)]
pub(in crate::vfs) enum Node {
    File {
        data: Vec<u8>,
        permissions: u32,
        modified: SystemTime,
    },
    Directory {
        children: HashMap<String, PathBuf>,
        permissions: u32,
        modified: SystemTime,
    },
}

impl Node {
    pub fn directory(permissions: u32) -> Self {
        Node::Directory {
            children: HashMap::default(),
            permissions,
            modified: SystemTime::now(),
        }
    }

    pub fn file(permissions: u32) -> Self {
        Node::File {
            data: Vec::new(),
            permissions,
            modified: SystemTime::now(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Node::File { .. } => FileType::File,
            Node::Directory { .. } => FileType::Directory,
        }
    }

    pub fn permissions(&self) -> u32 {
        match self {
            Node::File { permissions, .. } | Node::Directory { permissions, .. } => *permissions,
        }
    }

    pub fn metadata(&self) -> Metadata {
        match self {
            Node::File {
                data,
                permissions,
                modified,
            } => Metadata {
                file_type: FileType::File,
                size: data.len() as u64,
                permissions: *permissions,
                modified: *modified,
            },
            Node::Directory {
                children,
                permissions,
                modified,
            } => Metadata {
                file_type: FileType::Directory,
                size: children.len() as u64,
                permissions: *permissions,
                modified: *modified,
            },
        }
    }
}
