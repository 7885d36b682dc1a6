/*!
 * Descriptor Table
 * Per-process open files and working directory
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::limits::{
    FIRST_FILE_FD, O_ACCMODE, O_APPEND, O_RDONLY, O_RDWR, O_WRONLY, STDERR_FD, STDIN_FD, STDOUT_FD,
};
use crate::core::types::Fd;
use crate::syscalls::types::Errno;

/// An open file on the backing filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub path: PathBuf,
    pub position: u64,
    pub flags: u32,
}

impl OpenFile {
    pub fn new(path: PathBuf, flags: u32) -> Self {
        Self {
            path,
            position: 0,
            flags,
        }
    }

    #[inline]
    pub fn readable(&self) -> bool {
        matches!(self.flags & O_ACCMODE, O_RDONLY | O_RDWR)
    }

    #[inline]
    pub fn writable(&self) -> bool {
        matches!(self.flags & O_ACCMODE, O_WRONLY | O_RDWR)
    }

    #[inline]
    pub fn append(&self) -> bool {
        self.flags & O_APPEND != 0
    }
}

/// What a descriptor refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Console,
    File(OpenFile),
}

/// Descriptor table and working directory of one process
#[derive(Debug, Clone)]
pub struct ProcessFiles {
    descriptors: BTreeMap<Fd, Descriptor>,
    cwd: PathBuf,
    max_open: usize,
}

impl ProcessFiles {
    /// Fresh table: stdio bound to the console, cwd at the root
    pub fn new(max_open: usize) -> Self {
        let descriptors = [STDIN_FD, STDOUT_FD, STDERR_FD]
            .into_iter()
            .map(|fd| (fd, Descriptor::Console))
            .collect();

        Self {
            descriptors,
            cwd: PathBuf::from("/"),
            max_open,
        }
    }

    /// Bind the lowest free descriptor at or above `FIRST_FILE_FD`
    pub fn allocate(&mut self, file: OpenFile) -> Result<Fd, Errno> {
        if self.descriptors.len() >= self.max_open {
            return Err(Errno::Emfile);
        }

        let mut fd = FIRST_FILE_FD;
        for &used in self.descriptors.range(FIRST_FILE_FD..).map(|(fd, _)| fd) {
            if used != fd {
                break;
            }
            fd = fd.checked_add(1).ok_or(Errno::Emfile)?;
        }

        self.descriptors.insert(fd, Descriptor::File(file));
        Ok(fd)
    }

    #[inline]
    pub fn get(&self, fd: Fd) -> Option<&Descriptor> {
        self.descriptors.get(&fd)
    }

    /// Open file behind `fd`; EBADF for consoles and unknown fds
    pub fn file_mut(&mut self, fd: Fd) -> Result<&mut OpenFile, Errno> {
        match self.descriptors.get_mut(&fd) {
            Some(Descriptor::File(file)) => Ok(file),
            _ => Err(Errno::Ebadf),
        }
    }

    pub fn close(&mut self, fd: Fd) -> Result<Descriptor, Errno> {
        self.descriptors.remove(&fd).ok_or(Errno::Ebadf)
    }

    #[inline]
    pub fn open_count(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = cwd;
    }

    /// Absolute, cleaned path for `path` relative to the working directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        };
        PathBuf::from(path_clean::clean(&joined))
    }
}
