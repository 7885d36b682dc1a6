/*!
 * Syscall Handlers
 * One handler per operation; each yields an outcome or a reply error
 */

use std::path::Path;

use super::fd::{Descriptor, OpenFile};
use super::{HandlerResult, Outcome, SyscallDispatcher};
use crate::core::limits::{
    MODE_CHAR_DEVICE, MODE_DEVICE, MODE_PERM, O_ACCMODE, O_CREAT, O_EXCL, O_RDONLY, O_TRUNC,
};
use crate::core::types::{Fd, Pid};
use crate::syscalls::types::{
    DirEntry, Errno, FileInfo, IoctlRequest, ReplyError, ReplyObject,
};
use crate::vfs::{FileSystem, VfsError};

/// Mode reported for the console device
const CONSOLE_MODE: u32 = MODE_DEVICE | MODE_CHAR_DEVICE | 0o620;

impl SyscallDispatcher {
    pub(super) async fn open(&self, pid: Pid, path: String, flags: u32, mode: u32) -> HandlerResult {
        self.blocking(pid, move |fs, files| {
            let path = files.resolve(&path);
            let exists = fs.exists(&path);

            if flags & O_CREAT != 0 {
                if exists && flags & O_EXCL != 0 {
                    return Err(VfsError::AlreadyExists(path.display().to_string()).into());
                }
                if !exists {
                    fs.create(&path, mode & MODE_PERM)?;
                }
            }

            let meta = fs.metadata(&path)?;
            let write_access = flags & O_ACCMODE != O_RDONLY;
            if meta.is_dir() && write_access {
                return Err(VfsError::IsADirectory(path.display().to_string()).into());
            }
            if flags & O_TRUNC != 0 && write_access {
                fs.truncate(&path, 0)?;
            }

            let fd = files.allocate(OpenFile::new(path, flags))?;
            Ok(Outcome::code(i64::from(fd)))
        })
        .await
    }

    pub(super) async fn write(
        &self,
        pid: Pid,
        fd: Fd,
        data: Vec<u8>,
        offset: u64,
        length: u64,
    ) -> HandlerResult {
        let (start, end) = match offset.checked_add(length) {
            Some(end) if end <= data.len() as u64 => (offset as usize, end as usize),
            _ => {
                return Err(ReplyError::with_errno(
                    Errno::Einval,
                    format!(
                        "offset {} + length {} exceeds {} bytes of data",
                        offset,
                        length,
                        data.len()
                    ),
                ))
            }
        };

        match self.descriptor(pid, fd)? {
            Descriptor::Console => {
                let written = self.console.write(&data[start..end]);
                Ok(Outcome::code(written as i64))
            }
            Descriptor::File(_) => {
                self.blocking(pid, move |fs, files| {
                    let file = files.file_mut(fd)?;
                    if !file.writable() {
                        return Err(ReplyError::with_errno(Errno::Ebadf, "descriptor not open for writing"));
                    }

                    let position = if file.append() {
                        fs.metadata(&file.path)?.size
                    } else {
                        file.position
                    };
                    let written = fs.write_at(&file.path, position, &data[start..end])?;
                    file.position = position + written as u64;
                    Ok(Outcome::code(written as i64))
                })
                .await
            }
        }
    }

    pub(super) async fn read(&self, pid: Pid, fd: Fd, length: u64) -> HandlerResult {
        let length = usize::try_from(length).unwrap_or(usize::MAX);

        match self.descriptor(pid, fd)? {
            Descriptor::Console => {
                let data = self.console.read(length).await;
                Ok(Outcome::bytes(data))
            }
            Descriptor::File(_) => {
                self.blocking(pid, move |fs, files| {
                    let file = files.file_mut(fd)?;
                    if !file.readable() {
                        return Err(ReplyError::with_errno(Errno::Ebadf, "descriptor not open for reading"));
                    }

                    let data = fs.read_at(&file.path, file.position, length)?;
                    file.position += data.len() as u64;
                    Ok(Outcome::bytes(data))
                })
                .await
            }
        }
    }

    pub(super) async fn stat(&self, pid: Pid, path: String) -> HandlerResult {
        self.blocking(pid, move |fs, files| {
            let path = files.resolve(&path);
            let info = file_info(fs, &path)?;
            Ok(Outcome::object(ReplyObject::FileInfo(info)))
        })
        .await
    }

    pub(super) async fn fstat(&self, pid: Pid, fd: Fd) -> HandlerResult {
        match self.descriptor(pid, fd)? {
            Descriptor::Console => Ok(Outcome::object(ReplyObject::FileInfo(FileInfo::new(
                "console",
                CONSOLE_MODE,
                0,
            )))),
            Descriptor::File(file) => {
                self.blocking(pid, move |fs, _| {
                    let info = file_info(fs, &file.path)?;
                    Ok(Outcome::object(ReplyObject::FileInfo(info)))
                })
                .await
            }
        }
    }

    pub(super) async fn readdir(&self, pid: Pid, path: String) -> HandlerResult {
        self.blocking(pid, move |fs, files| {
            let path = files.resolve(&path);
            let mut entries: Vec<DirEntry> = fs.list_dir(&path)?.into_iter().map(DirEntry::from).collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(Outcome::object(ReplyObject::Entries(entries)))
        })
        .await
    }

    pub(super) fn close(&self, pid: Pid, fd: Fd) -> HandlerResult {
        self.files(pid).lock().close(fd)?;
        Ok(Outcome::code(0))
    }

    pub(super) fn getwd(&self, pid: Pid) -> HandlerResult {
        let cwd = self.files(pid).lock().cwd().to_path_buf();
        Ok(Outcome::bytes(path_bytes(&cwd)))
    }

    pub(super) async fn chdir(&self, pid: Pid, path: String) -> HandlerResult {
        self.blocking(pid, move |fs, files| {
            let path = files.resolve(&path);
            if !fs.metadata(&path)?.is_dir() {
                return Err(VfsError::NotADirectory(path.display().to_string()).into());
            }
            let data = path_bytes(&path);
            files.set_cwd(path);
            Ok(Outcome::bytes(data))
        })
        .await
    }

    pub(super) fn ioctl(&self, pid: Pid, fd: Fd, request: IoctlRequest) -> HandlerResult {
        match self.descriptor(pid, fd)? {
            Descriptor::File(_) => Err(ReplyError::with_errno(Errno::Ebadf, "not a terminal")),
            Descriptor::Console => match request {
                IoctlRequest::GetFlags => Ok(Outcome::code(i64::from(self.console.flags()))),
                IoctlRequest::SetFlags(flags) => {
                    self.console.set_flags(flags);
                    Ok(Outcome::code(0))
                }
                IoctlRequest::Other(name) => Err(ReplyError::with_errno(
                    Errno::Enosys,
                    format!("ioctl {} not implemented", name),
                )),
            },
        }
    }
}

fn file_info(fs: &dyn FileSystem, path: &Path) -> Result<FileInfo, ReplyError> {
    let meta = fs.metadata(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string());
    Ok(meta.to_file_info(name))
}

fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}
