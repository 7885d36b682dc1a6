/*!
 * Syscall Dispatcher
 * Orchestrator side of the relay: executes requests and builds replies
 *
 * `dispatch` always produces exactly one reply carrying the request id.
 * Callers run each request in its own task, so replies may leave in any
 * order. Filesystem work runs on the blocking pool; console reads are
 * plain async waits.
 */

mod fd;
mod handlers;

pub use fd::{Descriptor, OpenFile, ProcessFiles};

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use crate::core::limits::DEFAULT_MAX_OPEN_FILES;
use crate::core::types::{Fd, Pid};
use crate::devices::Console;
use crate::syscalls::types::{
    Errno, ReplyError, ReplyObject, SyscallOp, SyscallReply, SyscallRequest,
};
use crate::vfs::{FileSystem, VfsError};

/// Successful handler result before it is tagged with an id
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    code: i64,
    data: Option<Vec<u8>>,
    object: Option<ReplyObject>,
}

impl Outcome {
    fn code(code: i64) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    fn bytes(data: Vec<u8>) -> Self {
        Self {
            code: data.len() as i64,
            data: Some(data),
            object: None,
        }
    }

    fn object(object: ReplyObject) -> Self {
        Self {
            code: 0,
            data: None,
            object: Some(object),
        }
    }

    fn into_reply(self, id: u64) -> SyscallReply {
        SyscallReply {
            id,
            error: None,
            code: self.code,
            data: self.data,
            object: self.object,
        }
    }
}

pub(crate) type HandlerResult = Result<Outcome, ReplyError>;

impl From<VfsError> for ReplyError {
    fn from(err: VfsError) -> Self {
        ReplyError::with_errno(err.errno(), err.to_string())
    }
}

impl From<Errno> for ReplyError {
    fn from(errno: Errno) -> Self {
        ReplyError::from_errno(errno)
    }
}

/// Executes syscalls for every process against shared collaborators
pub struct SyscallDispatcher {
    fs: Arc<dyn FileSystem>,
    console: Arc<dyn Console>,
    processes: DashMap<Pid, Arc<Mutex<ProcessFiles>>, RandomState>,
    max_open_files: usize,
}

impl SyscallDispatcher {
    pub fn new(fs: Arc<dyn FileSystem>, console: Arc<dyn Console>) -> Self {
        Self {
            fs,
            console,
            processes: DashMap::with_hasher(RandomState::new()),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }

    #[must_use]
    pub fn with_max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }

    #[inline]
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    #[inline]
    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    /// Give `pid` a fresh descriptor table and working directory
    pub fn reset_process(&self, pid: Pid) {
        self.processes
            .insert(pid, Arc::new(Mutex::new(ProcessFiles::new(self.max_open_files))));
    }

    /// Drop all state held for `pid`
    pub fn release_process(&self, pid: Pid) {
        self.processes.remove(&pid);
    }

    /// Open descriptors of `pid`, stdio included
    pub fn open_count(&self, pid: Pid) -> Option<usize> {
        self.processes.get(&pid).map(|files| files.lock().open_count())
    }

    pub fn cwd(&self, pid: Pid) -> Option<PathBuf> {
        self.processes
            .get(&pid)
            .map(|files| files.lock().cwd().to_path_buf())
    }

    pub(crate) fn files(&self, pid: Pid) -> Arc<Mutex<ProcessFiles>> {
        let entry = self
            .processes
            .entry(pid)
            .or_insert_with(|| Arc::new(Mutex::new(ProcessFiles::new(self.max_open_files))));
        Arc::clone(entry.value())
    }

    /// Execute one request and build its reply
    pub async fn dispatch(&self, pid: Pid, request: SyscallRequest) -> SyscallReply {
        let SyscallRequest { id, op } = request;
        let kind = op.kind();

        let result = match op {
            SyscallOp::Open { path, flags, mode } => self.open(pid, path, flags, mode).await,
            SyscallOp::Write {
                fd,
                data,
                offset,
                length,
            } => self.write(pid, fd, data, offset, length).await,
            SyscallOp::Read { fd, length } => self.read(pid, fd, length).await,
            SyscallOp::Stat { path } => self.stat(pid, path).await,
            SyscallOp::Fstat { fd } => self.fstat(pid, fd).await,
            SyscallOp::Readdir { path } => self.readdir(pid, path).await,
            SyscallOp::Close { fd } => self.close(pid, fd),
            SyscallOp::Getwd => self.getwd(pid),
            SyscallOp::Chdir { path } => self.chdir(pid, path).await,
            SyscallOp::Ioctl { fd, request } => self.ioctl(pid, fd, request),
        };

        match result {
            Ok(outcome) => {
                let reply = outcome.into_reply(id);
                debug!(pid, id, op = %kind, code = reply.code, "Syscall completed");
                reply
            }
            Err(err) => {
                debug!(pid, id, op = %kind, errno = ?err.errno, message = %err.message, "Syscall failed");
                SyscallReply::failure(id, err)
            }
        }
    }

    /// Run filesystem work on the blocking pool with the process table locked
    pub(crate) async fn blocking<T, F>(&self, pid: Pid, work: F) -> Result<T, ReplyError>
    where
        F: FnOnce(&dyn FileSystem, &mut ProcessFiles) -> Result<T, ReplyError> + Send + 'static,
        T: Send + 'static,
    {
        let fs = Arc::clone(&self.fs);
        let files = self.files(pid);

        tokio::task::spawn_blocking(move || {
            let mut files = files.lock();
            work(fs.as_ref(), &mut *files)
        })
        .await
        .map_err(|e| {
            error!(pid, error = %e, "Filesystem task failed");
            ReplyError::with_errno(Errno::Eio, "filesystem task failed")
        })?
    }

    /// Snapshot of what `fd` refers to
    pub(crate) fn descriptor(&self, pid: Pid, fd: Fd) -> Result<Descriptor, ReplyError> {
        self.files(pid)
            .lock()
            .get(fd)
            .cloned()
            .ok_or_else(|| ReplyError::from_errno(Errno::Ebadf))
    }
}

impl std::fmt::Debug for SyscallDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscallDispatcher")
            .field("filesystem", &self.fs.name())
            .field("processes", &self.processes.len())
            .field("max_open_files", &self.max_open_files)
            .finish()
    }
}
