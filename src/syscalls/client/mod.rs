/*!
 * Syscall Client
 * Blocking-looking syscalls for program code, relayed over the process endpoint
 *
 * Each call allocates an id, parks a oneshot in the pending table and sends
 * the request. The runtime loop feeds every inbound reply to `complete`,
 * which wakes exactly the call with that id, in whatever order replies
 * arrive. Many calls may be in flight at once.
 */

mod pending;

pub use pending::{Completion, Delivery, Destination, PendingCall, PendingTable};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use crate::core::config::KernelConfig;
use crate::core::id::{CallIdGenerator, IdGenerator};
use crate::core::types::{CallId, Fd, Pid};
use crate::ipc::{FrameSender, ToKernel};
use crate::syscalls::types::{
    DirEntry, FileInfo, IoctlRequest, ReplyObject, SyscallError, SyscallOp, SyscallReply,
    SyscallRequest, SyscallResult,
};

/// Client-side knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// None waits for a reply forever
    pub call_timeout: Option<Duration>,
}

impl ClientConfig {
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

impl From<&KernelConfig> for ClientConfig {
    fn from(config: &KernelConfig) -> Self {
        Self {
            call_timeout: config.call_timeout,
        }
    }
}

struct ClientInner {
    pid: Pid,
    ids: CallIdGenerator,
    pending: PendingTable,
    sender: FrameSender<ToKernel>,
    config: ClientConfig,
}

/// Syscall client of one process run
///
/// Clones share the pending table. A restarted process gets a new client
/// (fresh table) but keeps drawing ids from the endpoint's generator, so a
/// reply addressed to the previous run never matches a new call.
#[derive(Clone)]
pub struct SyscallClient {
    inner: Arc<ClientInner>,
}

impl SyscallClient {
    pub fn new(
        pid: Pid,
        ids: CallIdGenerator,
        sender: FrameSender<ToKernel>,
        config: ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                pid,
                ids,
                pending: PendingTable::new(),
                sender,
                config,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.inner.pid
    }

    /// Calls issued and not yet resolved
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Most recently allocated call id (0 before the first call)
    #[inline]
    #[must_use]
    pub fn last_id(&self) -> CallId {
        self.inner.ids.last()
    }

    /// Deliver a reply; false when no pending call has its id
    pub fn complete(&self, reply: SyscallReply) -> bool {
        self.inner.pending.complete(reply)
    }

    /// Fail every outstanding call (the run is over)
    pub fn fail_all(&self, error: SyscallError) -> usize {
        self.inner.pending.fail_all(error)
    }

    // ========================================================================
    // Core relay
    // ========================================================================

    async fn call(&self, op: SyscallOp) -> SyscallResult<SyscallReply> {
        self.exchange(op, None).await.map(|delivery| delivery.reply)
    }

    async fn exchange(&self, op: SyscallOp, destination: Option<Destination>) -> SyscallResult<Delivery> {
        let id = self.inner.ids.next();
        let kind = op.kind();
        let (tx, rx) = oneshot::channel();

        self.inner.pending.insert(PendingCall {
            id,
            kind,
            completion: tx,
            destination,
        });
        debug!(pid = self.inner.pid, id, op = %kind, "Issuing syscall");

        if let Err(e) = self
            .inner
            .sender
            .send(&ToKernel::Syscall(SyscallRequest::new(id, op)))
        {
            self.inner.pending.remove(id);
            return Err(SyscallError::Transport(e.to_string()));
        }

        let completion = match self.inner.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(completion) => completion,
                Err(_) => {
                    self.inner.pending.remove(id);
                    debug!(pid = self.inner.pid, id, op = %kind, "Syscall timed out");
                    return Err(SyscallError::Timeout { id });
                }
            },
            None => rx.await,
        };

        // A dropped sender means the table went away with the run
        let mut delivery = completion.map_err(|_| SyscallError::ProcessTerminated)??;
        match delivery.reply.error.take() {
            Some(error) => Err(error.into()),
            None => Ok(delivery),
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Open a file, returning its descriptor
    pub async fn open(&self, path: impl Into<String>, flags: u32, mode: u32) -> SyscallResult<Fd> {
        let reply = self
            .call(
                SyscallOp::Open {
                    path: path.into(),
                    flags,
                    mode,
                },
            )
            .await?;
        Fd::try_from(reply.code)
            .map_err(|_| SyscallError::Protocol(format!("invalid descriptor {}", reply.code)))
    }

    /// Write `buf[offset..offset + length]` to `fd`
    pub async fn write(&self, fd: Fd, buf: &[u8], offset: usize, length: usize) -> SyscallResult<usize> {
        let reply = self
            .call(
                SyscallOp::Write {
                    fd,
                    data: buf.to_vec(),
                    offset: offset as u64,
                    length: length as u64,
                },
            )
            .await?;
        byte_count(&reply)
    }

    /// Read up to `length` bytes from `fd` into `buf[offset..]`
    pub async fn read(&self, fd: Fd, buf: &mut [u8], offset: usize, length: usize) -> SyscallResult<usize> {
        match offset.checked_add(length) {
            Some(end) if end <= buf.len() => {}
            _ => {
                return Err(SyscallError::InvalidArgument(format!(
                    "offset {} + length {} exceeds buffer of {} bytes",
                    offset,
                    length,
                    buf.len()
                )))
            }
        }

        let Delivery { reply, destination } = self
            .exchange(
                SyscallOp::Read {
                    fd,
                    length: length as u64,
                },
                Some(Destination {
                    offset,
                    capacity: length,
                }),
            )
            .await?;

        let code = byte_count(&reply)?;
        let data = match reply.data {
            Some(data) if data.len() == code => data,
            Some(data) => {
                return Err(SyscallError::Protocol(format!(
                    "read reply claims {} bytes but carries {}",
                    code,
                    data.len()
                )))
            }
            None if code == 0 => Vec::new(),
            None => {
                return Err(SyscallError::Protocol(format!(
                    "read reply claims {} bytes but carries no data",
                    code
                )))
            }
        };

        let destination = destination.ok_or_else(|| {
            SyscallError::Protocol("read completed without a destination".to_string())
        })?;
        Ok(destination.place(&data, buf))
    }

    pub async fn stat(&self, path: impl Into<String>) -> SyscallResult<FileInfo> {
        let reply = self.call(SyscallOp::Stat { path: path.into() }).await?;
        file_info(reply)
    }

    pub async fn fstat(&self, fd: Fd) -> SyscallResult<FileInfo> {
        let reply = self.call(SyscallOp::Fstat { fd }).await?;
        file_info(reply)
    }

    /// List a directory, sorted by name
    pub async fn readdir(&self, path: impl Into<String>) -> SyscallResult<Vec<DirEntry>> {
        let reply = self.call(SyscallOp::Readdir { path: path.into() }).await?;
        match reply.object {
            Some(ReplyObject::Entries(entries)) => Ok(entries),
            _ => Err(SyscallError::Protocol(
                "readdir reply carries no entries".to_string(),
            )),
        }
    }

    pub async fn close(&self, fd: Fd) -> SyscallResult<()> {
        self.call(SyscallOp::Close { fd }).await.map(|_| ())
    }

    /// Current working directory
    pub async fn getwd(&self) -> SyscallResult<String> {
        let reply = self.call(SyscallOp::Getwd).await?;
        utf8_data(reply)
    }

    /// Change directory, returning the new working directory
    pub async fn chdir(&self, path: impl Into<String>) -> SyscallResult<String> {
        let reply = self.call(SyscallOp::Chdir { path: path.into() }).await?;
        utf8_data(reply)
    }

    /// Raw ioctl; returns the reply code
    pub async fn ioctl(&self, fd: Fd, request: IoctlRequest) -> SyscallResult<i64> {
        let reply = self.call(SyscallOp::Ioctl { fd, request }).await?;
        Ok(reply.code)
    }

    /// Terminal flags of a console descriptor
    pub async fn get_flags(&self, fd: Fd) -> SyscallResult<u32> {
        let code = self.ioctl(fd, IoctlRequest::GetFlags).await?;
        u32::try_from(code).map_err(|_| SyscallError::Protocol(format!("invalid tty flags {}", code)))
    }

    pub async fn set_flags(&self, fd: Fd, flags: u32) -> SyscallResult<()> {
        self.ioctl(fd, IoctlRequest::SetFlags(flags)).await.map(|_| ())
    }
}

impl std::fmt::Debug for SyscallClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscallClient")
            .field("pid", &self.inner.pid)
            .field("pending", &self.inner.pending.len())
            .field("last_id", &self.inner.ids.last())
            .finish()
    }
}

fn byte_count(reply: &SyscallReply) -> SyscallResult<usize> {
    usize::try_from(reply.code)
        .map_err(|_| SyscallError::Protocol(format!("negative byte count {}", reply.code)))
}

fn file_info(reply: SyscallReply) -> SyscallResult<FileInfo> {
    match reply.object {
        Some(ReplyObject::FileInfo(info)) => Ok(info),
        _ => Err(SyscallError::Protocol(
            "stat reply carries no file info".to_string(),
        )),
    }
}

fn utf8_data(reply: SyscallReply) -> SyscallResult<String> {
    String::from_utf8(reply.data.unwrap_or_default())
        .map_err(|e| SyscallError::Protocol(format!("path is not UTF-8: {}", e)))
}
