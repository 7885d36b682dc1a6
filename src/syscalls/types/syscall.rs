/*!
 * Syscall Request Types
 * Requests a process sends across its endpoint
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::{CallId, Fd};

/// A syscall request, immutable once sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallRequest {
    pub id: CallId,
    pub op: SyscallOp,
}

impl SyscallRequest {
    #[inline]
    #[must_use]
    pub fn new(id: CallId, op: SyscallOp) -> Self {
        Self { id, op }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }
}

/// Operation plus its operation-specific fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyscallOp {
    Open {
        path: String,
        flags: u32,
        mode: u32,
    },
    /// Writes `data[offset..offset + length]`
    Write {
        fd: Fd,
        data: Vec<u8>,
        offset: u64,
        length: u64,
    },
    /// Reads up to `length` bytes; the data comes back in the reply
    Read {
        fd: Fd,
        length: u64,
    },
    Stat {
        path: String,
    },
    Fstat {
        fd: Fd,
    },
    Readdir {
        path: String,
    },
    Close {
        fd: Fd,
    },
    Getwd,
    Chdir {
        path: String,
    },
    Ioctl {
        fd: Fd,
        request: IoctlRequest,
    },
}

impl SyscallOp {
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            SyscallOp::Open { .. } => OpKind::Open,
            SyscallOp::Write { .. } => OpKind::Write,
            SyscallOp::Read { .. } => OpKind::Read,
            SyscallOp::Stat { .. } => OpKind::Stat,
            SyscallOp::Fstat { .. } => OpKind::Fstat,
            SyscallOp::Readdir { .. } => OpKind::Readdir,
            SyscallOp::Close { .. } => OpKind::Close,
            SyscallOp::Getwd => OpKind::Getwd,
            SyscallOp::Chdir { .. } => OpKind::Chdir,
            SyscallOp::Ioctl { .. } => OpKind::Ioctl,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Terminal control requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoctlRequest {
    GetFlags,
    SetFlags(u32),
    /// Any request the dispatcher does not know; answered with ENOSYS
    Other(String),
}

/// Payload-free operation tag, kept with each pending call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Open,
    Write,
    Read,
    Stat,
    Fstat,
    Readdir,
    Close,
    Getwd,
    Chdir,
    Ioctl,
}

impl OpKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Open => "open",
            OpKind::Write => "write",
            OpKind::Read => "read",
            OpKind::Stat => "stat",
            OpKind::Fstat => "fstat",
            OpKind::Readdir => "readdir",
            OpKind::Close => "close",
            OpKind::Getwd => "getwd",
            OpKind::Chdir => "chdir",
            OpKind::Ioctl => "ioctl",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
