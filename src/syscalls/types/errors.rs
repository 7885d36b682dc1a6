/*!
 * Syscall Error Types
 * Errno codes carried on the wire and the structured error surfaced to callers
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::types::CallId;

/// POSIX-style error numbers relayed from the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Errno {
    /// No such file or directory
    Enoent,
    /// Invalid argument
    Einval,
    /// Function not implemented
    Enosys,
    /// Bad file descriptor
    Ebadf,
    /// File exists
    Eexist,
    /// Is a directory
    Eisdir,
    /// Not a directory
    Enotdir,
    /// Permission denied
    Eacces,
    /// I/O error
    Eio,
    /// Too many open files
    Emfile,
}

impl Errno {
    /// Symbolic name, e.g. `ENOENT`
    pub const fn name(self) -> &'static str {
        match self {
            Errno::Enoent => "ENOENT",
            Errno::Einval => "EINVAL",
            Errno::Enosys => "ENOSYS",
            Errno::Ebadf => "EBADF",
            Errno::Eexist => "EEXIST",
            Errno::Eisdir => "EISDIR",
            Errno::Enotdir => "ENOTDIR",
            Errno::Eacces => "EACCES",
            Errno::Eio => "EIO",
            Errno::Emfile => "EMFILE",
        }
    }

    /// Human-readable description
    pub const fn description(self) -> &'static str {
        match self {
            Errno::Enoent => "no such file or directory",
            Errno::Einval => "invalid argument",
            Errno::Enosys => "not implemented",
            Errno::Ebadf => "bad file descriptor",
            Errno::Eexist => "file exists",
            Errno::Eisdir => "is a directory",
            Errno::Enotdir => "not a directory",
            Errno::Eacces => "permission denied",
            Errno::Eio => "input/output error",
            Errno::Emfile => "too many open files",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error resolved by a syscall future
///
/// `Failed` is the only variant produced by the dispatcher; the others are
/// raised on the process side of the relay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyscallError {
    /// The dispatcher reported a failure for this call
    #[error("{}", failed_message(.errno, .message))]
    Failed {
        errno: Option<Errno>,
        message: String,
    },

    /// Arguments rejected before anything was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reply did not have the shape the call expects
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Request could not be transmitted
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply arrived within the configured call timeout
    #[error("Syscall {id} timed out")]
    Timeout { id: CallId },

    /// The process run that issued the call has halted
    #[error("Process terminated before the syscall completed")]
    ProcessTerminated,
}

fn failed_message(errno: &Option<Errno>, message: &str) -> String {
    match errno {
        Some(errno) => format!("{}: {}", errno, message),
        None => message.to_string(),
    }
}

impl SyscallError {
    /// Build a dispatcher failure
    #[inline]
    pub fn failed(errno: Option<Errno>, message: impl Into<String>) -> Self {
        Self::Failed {
            errno,
            message: message.into(),
        }
    }

    /// Errno carried by a dispatcher failure
    #[inline]
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Failed { errno, .. } => *errno,
            _ => None,
        }
    }

    /// Message reported by the dispatcher, if this is a dispatcher failure
    #[inline]
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
