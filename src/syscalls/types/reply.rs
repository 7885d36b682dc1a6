/*!
 * Syscall Reply Types
 * Replies the dispatcher sends back, correlated by request id
 */

use serde::{Deserialize, Serialize};

use super::errors::{Errno, SyscallError};
use super::results::{DirEntry, FileInfo};
use crate::core::types::CallId;

/// Reply to exactly one request
///
/// A reply is a failure iff `error` is present; `code` is the
/// operation result (bytes transferred, new fd, ...) on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallReply {
    pub id: CallId,
    pub error: Option<ReplyError>,
    pub code: i64,
    pub data: Option<Vec<u8>>,
    pub object: Option<ReplyObject>,
}

impl SyscallReply {
    /// Successful reply carrying only a result code
    #[inline]
    #[must_use]
    pub fn success(id: CallId, code: i64) -> Self {
        Self {
            id,
            error: None,
            code,
            data: None,
            object: None,
        }
    }

    /// Failed reply
    #[inline]
    #[must_use]
    pub fn failure(id: CallId, error: ReplyError) -> Self {
        Self {
            id,
            error: Some(error),
            code: 0,
            data: None,
            object: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_object(mut self, object: ReplyObject) -> Self {
        self.object = Some(object);
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Error part of a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub errno: Option<Errno>,
    pub message: String,
}

impl ReplyError {
    /// Error with only a message
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            errno: None,
            message: message.into(),
        }
    }

    /// Error with an errno and a message giving context
    #[inline]
    pub fn with_errno(errno: Errno, message: impl Into<String>) -> Self {
        Self {
            errno: Some(errno),
            message: message.into(),
        }
    }

    /// Error with an errno and its stock description
    #[inline]
    pub fn from_errno(errno: Errno) -> Self {
        Self::with_errno(errno, errno.description())
    }
}

impl From<ReplyError> for SyscallError {
    fn from(err: ReplyError) -> Self {
        SyscallError::Failed {
            errno: err.errno,
            message: err.message,
        }
    }
}

/// Structured payload of a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyObject {
    FileInfo(FileInfo),
    Entries(Vec<DirEntry>),
}
