/*!
 * Syscall Types
 * Wire-level request/reply shapes and the errors and results built from them
 */

mod errors;
mod reply;
mod results;
mod syscall;

pub use errors::{Errno, SyscallError};
pub use reply::{ReplyError, ReplyObject, SyscallReply};
pub use results::{DirEntry, FileInfo};
pub use syscall::{IoctlRequest, OpKind, SyscallOp, SyscallRequest};

/// Syscall result for process-side callers
pub type SyscallResult<T> = Result<T, SyscallError>;
