/*!
 * Syscalls Module
 * The process/kernel syscall relay
 *
 * - `types`: request/reply wire shapes, errno codes and structured results
 * - `client`: process side, turns calls into correlated requests
 * - `server`: orchestrator side, executes requests and replies
 */

pub mod client;
pub mod server;
pub mod types;

// Re-export public API
pub use client::{ClientConfig, PendingTable, SyscallClient};
pub use server::SyscallDispatcher;
pub use types::{
    DirEntry, Errno, FileInfo, IoctlRequest, OpKind, ReplyError, ReplyObject, SyscallError,
    SyscallOp, SyscallReply, SyscallRequest, SyscallResult,
};
