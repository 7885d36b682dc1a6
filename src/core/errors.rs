/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export subsystem errors so callers only need `core::errors`
pub use crate::ipc::CodecError;
pub use crate::process::{LoadError, ProcessError};
pub use crate::syscalls::types::{Errno, SyscallError};
pub use crate::vfs::VfsError;

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Syscall error: {0}")]
    #[diagnostic(
        code(kernel::syscall_error),
        help("A relayed syscall failed. The errno and message come from the dispatcher.")
    )]
    Syscall(#[from] SyscallError),

    #[error("Filesystem error: {0}")]
    #[diagnostic(
        code(kernel::vfs_error),
        help("The backing filesystem rejected the operation.")
    )]
    Vfs(#[from] VfsError),

    #[error("Wire codec error: {0}")]
    #[diagnostic(
        code(kernel::codec_error),
        help("Both sides of a process endpoint must use the same wire format.")
    )]
    Codec(#[from] CodecError),

    #[error("Program load error: {0}")]
    #[diagnostic(
        code(kernel::load_error),
        help("The program image could not be instantiated. Check the loader registry.")
    )]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(kernel::configuration_error),
        help("Invalid configuration. Review the KERNEL_* environment variables.")
    )]
    Configuration(String),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(kernel::io_error),
        help("Host I/O failed while running the kernel.")
    )]
    Io(String),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(kernel::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(String),
}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        KernelError::Io(err.to_string())
    }
}

impl From<String> for KernelError {
    fn from(msg: String) -> Self {
        KernelError::Internal(msg)
    }
}

impl From<&str> for KernelError {
    fn from(msg: &str) -> Self {
        KernelError::Internal(msg.to_string())
    }
}

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;
