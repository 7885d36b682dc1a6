/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// File descriptor type
pub type Fd = u32;

/// Syscall correlation ID, unique per process endpoint
pub type CallId = u64;

/// Instantiation counter of a process (bumped on every restart)
pub type Generation = u64;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;
