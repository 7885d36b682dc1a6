/*!
 * Relay Kernel Library
 * Process/syscall relay between an orchestrator and isolated compute units
 */

pub mod core;
pub mod devices;
pub mod ipc;
pub mod monitoring;
pub mod orchestrator;
pub mod process;
pub mod syscalls;
pub mod vfs;

// Re-exports
pub use crate::core::{KernelConfig, KernelError, KernelResult};
pub use devices::{BufferConsole, Console};
pub use ipc::WireFormat;
pub use monitoring::{init_tracing, SyscallObserver, SyscallRecorder};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use process::{
    ExitStatus, NativeLoader, ProcessContext, ProcessHandle, ProcessInfo, ProcessState, Program,
    ProgramError, ProgramImage, ProgramLoader, RestartPolicy,
};
pub use syscalls::{
    DirEntry, Errno, FileInfo, IoctlRequest, SyscallClient, SyscallDispatcher, SyscallError,
    SyscallResult,
};
pub use vfs::{FileSystem, MemFS};
