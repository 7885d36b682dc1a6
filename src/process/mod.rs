/*!
 * Process Module
 * Process records, lifecycle and the isolated unit runtime
 */

pub mod handle;
pub mod lifecycle;
pub mod program;
pub(crate) mod runtime;
pub mod types;

// Re-export for convenience
pub use handle::{LifecycleSnapshot, ProcessHandle};
pub use lifecycle::Lifecycle;
pub use program::{
    LoadError, NativeLoader, ProcessContext, Program, ProgramError, ProgramImage, ProgramLoader,
};
pub use types::{ExitStatus, ProcessError, ProcessInfo, ProcessResult, ProcessState, RestartPolicy};
