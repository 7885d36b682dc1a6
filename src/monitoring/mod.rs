/*!
 * Monitoring
 * Structured tracing and syscall observation
 */

mod observer;
mod tracer;

pub use observer::{SyscallObserver, SyscallRecord, SyscallRecorder};
pub use tracer::{init_tracing, SyscallSpan, SLOW_SYSCALL_THRESHOLD};
