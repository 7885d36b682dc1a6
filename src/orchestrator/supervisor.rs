/*!
 * Process Supervisor
 * Orchestrator-side receive loop of one process endpoint
 *
 * Each syscall request is dispatched on its own task so a slow operation
 * (console input, large file I/O) never holds up the endpoint; replies go
 * back as soon as their own operation completes.
 *
 * Dispatch tasks belong to the run that issued them. A run's requests all
 * precede its `halted` frame on the endpoint, so when that frame arrives
 * every task still in flight is cancelled and reaped before the halt is
 * applied. No handler of a finished run is alive once `Halted` is visible.
 */

use futures::future::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::ipc::{FrameSender, KernelEndpoint, ToKernel, ToProcess};
use crate::monitoring::{SyscallObserver, SyscallSpan};
use crate::process::{ExitStatus, ProcessHandle, RestartPolicy};
use crate::syscalls::server::SyscallDispatcher;
use crate::syscalls::types::{Errno, ReplyError, SyscallReply, SyscallRequest};

pub(crate) struct Supervisor {
    pub handle: ProcessHandle,
    pub endpoint: KernelEndpoint,
    pub dispatcher: Arc<SyscallDispatcher>,
    pub observer: Option<SyscallObserver>,
    pub restart_delay: Duration,
}

impl Supervisor {
    /// Run until the unit side of the endpoint is gone
    pub(crate) async fn run(self) {
        let pid = self.handle.pid();
        let mut dispatches = JoinSet::new();

        loop {
            tokio::select! {
                frame = self.endpoint.recv() => {
                    let Some(frame) = frame else { break };
                    match frame {
                        ToKernel::Syscall(request) => self.spawn_dispatch(&mut dispatches, request),
                        ToKernel::Started { generation } => self.handle.on_started(generation),
                        ToKernel::Halted { generation, status } => {
                            let cancelled = cancel_dispatches(&mut dispatches).await;
                            info!(pid, generation, status = %status, cancelled, "Process halted");
                            let restartable = should_restart(&status);
                            if self.handle.on_halted(generation, status) && restartable {
                                self.schedule_restart();
                            }
                        }
                    }
                }
                Some(joined) = dispatches.join_next(), if !dispatches.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            error!(pid, error = %e, "Dispatch task failed");
                        }
                    }
                }
            }
        }

        let cancelled = cancel_dispatches(&mut dispatches).await;
        debug!(pid, cancelled, "Supervisor finished");
    }

    fn spawn_dispatch(&self, dispatches: &mut JoinSet<()>, request: SyscallRequest) {
        let pid = self.handle.pid();
        let dispatcher = Arc::clone(&self.dispatcher);
        let replies: FrameSender<ToProcess> = self.endpoint.sender();
        let observer = self.observer.clone();

        let span = SyscallSpan::new(pid, request.id, request.op.kind());
        let instrumented = span.span().clone();

        dispatches.spawn(
            async move {
                let id = request.id;
                let reply = match AssertUnwindSafe(dispatcher.dispatch(pid, request.clone()))
                    .catch_unwind()
                    .await
                {
                    Ok(reply) => reply,
                    Err(_) => {
                        error!(pid, id, "Syscall handler panicked");
                        SyscallReply::failure(
                            id,
                            ReplyError::with_errno(Errno::Eio, "syscall handler panicked"),
                        )
                    }
                };
                span.record_reply(&reply);

                if replies.send(&ToProcess::Reply(reply.clone())).is_err() {
                    debug!(pid, id, "Process endpoint closed before reply");
                }
                if let Some(observe) = observer {
                    observe(pid, &request, &reply);
                }
                drop(span);
            }
            .instrument(instrumented),
        );
    }

    fn schedule_restart(&self) {
        if self.handle.restart_policy() != RestartPolicy::Always || self.handle.is_tearing_down() {
            return;
        }
        let handle = self.handle.clone();
        let delay = self.restart_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if handle.is_tearing_down() {
                return;
            }
            if let Err(e) = handle.restart() {
                warn!(pid = handle.pid(), error = %e, "Restart failed");
            }
        });
    }
}

/// Abort every dispatch task and wait until none is running
///
/// Returns how many tasks were still registered.
async fn cancel_dispatches(dispatches: &mut JoinSet<()>) -> usize {
    let outstanding = dispatches.len();
    dispatches.shutdown().await;
    outstanding
}

/// Halts that an always-restart process comes back from
fn should_restart(status: &ExitStatus) -> bool {
    matches!(status, ExitStatus::Exited | ExitStatus::Failed(_))
}
