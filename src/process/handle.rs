/*!
 * Process Handle
 * Orchestrator-side record of one spawned process
 *
 * The handle owns the sending half of the process transport and the
 * lifecycle state machine. Lifecycle changes are published on a watch
 * channel so callers can await them.
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lifecycle::Lifecycle;
use super::program::ProgramImage;
use super::types::{ExitStatus, ProcessError, ProcessInfo, ProcessResult, ProcessState, RestartPolicy};
use crate::core::types::{Generation, Pid};
use crate::ipc::{FrameSender, InitCommand, ToProcess};
use crate::syscalls::server::SyscallDispatcher;

/// Published lifecycle position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub state: ProcessState,
    pub generation: Generation,
}

struct HandleInner {
    pid: Pid,
    argv: Vec<String>,
    image: ProgramImage,
    policy: RestartPolicy,
    lifecycle: Mutex<Lifecycle>,
    status_tx: watch::Sender<LifecycleSnapshot>,
    to_process: FrameSender<ToProcess>,
    dispatcher: Arc<SyscallDispatcher>,
    teardown_timeout: Duration,
    tearing_down: AtomicBool,
    unit: Mutex<Option<JoinHandle<()>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a spawned process; clones refer to the same process
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

impl ProcessHandle {
    pub(crate) fn new(
        pid: Pid,
        argv: Vec<String>,
        image: ProgramImage,
        policy: RestartPolicy,
        to_process: FrameSender<ToProcess>,
        dispatcher: Arc<SyscallDispatcher>,
        teardown_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(LifecycleSnapshot {
            state: ProcessState::Created,
            generation: 0,
        });

        Self {
            inner: Arc::new(HandleInner {
                pid,
                argv,
                image,
                policy,
                lifecycle: Mutex::new(Lifecycle::new()),
                status_tx,
                to_process,
                dispatcher,
                teardown_timeout,
                tearing_down: AtomicBool::new(false),
                unit: Mutex::new(None),
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn attach_tasks(&self, unit: JoinHandle<()>, supervisor: JoinHandle<()>) {
        *self.inner.unit.lock() = Some(unit);
        *self.inner.supervisor.lock() = Some(supervisor);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.inner.pid
    }

    #[inline]
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.inner.argv
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.argv.first().map(String::as_str).unwrap_or("")
    }

    #[inline]
    #[must_use]
    pub fn image(&self) -> &ProgramImage {
        &self.inner.image
    }

    #[inline]
    #[must_use]
    pub fn restart_policy(&self) -> RestartPolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.inner.lifecycle.lock().state()
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.inner.lifecycle.lock().generation()
    }

    #[must_use]
    pub fn last_exit(&self) -> Option<ExitStatus> {
        self.inner.lifecycle.lock().last_exit().cloned()
    }

    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        let lifecycle = self.inner.lifecycle.lock();
        ProcessInfo {
            pid: self.inner.pid,
            name: self.name().to_string(),
            argv: self.inner.argv.clone(),
            state: lifecycle.state(),
            generation: lifecycle.generation(),
            last_exit: lifecycle.last_exit().cloned(),
        }
    }

    /// Watch lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.inner.status_tx.subscribe()
    }

    // ========================================================================
    // Waiting
    // ========================================================================

    /// Wait until the process is in `state`
    ///
    /// Fails if the process is torn down first (unless that is the target).
    pub async fn wait_for(&self, state: ProcessState) -> ProcessResult<()> {
        self.wait_until(|snap| snap.state == state, state).await
    }

    /// Wait until the process is in `state` at `generation` or later
    pub async fn wait_for_generation(
        &self,
        state: ProcessState,
        generation: Generation,
    ) -> ProcessResult<()> {
        self.wait_until(
            |snap| snap.state == state && snap.generation >= generation,
            state,
        )
        .await
    }

    async fn wait_until<F>(&self, mut done: F, target: ProcessState) -> ProcessResult<()>
    where
        F: FnMut(&LifecycleSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snap = rx
            .wait_for(|snap| done(snap) || snap.state.is_terminal())
            .await
            .map(|snap| *snap)
            .map_err(|_| ProcessError::NotFound(self.inner.pid))?;

        if snap.state == target {
            Ok(())
        } else {
            Err(ProcessError::InvalidStateTransition {
                from: snap.state,
                to: target,
            })
        }
    }

    // ========================================================================
    // Lifecycle control
    // ========================================================================

    fn publish(&self, lifecycle: &Lifecycle) {
        self.inner.status_tx.send_replace(LifecycleSnapshot {
            state: lifecycle.state(),
            generation: lifecycle.generation(),
        });
    }

    /// Enter `Instantiating` and send `init` to the unit
    pub(crate) fn instantiate(&self) -> ProcessResult<Generation> {
        let mut lifecycle = self.inner.lifecycle.lock();
        self.instantiate_locked(&mut lifecycle)
    }

    fn instantiate_locked(&self, lifecycle: &mut Lifecycle) -> ProcessResult<Generation> {
        let generation = lifecycle.begin_instantiation()?;
        self.publish(lifecycle);

        self.inner
            .to_process
            .send(&ToProcess::Init(InitCommand {
                argv: self.inner.argv.clone(),
                program_image: self.inner.image.as_bytes().to_vec(),
                generation,
            }))
            .map_err(|e| ProcessError::Transport(e.to_string()))?;

        debug!(pid = self.inner.pid, generation, "Sent init");
        Ok(generation)
    }

    /// Apply a `started` event
    pub(crate) fn on_started(&self, generation: Generation) {
        let mut lifecycle = self.inner.lifecycle.lock();
        match lifecycle.mark_running(generation) {
            Ok(true) => {
                self.publish(&lifecycle);
                info!(pid = self.inner.pid, generation, "Process running");
            }
            Ok(false) => debug!(pid = self.inner.pid, generation, "Ignoring stale started event"),
            Err(e) => warn!(pid = self.inner.pid, generation, error = %e, "Unexpected started event"),
        }
    }

    /// Apply a `halted` event; true when it changed the state
    pub(crate) fn on_halted(&self, generation: Generation, status: ExitStatus) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        match lifecycle.mark_halted(generation, status) {
            Ok(true) => {
                self.publish(&lifecycle);
                true
            }
            Ok(false) => {
                debug!(pid = self.inner.pid, generation, "Ignoring stale halted event");
                false
            }
            Err(e) => {
                warn!(pid = self.inner.pid, generation, error = %e, "Unexpected halted event");
                false
            }
        }
    }

    #[inline]
    pub(crate) fn is_tearing_down(&self) -> bool {
        self.inner.tearing_down.load(Ordering::Acquire)
    }

    /// Re-instantiate the same image into a fresh instance
    ///
    /// Only valid from `Halted`. The descriptor table and working
    /// directory are reset; the endpoint is reused.
    pub fn restart(&self) -> ProcessResult<Generation> {
        let mut lifecycle = self.inner.lifecycle.lock();
        let state = lifecycle.state();
        if state != ProcessState::Halted || self.is_tearing_down() {
            return Err(ProcessError::InvalidStateTransition {
                from: state,
                to: ProcessState::Instantiating,
            });
        }

        self.inner.dispatcher.reset_process(self.inner.pid);
        let generation = self.instantiate_locked(&mut lifecycle)?;
        drop(lifecycle);

        info!(pid = self.inner.pid, generation, "Process restarted");
        Ok(generation)
    }

    /// Stop the process and release its endpoint
    ///
    /// A running unit is asked to shut down and given the teardown grace
    /// period before it is aborted. Idempotent.
    pub async fn teardown(&self) -> ProcessResult<()> {
        let pid = self.inner.pid;

        // The flag flips under the lifecycle lock so a pending restart
        // either lands before it or not at all
        let active = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if self.inner.tearing_down.swap(true, Ordering::AcqRel) {
                None
            } else if lifecycle.state().is_active() {
                Some(true)
            } else {
                lifecycle.tear_down()?;
                self.publish(&lifecycle);
                Some(false)
            }
        };
        let Some(active) = active else {
            return self.wait_for(ProcessState::TornDown).await;
        };

        if active {
            // Failing to send means the unit is already gone
            let _ = self.inner.to_process.send(&ToProcess::Shutdown);

            let halted = tokio::time::timeout(
                self.inner.teardown_timeout,
                self.wait_for(ProcessState::Halted),
            )
            .await;

            if !matches!(halted, Ok(Ok(()))) {
                warn!(pid, "Unit did not stop in time, aborting");
                if let Some(unit) = self.inner.unit.lock().take() {
                    unit.abort();
                }
                let generation = self.generation();
                self.on_halted(generation, ExitStatus::Killed);
            }

            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.tear_down()?;
            self.publish(&lifecycle);
        }

        // An idle unit is still waiting for init
        let _ = self.inner.to_process.send(&ToProcess::Shutdown);
        self.join_tasks().await;
        self.inner.dispatcher.release_process(pid);

        info!(pid, "Process torn down");
        Ok(())
    }

    async fn join_tasks(&self) {
        let timeout = self.inner.teardown_timeout;
        let unit = self.inner.unit.lock().take();
        let supervisor = self.inner.supervisor.lock().take();

        for task in [unit, supervisor].into_iter().flatten() {
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                abort.abort();
            }
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.inner.pid)
            .field("argv", &self.inner.argv)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}
