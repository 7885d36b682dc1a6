/*!
 * Orchestrator
 * Spawns processes and wires each one to the syscall dispatcher
 *
 * Every process gets its own endpoint pair: the unit runtime owns the
 * process side, a supervisor task owns the kernel side. The orchestrator
 * keeps the handles, enforces the process limit and keeps the primary
 * process alive through its restart policy.
 */

mod builder;
mod supervisor;

pub use builder::OrchestratorBuilder;

use ahash::RandomState;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::KernelConfig;
use crate::core::id::{IdGenerator, PidGenerator};
use crate::core::limits::FIRST_PID;
use crate::core::types::{KernelResult, Pid};
use crate::ipc;
use crate::monitoring::SyscallObserver;
use crate::process::runtime::UnitRuntime;
use crate::process::{
    ProcessError, ProcessHandle, ProcessInfo, ProgramImage, ProgramLoader, RestartPolicy,
};
use crate::syscalls::client::ClientConfig;
use crate::syscalls::server::SyscallDispatcher;
use supervisor::Supervisor;

struct OrchestratorInner {
    config: KernelConfig,
    dispatcher: Arc<SyscallDispatcher>,
    loader: Arc<dyn ProgramLoader>,
    processes: DashMap<Pid, ProcessHandle, RandomState>,
    pids: PidGenerator,
    primary: Mutex<Option<Pid>>,
}

/// Process orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(crate) fn from_parts(
        config: KernelConfig,
        dispatcher: Arc<SyscallDispatcher>,
        loader: Arc<dyn ProgramLoader>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                dispatcher,
                loader,
                processes: DashMap::with_hasher(RandomState::new()),
                pids: PidGenerator::new(FIRST_PID),
                primary: Mutex::new(None),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    #[inline]
    pub fn dispatcher(&self) -> &Arc<SyscallDispatcher> {
        &self.inner.dispatcher
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Spawn a secondary process
    ///
    /// `on_syscall` sees every request/reply pair of this process once the
    /// reply has been sent. Must be called from within a Tokio runtime.
    pub fn spawn(
        &self,
        image: impl Into<ProgramImage>,
        argv: Vec<String>,
        on_syscall: Option<SyscallObserver>,
    ) -> KernelResult<ProcessHandle> {
        self.spawn_with_policy(image.into(), argv, on_syscall, RestartPolicy::Never)
    }

    /// Spawn the primary process, re-instantiated after every halt
    pub fn spawn_primary(
        &self,
        image: impl Into<ProgramImage>,
        argv: Vec<String>,
    ) -> KernelResult<ProcessHandle> {
        let mut primary = self.inner.primary.lock();
        if let Some(pid) = *primary {
            if self.inner.processes.contains_key(&pid) {
                return Err(ProcessError::SpawnFailed(format!(
                    "primary process already running as pid {}",
                    pid
                ))
                .into());
            }
        }

        let handle = self.spawn_with_policy(image.into(), argv, None, RestartPolicy::Always)?;
        *primary = Some(handle.pid());
        Ok(handle)
    }

    fn spawn_with_policy(
        &self,
        image: ProgramImage,
        argv: Vec<String>,
        observer: Option<SyscallObserver>,
        policy: RestartPolicy,
    ) -> KernelResult<ProcessHandle> {
        let config = &self.inner.config;
        let current = self.inner.processes.len();
        if current >= config.max_processes {
            return Err(ProcessError::LimitReached {
                current,
                limit: config.max_processes,
            }
            .into());
        }

        let pid = self.inner.pids.next();
        let (kernel_end, process_end) = ipc::channel(config.wire_format);
        self.inner.dispatcher.reset_process(pid);

        let handle = ProcessHandle::new(
            pid,
            argv,
            image,
            policy,
            kernel_end.sender(),
            Arc::clone(&self.inner.dispatcher),
            config.teardown_timeout,
        );

        let unit = UnitRuntime::new(
            pid,
            process_end,
            Arc::clone(&self.inner.loader),
            ClientConfig::from(config),
        );
        let supervisor = Supervisor {
            handle: handle.clone(),
            endpoint: kernel_end,
            dispatcher: Arc::clone(&self.inner.dispatcher),
            observer,
            restart_delay: config.restart_delay,
        };
        handle.attach_tasks(tokio::spawn(unit.run()), tokio::spawn(supervisor.run()));

        self.inner.processes.insert(pid, handle.clone());
        info!(
            pid,
            name = handle.name(),
            image_len = handle.image().len(),
            ?policy,
            "Process spawned"
        );

        if let Err(e) = handle.instantiate() {
            self.inner.processes.remove(&pid);
            self.inner.dispatcher.release_process(pid);
            return Err(e.into());
        }
        Ok(handle)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, pid: Pid) -> Option<ProcessHandle> {
        self.inner.processes.get(&pid).map(|h| h.value().clone())
    }

    /// The primary process, if one is alive
    pub fn primary(&self) -> Option<ProcessHandle> {
        let pid = (*self.inner.primary.lock())?;
        self.get(pid)
    }

    /// Snapshots of every live process, ordered by pid
    pub fn processes(&self) -> Vec<ProcessInfo> {
        let mut infos: Vec<ProcessInfo> = self
            .inner
            .processes
            .iter()
            .map(|entry| entry.value().info())
            .collect();
        infos.sort_by_key(|info| info.pid);
        infos
    }

    pub fn len(&self) -> usize {
        self.inner.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.processes.is_empty()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Tear down one process and forget it
    pub async fn teardown(&self, pid: Pid) -> KernelResult<()> {
        let handle = self.get(pid).ok_or(ProcessError::NotFound(pid))?;
        let result = handle.teardown().await;
        self.inner.processes.remove(&pid);
        result.map_err(Into::into)
    }

    /// Tear down every process
    pub async fn shutdown(&self) {
        let handles: Vec<ProcessHandle> = self
            .inner
            .processes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        info!(processes = handles.len(), "Shutting down orchestrator");

        let results = join_all(handles.iter().map(|handle| handle.teardown())).await;
        for (handle, result) in handles.iter().zip(results) {
            if let Err(e) = result {
                warn!(pid = handle.pid(), error = %e, "Teardown failed");
            }
            self.inner.processes.remove(&handle.pid());
        }
        *self.inner.primary.lock() = None;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("processes", &self.inner.processes.len())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}
