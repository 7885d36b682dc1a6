/*!
 * Orchestrator Builder
 * Builder pattern for Orchestrator construction
 */

use std::sync::Arc;
use tracing::info;

use super::Orchestrator;
use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::types::KernelResult;
use crate::devices::{BufferConsole, Console};
use crate::process::ProgramLoader;
use crate::syscalls::server::SyscallDispatcher;
use crate::vfs::{FileSystem, MemFS};

/// Builder for Orchestrator
pub struct OrchestratorBuilder {
    filesystem: Option<Arc<dyn FileSystem>>,
    console: Option<Arc<dyn Console>>,
    loader: Option<Arc<dyn ProgramLoader>>,
    config: KernelConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            filesystem: None,
            console: None,
            loader: None,
            config: KernelConfig::default(),
        }
    }

    /// Backing filesystem for file syscalls (default: empty MemFS)
    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.filesystem = Some(Arc::new(fs));
        self
    }

    /// Shared filesystem, for callers that keep their own reference
    pub fn with_shared_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.filesystem = Some(fs);
        self
    }

    /// Device behind fds 0/1/2 (default: BufferConsole)
    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Some(Arc::new(console));
        self
    }

    /// Loader turning program images into programs (required)
    pub fn with_loader(mut self, loader: impl ProgramLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn with_shared_loader(mut self, loader: Arc<dyn ProgramLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the Orchestrator
    pub fn build(self) -> KernelResult<Orchestrator> {
        let loader = self
            .loader
            .ok_or_else(|| KernelError::Configuration("a program loader is required".into()))?;
        if self.config.max_processes == 0 {
            return Err(KernelError::Configuration(
                "max_processes must be at least 1".into(),
            ));
        }

        let filesystem = self
            .filesystem
            .unwrap_or_else(|| Arc::new(MemFS::new()) as Arc<dyn FileSystem>);
        let console = self
            .console
            .unwrap_or_else(|| Arc::new(BufferConsole::new()) as Arc<dyn Console>);

        info!(
            filesystem = filesystem.name(),
            wire_format = %self.config.wire_format,
            max_processes = self.config.max_processes,
            max_open_files = self.config.max_open_files,
            call_timeout_ms = self.config.call_timeout.map(|t| t.as_millis() as u64),
            "Orchestrator initialized"
        );

        let dispatcher = Arc::new(
            SyscallDispatcher::new(filesystem, console).with_max_open_files(self.config.max_open_files),
        );
        Ok(Orchestrator::from_parts(self.config, dispatcher, loader))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
