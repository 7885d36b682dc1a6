/*!
 * Process Types
 * Common types for process management
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::types::{Generation, Pid};

/// Process operation result
///
/// # Must Use
/// Process operations can fail and must be handled to prevent resource leaks
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ProcessError {
    #[error("Process not found: {0}")]
    #[diagnostic(code(process::not_found), help("The pid may have been torn down already."))]
    NotFound(Pid),

    #[error("Process limit exceeded: current {current}, limit {limit}")]
    #[diagnostic(
        code(process::limit_reached),
        help("Tear down idle processes or raise KERNEL_MAX_PROCESSES.")
    )]
    LimitReached { current: usize, limit: usize },

    #[error("Invalid state transition: {from} -> {to}")]
    #[diagnostic(code(process::invalid_transition))]
    InvalidStateTransition { from: ProcessState, to: ProcessState },

    #[error("Spawn failed: {0}")]
    #[diagnostic(code(process::spawn_failed))]
    SpawnFailed(String),

    #[error("Process endpoint closed: {0}")]
    #[diagnostic(
        code(process::transport),
        help("The isolated unit stopped receiving frames.")
    )]
    Transport(String),
}

/// Lifecycle state of a process
///
/// ```text
/// Created -> Instantiating -> Running -> Halted -> TornDown
///                  |                       |
///                  +-------> Halted        +-> Instantiating (restart)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Handle exists, nothing instantiated yet
    Created,
    /// `init` sent, waiting for the unit to start the program
    Instantiating,
    /// Program is executing
    Running,
    /// Program finished or failed to instantiate
    Halted,
    /// Endpoint released; terminal
    TornDown,
}

impl ProcessState {
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProcessState::Created => "created",
            ProcessState::Instantiating => "instantiating",
            ProcessState::Running => "running",
            ProcessState::Halted => "halted",
            ProcessState::TornDown => "torn_down",
        }
    }

    /// A unit is (or may be) executing program code
    #[inline(always)]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, ProcessState::Instantiating | ProcessState::Running)
    }

    #[inline(always)]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ProcessState::TornDown)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Program returned normally
    Exited,
    /// Program returned an error or panicked
    Failed(String),
    /// The image could not be turned into a program
    InstantiationFailed(String),
    /// Stopped by a shutdown command
    Shutdown,
    /// Aborted after the teardown grace period
    Killed,
}

impl ExitStatus {
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Exited)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited => f.write_str("exited"),
            ExitStatus::Failed(reason) => write!(f, "failed: {}", reason),
            ExitStatus::InstantiationFailed(reason) => write!(f, "instantiation failed: {}", reason),
            ExitStatus::Shutdown => f.write_str("shutdown"),
            ExitStatus::Killed => f.write_str("killed"),
        }
    }
}

/// Whether the orchestrator re-instantiates a process after it halts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    #[default]
    Never,
    /// Restart after every halt except a failed instantiation
    Always,
}

/// Snapshot of a process for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub argv: Vec<String>,
    pub state: ProcessState,
    pub generation: Generation,
    pub last_exit: Option<ExitStatus>,
}

impl ProcessInfo {
    #[inline(always)]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }
}
