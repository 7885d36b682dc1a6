/*!
 * Kernel Configuration
 *
 * Runtime knobs for the relay, with defaults from `core::limits` and
 * overrides from the environment.
 *
 * Environment variables:
 * - KERNEL_WIRE_FORMAT: `bincode` (default) or `json`
 * - KERNEL_SYSCALL_TIMEOUT_MS: per-call timeout, 0 or unset disables it
 * - KERNEL_RESTART_DELAY_MS: delay before the primary process restarts
 * - KERNEL_TEARDOWN_TIMEOUT_MS: grace period for a unit to stop on teardown
 * - KERNEL_MAX_PROCESSES: process table capacity
 * - KERNEL_MAX_OPEN_FILES: per-process descriptor limit
 */

use std::str::FromStr;
use std::time::Duration;

use super::errors::KernelError;
use super::limits::*;
use crate::ipc::WireFormat;

/// Relay-wide configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Encoding used for every frame crossing a process boundary
    pub wire_format: WireFormat,
    /// Per-syscall timeout enforced by clients (None = wait forever)
    pub call_timeout: Option<Duration>,
    /// Delay before an always-restart process is re-instantiated
    pub restart_delay: Duration,
    /// Grace period for a running unit to acknowledge shutdown
    pub teardown_timeout: Duration,
    /// Maximum number of live processes
    pub max_processes: usize,
    /// Maximum open descriptors per process, stdio included
    pub max_open_files: usize,
}

impl KernelConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            wire_format: WireFormat::default(),
            call_timeout: None,
            restart_delay: DEFAULT_RESTART_DELAY,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            max_processes: DEFAULT_MAX_PROCESSES,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }

    /// Defaults overridden by `KERNEL_*` environment variables
    pub fn from_env() -> Result<Self, KernelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reading from an arbitrary source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KernelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(value) = lookup("KERNEL_WIRE_FORMAT") {
            config.wire_format = WireFormat::from_str(&value)
                .map_err(|e| KernelError::Configuration(e.to_string()))?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KERNEL_SYSCALL_TIMEOUT_MS")? {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KERNEL_RESTART_DELAY_MS")? {
            config.restart_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KERNEL_TEARDOWN_TIMEOUT_MS")? {
            config.teardown_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<usize>(&lookup, "KERNEL_MAX_PROCESSES")? {
            config.max_processes = max;
        }
        if let Some(max) = parse_var::<usize>(&lookup, "KERNEL_MAX_OPEN_FILES")? {
            if max <= FIRST_FILE_FD as usize {
                return Err(KernelError::Configuration(format!(
                    "KERNEL_MAX_OPEN_FILES must leave room past stdio, got {}",
                    max
                )));
            }
            config.max_open_files = max;
        }

        Ok(config)
    }

    #[inline]
    #[must_use]
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, KernelError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| KernelError::Configuration(format!("{}={:?}: {}", key, raw, e))),
    }
}
