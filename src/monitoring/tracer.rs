/*!
 * Structured Tracing
 * Subscriber setup and per-syscall spans
 *
 * Environment variables:
 * - RUST_LOG: log filter (default: info)
 * - KERNEL_TRACE_JSON: JSON output when `1` or `true`
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::types::{CallId, Pid};
use crate::syscalls::types::{OpKind, SyscallReply};

/// Dispatches slower than this are logged at warn level
pub const SLOW_SYSCALL_THRESHOLD: Duration = Duration::from_millis(10);

/// Initialize the global subscriber
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span around one dispatched syscall
///
/// Logs completion (or a slow-call warning) when dropped.
pub struct SyscallSpan {
    span: Span,
    start: Instant,
    pid: Pid,
    id: CallId,
    op: OpKind,
}

impl SyscallSpan {
    pub fn new(pid: Pid, id: CallId, op: OpKind) -> Self {
        let span = span!(
            Level::DEBUG,
            "syscall",
            pid,
            id,
            op = %op,
            code = tracing::field::Empty,
            errno = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            pid,
            id,
            op,
        }
    }

    #[inline]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record the outcome carried by `reply`
    pub fn record_reply(&self, reply: &SyscallReply) {
        self.span.record("code", reply.code);
        if let Some(err) = &reply.error {
            if let Some(errno) = err.errno {
                self.span.record("errno", tracing::field::display(errno));
            }
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let _entered = self.span.enter();
        if elapsed > SLOW_SYSCALL_THRESHOLD {
            warn!(
                pid = self.pid,
                id = self.id,
                op = %self.op,
                duration_ms = elapsed.as_millis() as u64,
                slow = true,
                "Slow syscall"
            );
        } else {
            debug!(
                pid = self.pid,
                id = self.id,
                op = %self.op,
                duration_us = elapsed.as_micros() as u64,
                "Syscall span closed"
            );
        }
    }
}
