/*!
 * Syscall Observation
 *
 * Hook invoked by the orchestrator after every dispatched syscall, plus a
 * recorder that keeps what it sees (tests, debugging shells).
 */

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::types::Pid;
use crate::syscalls::types::{OpKind, SyscallReply, SyscallRequest};

/// Called with the request and its reply once the reply has been sent
pub type SyscallObserver = Arc<dyn Fn(Pid, &SyscallRequest, &SyscallReply) + Send + Sync>;

/// One observed syscall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallRecord {
    pub pid: Pid,
    pub request: SyscallRequest,
    pub reply: SyscallReply,
}

impl SyscallRecord {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.request.op.kind()
    }
}

/// Collects every observed syscall in arrival order
#[derive(Debug, Clone, Default)]
pub struct SyscallRecorder {
    records: Arc<Mutex<Vec<SyscallRecord>>>,
}

impl SyscallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer feeding this recorder
    pub fn observer(&self) -> SyscallObserver {
        let records = Arc::clone(&self.records);
        Arc::new(move |pid: Pid, request: &SyscallRequest, reply: &SyscallReply| {
            records.lock().push(SyscallRecord {
                pid,
                request: request.clone(),
                reply: reply.clone(),
            });
        })
    }

    pub fn records(&self) -> Vec<SyscallRecord> {
        self.records.lock().clone()
    }

    /// Operations seen so far, in order
    pub fn kinds(&self) -> Vec<OpKind> {
        self.records.lock().iter().map(SyscallRecord::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
