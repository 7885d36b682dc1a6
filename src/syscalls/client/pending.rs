/*!
 * Pending Call Table
 * Outstanding syscalls of one process run, keyed by correlation id
 */

use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::warn;

use crate::core::types::CallId;
use crate::syscalls::types::{OpKind, SyscallError, SyscallReply};

/// What a completed call resolves to before per-op interpretation
pub type Completion = Result<Delivery, SyscallError>;

/// Where returned bytes land in the caller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub offset: usize,
    pub capacity: usize,
}

impl Destination {
    /// Copy at most `capacity` bytes of `data` into `buf` at `offset`
    ///
    /// Returns the number of bytes copied; never writes outside `buf`.
    pub fn place(&self, data: &[u8], buf: &mut [u8]) -> usize {
        let Some(room) = buf.len().checked_sub(self.offset) else {
            return 0;
        };
        let n = data.len().min(self.capacity).min(room);
        buf[self.offset..self.offset + n].copy_from_slice(&data[..n]);
        n
    }
}

/// A reply together with the destination its call registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub reply: SyscallReply,
    pub destination: Option<Destination>,
}

/// One issued, unanswered syscall
#[derive(Debug)]
pub struct PendingCall {
    pub id: CallId,
    pub kind: OpKind,
    pub completion: oneshot::Sender<Completion>,
    pub destination: Option<Destination>,
}

/// Pending calls of a single run
///
/// Every entry is removed exactly once: by its reply, by a timeout or
/// transmission failure, or when the run halts.
#[derive(Debug, Default)]
pub struct PendingTable {
    calls: Mutex<HashMap<CallId, PendingCall, RandomState>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call; ids are unique per endpoint so this never replaces
    pub fn insert(&self, call: PendingCall) {
        let mut calls = self.calls.lock();
        if let Some(previous) = calls.insert(call.id, call) {
            warn!(id = previous.id, kind = %previous.kind, "Replaced pending call with duplicate id");
        }
    }

    /// Route a reply to the call that issued it
    ///
    /// Returns false for an unknown or already consumed id; such replies
    /// are logged and dropped.
    pub fn complete(&self, reply: SyscallReply) -> bool {
        let Some(call) = self.calls.lock().remove(&reply.id) else {
            warn!(id = reply.id, "Dropping reply with unknown call id");
            return false;
        };

        // The caller may have given up (dropped its future); that is not an error
        let _ = call.completion.send(Ok(Delivery {
            reply,
            destination: call.destination,
        }));
        true
    }

    pub fn remove(&self, id: CallId) -> Option<PendingCall> {
        self.calls.lock().remove(&id)
    }

    /// Fail every outstanding call, returning how many were failed
    pub fn fail_all(&self, error: SyscallError) -> usize {
        let drained: Vec<PendingCall> = self.calls.lock().drain().map(|(_, call)| call).collect();
        let count = drained.len();
        for call in drained {
            let _ = call.completion.send(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.calls.lock().contains_key(&id)
    }
}
