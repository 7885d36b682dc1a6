/*!
 * ID Generation
 * Monotonic ID allocation for processes and syscall correlation
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{CallId, Pid};

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    /// Generate next ID
    fn next(&self) -> T;

    /// Last ID handed out, or the value before the first one
    fn last(&self) -> T;
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Lock-free monotonic counter
///
/// IDs are never recycled. Clones share the same counter, so every clone
/// draws from one sequence.
pub struct AtomicGenerator<T> {
    counter: Arc<AtomicU64>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> AtomicGenerator<T> {
    /// Create new generator starting at given value
    #[inline]
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
            _marker: std::marker::PhantomData,
        }
    }

    /// Create new generator starting at 1
    #[inline]
    pub fn default_start() -> Self {
        Self::new(1)
    }
}

impl<T> Clone for AtomicGenerator<T> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for AtomicGenerator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicGenerator")
            .field("next", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl IdGenerator<u32> for AtomicGenerator<u32> {
    #[inline]
    fn next(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst) as u32
    }

    #[inline]
    fn last(&self) -> u32 {
        self.counter.load(Ordering::SeqCst).saturating_sub(1) as u32
    }
}

impl IdGenerator<u64> for AtomicGenerator<u64> {
    #[inline]
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    #[inline]
    fn last(&self) -> u64 {
        self.counter.load(Ordering::SeqCst).saturating_sub(1)
    }
}

// ============================================================================
// Convenience Type Aliases
// ============================================================================

/// Process ID generator (no recycling - pids are never reused)
pub type PidGenerator = AtomicGenerator<Pid>;

/// Syscall correlation ID generator, one per process endpoint
pub type CallIdGenerator = AtomicGenerator<CallId>;
