/*!
 * Console Device
 * Terminal behind descriptors 0, 1 and 2 of every process
 */

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::core::limits::{TTY_DEFAULT_FLAGS, TTY_ECHO};

/// Console collaborator
///
/// Writes are synchronous; reads resolve when input is available. An
/// empty read means the input side is closed.
pub trait Console: Send + Sync {
    /// Write output, returning the number of bytes accepted
    fn write(&self, data: &[u8]) -> usize;

    /// Wait for up to `max` bytes of input
    fn read(&self, max: usize) -> BoxFuture<'static, Vec<u8>>;

    /// Current tty flags
    fn flags(&self) -> u32;

    fn set_flags(&self, flags: u32);
}

/// Output hook installed on a `BufferConsole`
pub type OutputMirror = Box<dyn Fn(&[u8]) + Send + Sync>;

struct ConsoleInner {
    input_tx: Mutex<Option<flume::Sender<Vec<u8>>>>,
    input_rx: flume::Receiver<Vec<u8>>,
    /// Input received but not yet consumed by a short read
    leftover: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
    mirror: Option<OutputMirror>,
    flags: AtomicU32,
}

/// In-memory console
///
/// Input is pushed by the host with `push_input`; output is captured and
/// optionally mirrored (the binary mirrors to stdout).
#[derive(Clone)]
pub struct BufferConsole {
    inner: Arc<ConsoleInner>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Console that also hands every write to `mirror`
    pub fn with_mirror(mirror: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        Self::build(Some(Box::new(mirror)))
    }

    fn build(mirror: Option<OutputMirror>) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            inner: Arc::new(ConsoleInner {
                input_tx: Mutex::new(Some(tx)),
                input_rx: rx,
                leftover: Mutex::new(VecDeque::new()),
                output: Mutex::new(Vec::new()),
                mirror,
                flags: AtomicU32::new(TTY_DEFAULT_FLAGS),
            }),
        }
    }

    /// Queue input for readers; false once input is closed
    pub fn push_input(&self, data: impl Into<Vec<u8>>) -> bool {
        match self.inner.input_tx.lock().as_ref() {
            Some(tx) => tx.send(data.into()).is_ok(),
            None => false,
        }
    }

    /// Close the input side; pending and future reads see end of input
    pub fn close_input(&self) {
        self.inner.input_tx.lock().take();
    }

    /// Snapshot of everything written so far
    pub fn output(&self) -> Vec<u8> {
        self.inner.output.lock().clone()
    }

    /// Drain captured output
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.output.lock())
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.output.lock()).into_owned()
    }
}

impl Default for BufferConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferConsole")
            .field("flags", &self.flags())
            .field("output_len", &self.inner.output.lock().len())
            .field("queued_input", &self.inner.input_rx.len())
            .finish()
    }
}

impl ConsoleInner {
    fn emit(&self, data: &[u8]) {
        self.output.lock().extend_from_slice(data);
        if let Some(mirror) = &self.mirror {
            mirror(data);
        }
    }

    fn deliver(&self, mut chunk: Vec<u8>, max: usize) -> Vec<u8> {
        if chunk.len() > max {
            let rest = chunk.split_off(max);
            self.leftover.lock().extend(rest);
        }
        if self.flags.load(Ordering::Acquire) & TTY_ECHO != 0 {
            self.emit(&chunk);
        }
        chunk
    }
}

impl Console for BufferConsole {
    fn write(&self, data: &[u8]) -> usize {
        self.inner.emit(data);
        data.len()
    }

    fn read(&self, max: usize) -> BoxFuture<'static, Vec<u8>> {
        let inner = Arc::clone(&self.inner);
        async move {
            if max == 0 {
                return Vec::new();
            }

            let buffered: Vec<u8> = {
                let mut leftover = inner.leftover.lock();
                let n = max.min(leftover.len());
                leftover.drain(..n).collect()
            };
            if !buffered.is_empty() {
                return buffered;
            }

            match inner.input_rx.recv_async().await {
                Ok(chunk) => inner.deliver(chunk, max),
                Err(_) => Vec::new(),
            }
        }
        .boxed()
    }

    fn flags(&self) -> u32 {
        self.inner.flags.load(Ordering::Acquire)
    }

    fn set_flags(&self, flags: u32) {
        self.inner.flags.store(flags, Ordering::Release);
    }
}
