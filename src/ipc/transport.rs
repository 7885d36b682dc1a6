/*!
 * Process Transport
 * Message-passing endpoints between the orchestrator and one isolated unit
 *
 * Nothing but encoded frames crosses an endpoint: every typed message is
 * serialized with the endpoint's `WireFormat` into `Bytes` and decoded on the
 * other side. Frames that fail to decode are logged and dropped.
 */

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;
use tracing::warn;

use super::codec::{CodecError, WireFormat};
use crate::core::types::Generation;
use crate::process::ExitStatus;
use crate::syscalls::types::{SyscallReply, SyscallRequest};

// ============================================================================
// Frames
// ============================================================================

/// Frames sent from the orchestrator to a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToProcess {
    /// Instantiate the program image and run it
    Init(InitCommand),
    /// Reply to one syscall
    Reply(SyscallReply),
    /// Stop the current run and leave the receive loop
    Shutdown,
}

/// Spawn control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCommand {
    pub argv: Vec<String>,
    pub program_image: Vec<u8>,
    pub generation: Generation,
}

/// Frames sent from a process to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToKernel {
    Syscall(SyscallRequest),
    Started { generation: Generation },
    Halted { generation: Generation, status: ExitStatus },
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Endpoint closed")]
    Closed,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ============================================================================
// Endpoints
// ============================================================================

/// Sending half of an endpoint, cheap to clone
pub struct FrameSender<Out> {
    tx: flume::Sender<Bytes>,
    format: WireFormat,
    _marker: PhantomData<fn(Out)>,
}

impl<Out> Clone for FrameSender<Out> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            format: self.format,
            _marker: PhantomData,
        }
    }
}

impl<Out> std::fmt::Debug for FrameSender<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSender")
            .field("format", &self.format)
            .field("closed", &self.tx.is_disconnected())
            .finish()
    }
}

impl<Out: Serialize> FrameSender<Out> {
    /// Encode and enqueue a frame; never blocks (unbounded channel)
    pub fn send(&self, frame: &Out) -> Result<(), TransportError> {
        let bytes = self.format.encode(frame)?;
        self.tx.send(bytes).map_err(|_| TransportError::Closed)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }

    #[inline]
    pub fn format(&self) -> WireFormat {
        self.format
    }
}

/// One side of a process transport
pub struct Endpoint<Out, In> {
    sender: FrameSender<Out>,
    rx: flume::Receiver<Bytes>,
    _marker: PhantomData<fn() -> In>,
}

/// Orchestrator side
pub type KernelEndpoint = Endpoint<ToProcess, ToKernel>;

/// Isolated unit side
pub type ProcessEndpoint = Endpoint<ToKernel, ToProcess>;

impl<Out: Serialize, In: DeserializeOwned> Endpoint<Out, In> {
    #[inline]
    pub fn send(&self, frame: &Out) -> Result<(), TransportError> {
        self.sender.send(frame)
    }

    /// Receive the next decodable frame, or `None` once the peer is gone
    pub async fn recv(&self) -> Option<In> {
        loop {
            let bytes = self.rx.recv_async().await.ok()?;
            match self.sender.format.decode::<In>(&bytes) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    warn!(len = bytes.len(), error = %e, "Dropping undecodable frame");
                }
            }
        }
    }

    /// Clone of the sending half
    #[inline]
    pub fn sender(&self) -> FrameSender<Out> {
        self.sender.clone()
    }

    #[inline]
    pub fn format(&self) -> WireFormat {
        self.sender.format
    }

    /// Frames received and not yet consumed
    #[inline]
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Push raw bytes to the peer, bypassing the encoder
    pub fn send_raw(&self, bytes: Bytes) -> Result<(), TransportError> {
        self.sender.tx.send(bytes).map_err(|_| TransportError::Closed)
    }
}

impl<Out, In> std::fmt::Debug for Endpoint<Out, In> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("format", &self.sender.format)
            .field("queued", &self.rx.len())
            .finish()
    }
}

/// Create a connected pair of endpoints
pub fn channel(format: WireFormat) -> (KernelEndpoint, ProcessEndpoint) {
    let (to_process_tx, to_process_rx) = flume::unbounded();
    let (to_kernel_tx, to_kernel_rx) = flume::unbounded();

    let kernel = Endpoint {
        sender: FrameSender {
            tx: to_process_tx,
            format,
            _marker: PhantomData,
        },
        rx: to_kernel_rx,
        _marker: PhantomData,
    };
    let process = Endpoint {
        sender: FrameSender {
            tx: to_kernel_tx,
            format,
            _marker: PhantomData,
        },
        rx: to_process_rx,
        _marker: PhantomData,
    };

    (kernel, process)
}
