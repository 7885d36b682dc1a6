/*!
 * IPC Module
 * Encoded message passing across the process isolation boundary
 */

pub mod codec;
pub mod transport;

pub use codec::{CodecError, CodecResult, WireFormat};
pub use transport::{
    channel, Endpoint, FrameSender, InitCommand, KernelEndpoint, ProcessEndpoint, ToKernel,
    ToProcess, TransportError,
};
