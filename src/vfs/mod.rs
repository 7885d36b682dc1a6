/*!
 * Virtual File System Module
 * Pluggable backing store for file syscalls
 */

pub mod memory;
pub mod traits;
pub mod types;

// Re-exports
pub use memory::MemFS;
pub use traits::FileSystem;
pub use types::{Entry, FileType, Metadata, VfsError, VfsResult};
