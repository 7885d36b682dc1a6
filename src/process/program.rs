/*!
 * Programs and Loaders
 *
 * A program image is an opaque blob. Turning it into something runnable is
 * the loader's job; the relay only needs a `Program` it can start with a
 * `ProcessContext`. `NativeLoader` maps image bytes to native Rust programs.
 */

use ahash::RandomState;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::core::types::{Generation, Pid};
use crate::syscalls::client::SyscallClient;
use crate::syscalls::types::SyscallError;

// ============================================================================
// Program
// ============================================================================

/// Everything a running program gets from the relay
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub pid: Pid,
    pub argv: Vec<String>,
    pub generation: Generation,
    /// Syscall client of this run
    pub sys: SyscallClient,
}

impl ProcessContext {
    /// argv[0], or empty
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after argv[0]
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// Why a program run failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    #[error("exit status {0}")]
    Exit(i32),

    #[error("{0}")]
    Message(String),
}

impl From<String> for ProgramError {
    fn from(msg: String) -> Self {
        ProgramError::Message(msg)
    }
}

impl From<&str> for ProgramError {
    fn from(msg: &str) -> Self {
        ProgramError::Message(msg.to_string())
    }
}

/// Runnable program instance
pub trait Program: Send + Sync {
    fn run(&self, ctx: ProcessContext) -> BoxFuture<'static, Result<(), ProgramError>>;
}

impl<F, Fut> Program for F
where
    F: Fn(ProcessContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ProgramError>> + Send + 'static,
{
    fn run(&self, ctx: ProcessContext) -> BoxFuture<'static, Result<(), ProgramError>> {
        (self)(ctx).boxed()
    }
}

// ============================================================================
// Images and loaders
// ============================================================================

/// Opaque program image
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProgramImage(Bytes);

impl ProgramImage {
    #[inline]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for ProgramImage {
    fn from(name: &'static str) -> Self {
        Self(Bytes::from_static(name.as_bytes()))
    }
}

impl From<Vec<u8>> for ProgramImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramImage({})", preview(&self.0))
    }
}

/// Image instantiation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Empty program image")]
    EmptyImage,

    #[error("Unknown program image: {0}")]
    UnknownImage(String),

    #[error("Invalid program image: {0}")]
    Invalid(String),
}

/// Turns images into programs (compute-module instantiation)
pub trait ProgramLoader: Send + Sync {
    fn instantiate(&self, image: &[u8], argv: &[String]) -> Result<Arc<dyn Program>, LoadError>;
}

/// Registry of native programs keyed by image bytes
#[derive(Default)]
pub struct NativeLoader {
    programs: DashMap<Bytes, Arc<dyn Program>, RandomState>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `program` under `image`, returning the image to spawn with
    pub fn register(&self, image: impl Into<ProgramImage>, program: impl Program + 'static) -> ProgramImage {
        let image = image.into();
        self.programs.insert(image.0.clone(), Arc::new(program));
        image
    }

    #[must_use]
    pub fn with_program(self, image: impl Into<ProgramImage>, program: impl Program + 'static) -> Self {
        self.register(image, program);
        self
    }

    pub fn contains(&self, image: &[u8]) -> bool {
        self.programs.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl ProgramLoader for NativeLoader {
    fn instantiate(&self, image: &[u8], _argv: &[String]) -> Result<Arc<dyn Program>, LoadError> {
        if image.is_empty() {
            return Err(LoadError::EmptyImage);
        }
        self.programs
            .get(image)
            .map(|program| Arc::clone(program.value()))
            .ok_or_else(|| LoadError::UnknownImage(preview(image)))
    }
}

impl fmt::Debug for NativeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLoader")
            .field("programs", &self.programs.len())
            .finish()
    }
}

fn preview(bytes: &[u8]) -> String {
    const MAX: usize = 32;
    let shown = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX)]).into_owned();
    if bytes.len() > MAX {
        format!("{}... ({} bytes)", shown, bytes.len())
    } else {
        shown
    }
}
