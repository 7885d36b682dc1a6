/*!
 * Devices Module
 * Character devices exposed to processes
 */

pub mod console;

pub use console::{BufferConsole, Console, OutputMirror};
