/*!
 * System Limits and Constants
 *
 * Centralized location for system-wide limits, defaults and wire constants.
 * Organized by domain for maintainability and discoverability.
 *
 * - Values mirrored on the wire are marked with [WIRE]
 * - Values matching POSIX conventions are marked with [COMPAT]
 */

use std::time::Duration;

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Default cap on concurrently registered processes
pub const DEFAULT_MAX_PROCESSES: usize = 64;

/// First pid handed out by the orchestrator (pid 0 is never used)
pub const FIRST_PID: u64 = 1;

/// First call id handed out on a fresh process endpoint
pub const FIRST_CALL_ID: u64 = 1;

// =============================================================================
// LIFECYCLE TIMING
// =============================================================================

/// Delay before the primary process is re-instantiated after a halt
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(100);

/// How long teardown waits for a running unit to stop before aborting it
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// FILE DESCRIPTORS
// =============================================================================

/// Default per-process descriptor limit (stdio included)
pub const DEFAULT_MAX_OPEN_FILES: usize = 256;

/// Standard input [COMPAT]
pub const STDIN_FD: u32 = 0;

/// Standard output [COMPAT]
pub const STDOUT_FD: u32 = 1;

/// Standard error [COMPAT]
pub const STDERR_FD: u32 = 2;

/// First descriptor handed out by `open` [COMPAT]
pub const FIRST_FILE_FD: u32 = 3;

// =============================================================================
// OPEN FLAGS [WIRE] [COMPAT]
// =============================================================================

pub const O_RDONLY: u32 = 0;
pub const O_WRONLY: u32 = 1;
pub const O_RDWR: u32 = 2;
/// Mask selecting the access mode bits
pub const O_ACCMODE: u32 = 3;
pub const O_CREAT: u32 = 0o100;
pub const O_EXCL: u32 = 0o200;
pub const O_TRUNC: u32 = 0o1000;
pub const O_APPEND: u32 = 0o2000;

// =============================================================================
// FILE MODE BITS [WIRE]
// =============================================================================
// The file type lives in the high bits; a plain file has none of them set.

/// Directory
pub const MODE_DIR: u32 = 1 << 31;

/// Symbolic link
pub const MODE_SYMLINK: u32 = 1 << 27;

/// Device file
pub const MODE_DEVICE: u32 = 1 << 26;

/// Named pipe
pub const MODE_NAMED_PIPE: u32 = 1 << 25;

/// Unix domain socket
pub const MODE_SOCKET: u32 = 1 << 24;

/// Character device (set together with MODE_DEVICE)
pub const MODE_CHAR_DEVICE: u32 = 1 << 21;

/// Non-regular file of unknown kind
pub const MODE_IRREGULAR: u32 = 1 << 19;

/// Every type bit
pub const MODE_TYPE: u32 = MODE_DIR
    | MODE_SYMLINK
    | MODE_NAMED_PIPE
    | MODE_SOCKET
    | MODE_DEVICE
    | MODE_CHAR_DEVICE
    | MODE_IRREGULAR;

/// Permission bits
pub const MODE_PERM: u32 = 0o777;

// =============================================================================
// TTY FLAGS [WIRE]
// =============================================================================

/// Canonical (line-buffered) input
pub const TTY_ICANON: u32 = 1 << 0;

/// Echo input back to the output
pub const TTY_ECHO: u32 = 1 << 1;

/// Flags a freshly created console starts with
pub const TTY_DEFAULT_FLAGS: u32 = TTY_ICANON | TTY_ECHO;
