#![no_std]

//! Wire types shared between the exec/exit tracepoint programs and the
//! userspace agent.
//!
//! The kernel side writes one [`RawProcessRecord`] per observed exec or exit
//! into the `PROCESS_EVENTS` perf event array. Path buffers are filled by a
//! dentry walk that writes backwards, so the first valid byte is recorded in
//! the matching `*_offset` field instead of always being index 0.

#[cfg(test)]
extern crate std;

pub const HOSTNAME_LEN: usize = 65;
pub const PATH_LEN: usize = 256;
pub const ARGS_LEN: usize = 256;

/// Perf event array carrying [`RawProcessRecord`]s.
pub const PROCESS_EVENTS_MAP: &str = "PROCESS_EVENTS";
/// Program array used by the exec program to chain its capture stages.
pub const TAIL_CALL_MAP: &str = "EXEC_TAIL_CALLS";

pub const EXEC_PROGRAM: &str = "sched_process_exec";
pub const EXIT_PROGRAM: &str = "sched_process_exit";
pub const TRACEPOINT_CATEGORY: &str = "sched";

/// Index contract of `EXEC_TAIL_CALLS`. The kernel program tail-calls these
/// slots by number, so the mapping must not change independently of it.
pub const TAIL_CALL_PROGRAMS: [(u32, &str); 3] = [
    (0, "exec_read_binary_path"),
    (1, "exec_read_cwd"),
    (2, "exec_read_args"),
];

pub mod error_flags {
    pub const BINARY_PATH_TRUNCATED: u32 = 1 << 0;
    pub const CWD_TRUNCATED: u32 = 1 << 1;
    pub const ARGS_TRUNCATED: u32 = 1 << 2;
    pub const HOSTNAME_READ_FAILED: u32 = 1 << 3;
    pub const BINARY_PATH_READ_FAILED: u32 = 1 << 4;
    pub const CWD_READ_FAILED: u32 = 1 << 5;
    pub const ARGS_READ_FAILED: u32 = 1 << 6;

    pub const NAMES: [(u32, &str); 7] = [
        (BINARY_PATH_TRUNCATED, "BINARY_PATH_TRUNCATED"),
        (CWD_TRUNCATED, "CWD_TRUNCATED"),
        (ARGS_TRUNCATED, "ARGS_TRUNCATED"),
        (HOSTNAME_READ_FAILED, "HOSTNAME_READ_FAILED"),
        (BINARY_PATH_READ_FAILED, "BINARY_PATH_READ_FAILED"),
        (CWD_READ_FAILED, "CWD_READ_FAILED"),
        (ARGS_READ_FAILED, "ARGS_READ_FAILED"),
    ];

    pub const KNOWN: u32 = BINARY_PATH_TRUNCATED
        | CWD_TRUNCATED
        | ARGS_TRUNCATED
        | HOSTNAME_READ_FAILED
        | BINARY_PATH_READ_FAILED
        | CWD_READ_FAILED
        | ARGS_READ_FAILED;
}

/// Byte offsets of every [`RawProcessRecord`] field, native endian.
pub mod layout {
    pub const PID: usize = 0;
    pub const ERROR_FLAGS: usize = 4;
    pub const HOSTNAME: usize = 8;
    pub const BINARY_PATH: usize = 73;
    /// Alignment gap before the next `u32`, always zero on the wire.
    pub const PADDING: usize = 329;
    pub const PADDING_LEN: usize = 3;
    pub const BINARY_PATH_OFFSET: usize = 332;
    pub const CWD: usize = 336;
    pub const CWD_OFFSET: usize = 592;
    pub const ARGS: usize = 596;
    pub const ARGS_LEN: usize = 852;
    pub const EXIT_CODE: usize = 856;
    pub const SIZE: usize = 860;
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawProcessRecord {
    pub pid: u32,
    pub error_flags: u32,
    pub hostname: [u8; HOSTNAME_LEN],
    pub binary_path: [u8; PATH_LEN],
    pub _pad: [u8; layout::PADDING_LEN],
    pub binary_path_offset: u32,
    pub cwd: [u8; PATH_LEN],
    pub cwd_offset: u32,
    pub args: [u8; ARGS_LEN],
    pub args_len: u32,
    pub exit_code: i32,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for RawProcessRecord {}

impl RawProcessRecord {
    pub fn new() -> Self {
        Self {
            pid: 0,
            error_flags: 0,
            hostname: [0u8; HOSTNAME_LEN],
            binary_path: [0u8; PATH_LEN],
            _pad: [0u8; layout::PADDING_LEN],
            binary_path_offset: 0,
            cwd: [0u8; PATH_LEN],
            cwd_offset: 0,
            args: [0u8; ARGS_LEN],
            args_len: 0,
            exit_code: 0,
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_error_flags(mut self, flags: u32) -> Self {
        self.error_flags = flags;
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_hostname(mut self, hostname: &[u8]) -> Self {
        // Last byte stays NUL, like the kernel's utsname copy.
        let copy_len = hostname.len().min(HOSTNAME_LEN - 1);
        self.hostname = [0u8; HOSTNAME_LEN];
        self.hostname[..copy_len].copy_from_slice(&hostname[..copy_len]);
        self
    }

    /// Writes the path right-aligned, the way the backwards dentry walk does.
    pub fn with_binary_path(mut self, path: &[u8]) -> Self {
        let (offset, truncated) = write_right_aligned(&mut self.binary_path, path);
        self.binary_path_offset = offset;
        if truncated {
            self.error_flags |= error_flags::BINARY_PATH_TRUNCATED;
        }
        self
    }

    pub fn with_cwd(mut self, path: &[u8]) -> Self {
        let (offset, truncated) = write_right_aligned(&mut self.cwd, path);
        self.cwd_offset = offset;
        if truncated {
            self.error_flags |= error_flags::CWD_TRUNCATED;
        }
        self
    }

    /// Copies NUL-separated argv bytes, cutting at the buffer capacity.
    pub fn with_raw_args(mut self, args: &[u8]) -> Self {
        let copy_len = args.len().min(ARGS_LEN);
        self.args = [0u8; ARGS_LEN];
        self.args[..copy_len].copy_from_slice(&args[..copy_len]);
        self.args_len = copy_len as u32;
        if copy_len < args.len() {
            self.error_flags |= error_flags::ARGS_TRUNCATED;
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C) with every byte covered by a field (the alignment
        // gap is the explicit `_pad`), so there is no uninitialized padding.
        unsafe {
            core::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                core::mem::size_of::<Self>(),
            )
        }
    }
}

impl Default for RawProcessRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn write_right_aligned(buf: &mut [u8; PATH_LEN], path: &[u8]) -> (u32, bool) {
    // One trailing NUL is always kept.
    let room = PATH_LEN - 1;
    let truncated = path.len() > room;
    let kept = if truncated {
        &path[path.len() - room..]
    } else {
        path
    };
    let start = room - kept.len();
    *buf = [0u8; PATH_LEN];
    buf[start..room].copy_from_slice(kept);
    (start as u32, truncated)
}
