#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Invalid CLI/config input (bad flags, unreadable or invalid config, unknown scenario, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors while writing reports, client construction, join failures).
    RuntimeError = 40,

    /// The run was interrupted with Ctrl-C; no report was written.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
