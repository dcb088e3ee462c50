//! Structured logging system with visual formatting.
//!
//! Output follows the box-drawing style used throughout lightkeeper: a block
//! starts with `┣`, details hang off it with `┃   `, and semantic levels are
//! tagged `[INFO]`, `[WARNING]` and so on. Every line is prefixed with a
//! local timestamp so the log of a long-running service can be read back
//! without a journal.
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`**: begins a new conceptual block (a tick, a
//!   startup phase). Prints an empty pipe for spacing, then `┣ message`.
//! - **`log_decorated!`**: a line belonging to the current block.
//! - **`log_indented!`**: nested detail under the previous line.
//! - **`log_pipe!`**: a single spacer line. Use it before a level-tagged
//!   message that opens its own block.
//! - **`log_version!`** / **`log_end!`**: header and termination marker,
//!   once per process.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`,
//!   `log_critical!`**: level-tagged lines.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Matches the date format the service has always written to its log.
const TIMESTAMP_FORMAT: &str = "%a %b %d - %I:%M:%S %p";

/// Main logging interface.
pub struct Log;

impl Log {
    /// Enable or disable logging, e.g. to keep test output clean.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// One-shot commands print without timestamps.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Timestamp prefix for the current line, or an empty string when
    /// timestamps are turned off. Public for macro access.
    pub fn get_timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format(TIMESTAMP_FORMAT))
        } else {
            String::new()
        }
    }
}

// Public function that routes output (needed by macros)
pub fn write_output(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

/// Shared body of every logging macro: `$decor` is the glyph sequence placed
/// between the timestamp and the message.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($decor:expr, $($arg:tt)+) => {{
        use $crate::common::logger::Log;
        if Log::is_enabled() {
            let prefix = Log::get_timestamp_prefix();
            let message = format!($($arg)+);
            let formatted = format!("{prefix}{}{message}\n", $decor);
            $crate::common::logger::write_output(&formatted);
        }
    }};
}

/// Log a decorated message, typically as part of an existing block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_line!("┣ ", $($arg)+) };
}

/// Log an indented message for sub-items or details within a block.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_line!("┃   ", $($arg)+) };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => { $crate::__log_line!("┃", "") };
}

/// Log a block start message, initiating a new conceptual block.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {{
        $crate::log_pipe!();
        $crate::__log_line!("┣ ", $($arg)+);
    }};
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_line!("┏ ", "lightkeeper v{} ━━╸", env!("CARGO_PKG_VERSION"))
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => { $crate::__log_line!("╹", "") };
}

/// Log a warning message with yellow level tag.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_line!("┣[\x1b[33mWARNING\x1b[0m] ", $($arg)+) };
}

/// Log an error message with red level tag.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_line!("┣[\x1b[31mERROR\x1b[0m] ", $($arg)+) };
}

/// Log an error that ends the current flow, closing the pipe with `┗`.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {{
        $crate::log_pipe!();
        $crate::__log_line!("┗[\x1b[31mERROR\x1b[0m] ", $($arg)+);
    }};
}

/// Log an informational message with green level tag.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_line!("┣[\x1b[32mINFO\x1b[0m] ", $($arg)+) };
}

/// Log a debug message. Callers gate these on their own `debug_enabled`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_line!("┣[\x1b[36mDEBUG\x1b[0m] ", $($arg)+) };
}

/// Log a critical message with red level tag.
#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_line!("┣[\x1b[31mCRITICAL\x1b[0m] ", $($arg)+) };
}
