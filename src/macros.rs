//! Logging macros over the task-local output buffer
//!
//! `bprintln!` writes into whichever `SharedBuffer` the current task runs
//! under; outside any buffer scope it falls back to stdout/stderr. The
//! `debug:` and `dev:` forms compile to nothing in release builds.
//!
//! ```ignore
//! bprintln!("plain line");
//! bprintln!(info: "Initiating AI stream...");
//! bprintln!(warn: "Rate limit hit, retrying in {}s", 4);
//! bprintln!(error: "{}", message);
//! bprintln!(dev: "Loading plan from {}", path.display());
//! bprintln!(step: 2, "Executing step {}", 2);
//! ```

/// Print to the current buffer with no line ending
#[macro_export]
macro_rules! bprint {
    ($($arg:tt)*) => {{
        $crate::output::emit_stdout(format!($($arg)*));
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __labelled {
    ($emit:path, $color:ident, $label:expr, $($arg:tt)*) => {{
        $emit(format!(
            "{}{}{} {}\n",
            $crate::constants::$color,
            $label,
            $crate::constants::FORMAT_RESET,
            format!($($arg)*)
        ));
    }};
}

/// Print a line to the current buffer, optionally labelled by severity
#[macro_export]
macro_rules! bprintln {
    () => {
        $crate::bprint!("\n")
    };

    (info: $($arg:tt)*) => {
        $crate::__labelled!($crate::output::emit_stdout, FORMAT_BOLD, "info:", $($arg)*)
    };

    (warn: $($arg:tt)*) => {
        $crate::__labelled!($crate::output::emit_system, FORMAT_YELLOW, "warning:", $($arg)*)
    };

    (error: $($arg:tt)*) => {
        $crate::__labelled!($crate::output::emit_stderr, FORMAT_RED, "error:", $($arg)*)
    };

    (debug: $($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        $crate::__labelled!($crate::output::emit_debug, FORMAT_CYAN, "debug:", $($arg)*);
    }};

    (dev: $($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        $crate::__labelled!($crate::output::emit_debug, FORMAT_MAGENTA, "dev:", $($arg)*);
    }};

    (step: $step:expr, $($arg:tt)*) => {{
        let step_id: u32 = $step;
        $crate::output::emit_step(step_id, format!("{}\n", format!($($arg)*)));
    }};

    ($($arg:tt)*) => {{
        $crate::output::emit_stdout(format!("{}\n", format!($($arg)*)));
    }};
}
