/// ANSI color helper utilities for terminal output.
pub const RESET: &str = "\x1b[0m";

pub const GREY: &str = "\x1b[90m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";

pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Close reasons other than a manual clock-out are highlighted.
pub fn color_for_close_reason(reason: &str) -> &'static str {
    match reason {
        "user" => RESET,
        "idle_timeout" => YELLOW,
        "system_shutdown" | "recovery" => RED,
        _ => GREY,
    }
}
