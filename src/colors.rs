/// ANSI color codes for logfmt output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub key: &'static str,         // Cyan for field names
    pub equals: &'static str,      // White for = separator
    pub value: &'static str,       // Uncolored plain values
    pub timestamp: &'static str,   // Blue for start/finish/timestamp
    pub success: &'static str,     // Green for status=success
    pub failure: &'static str,     // Red for status=failure and errors
    pub level_error: &'static str, // Red for error/severe/fatal
    pub level_warn: &'static str,  // Yellow for warning
    pub level_info: &'static str,  // White for info/config
    pub level_debug: &'static str, // Gray for debug and the fine levels
    pub reset: &'static str,
}

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                key: "\x1b[36m",
                equals: "\x1b[37m",
                value: "",
                timestamp: "\x1b[34m",
                success: "\x1b[32m",
                failure: "\x1b[31m",
                level_error: "\x1b[31m",
                level_warn: "\x1b[33m",
                level_info: "\x1b[37m",
                level_debug: "\x1b[90m",
                reset: "\x1b[0m",
            }
        } else {
            Self {
                key: "",
                equals: "",
                value: "",
                timestamp: "",
                success: "",
                failure: "",
                level_error: "",
                level_warn: "",
                level_info: "",
                level_debug: "",
                reset: "",
            }
        }
    }
}
