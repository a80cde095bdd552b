//! Pull inline `<script>` blocks out of server-rendered templates (Razor
//! `.cshtml` views and the like) and neutralize template markers so the
//! scripts can be evaluated on their own in tests.

use std::error::Error as StdError;
use std::fmt;

mod extract;
mod pattern;
mod sanitize;
mod template_scripts;

pub use extract::{ScriptBlock, extract_script_blocks, extract_scripts};
pub use sanitize::{
    MarkerSyntax, RAZOR_PLACEHOLDER, RAZOR_PREFIX, Sanitized, Sanitizer, URL_ACTION_PLACEHOLDER,
    sanitize, sanitize_with_report,
};
pub use template_scripts::TemplateScripts;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    TemplateRead { path: String, message: String },
    ScriptNotFound(String),
    InvalidSyntax(String),
    Pattern(String),
    InvalidTraceLimit,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateRead { path, message } => {
                write!(f, "template read error: {path}: {message}")
            }
            Self::ScriptNotFound(msg) => write!(f, "script not found: {msg}"),
            Self::InvalidSyntax(msg) => write!(f, "invalid marker syntax: {msg}"),
            Self::Pattern(msg) => write!(f, "pattern error: {msg}"),
            Self::InvalidTraceLimit => {
                write!(f, "set_trace_log_limit requires at least 1 entry")
            }
        }
    }
}

impl StdError for Error {}
