//! Error taxonomy (spec.md §7). Only the two classes that must propagate to
//! a caller get a `Result` type; runtime X errors and subprocess failures
//! are logged in place (see `display.rs`, `tmux.rs`) and never constructed
//! as this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XwmuxError {
    #[error("fatal startup error: {0}")]
    Startup(String),

    #[error("prefix key not set")]
    NotInitialized,

    #[error("malformed control message: {0}")]
    MalformedMessage(String),

    #[error("could not parse control client arguments: {0}")]
    ClientParse(String),
}

pub type Result<T> = std::result::Result<T, XwmuxError>;
