//! Error types for channel construction and session execution.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while opening a channel or running a session.
///
/// None of these are retried: a REPL session is not idempotent, so resending
/// input after a failure could duplicate side effects in the target program.
/// Each variant is fatal for the remainder of the session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to spawn `{command}`: {reason}")]
    Spawn {
        command: String,
        reason: anyhow::Error,
    },

    #[error("No prompt matching `{pattern}` within {timeout:?} of startup")]
    Startup { pattern: String, timeout: Duration },

    #[error("REPL did not adopt the synchronized prompt within {timeout:?}")]
    PromptSync { timeout: Duration },

    #[error("No response to `{command}` within {timeout:?}")]
    ResponseTimeout { command: String, timeout: Duration },

    #[error("Invalid session config: {0}")]
    Config(String),

    #[error("Failed to write to the REPL: {0}")]
    Write(#[source] io::Error),
}
