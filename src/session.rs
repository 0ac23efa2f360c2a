//! The session data model: what to run, what was sent, what came back.
//!
//! A session document is JSON. The output of a run is itself a valid session
//! document, so a captured transcript can be fed straight back in as the next
//! run's input:
//!
//! ```json
//! {
//!   "config": {
//!     "command": "lua",
//!     "first_prompt": "> ",
//!     "change_prompt": "_PROMPT='{key}> '",
//!     "next_prompt": "{key}> ",
//!     "strip_command": true
//!   },
//!   "commands": [
//!     { "command": "6 * 7" },
//!     { "command": "\"a\" .. \"b\"" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;

/// The placeholder token substituted with the generated synchronization key.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Immutable configuration for one REPL session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Command line launching the REPL: program plus arguments, split on
    /// whitespace with single- and double-quote grouping.
    pub command: String,
    /// Regex matching the REPL's initial, un-synchronized prompt.
    pub first_prompt: String,
    /// Input sent to the REPL to make it display a custom prompt. Must
    /// contain the literal `{key}` placeholder.
    pub change_prompt: String,
    /// Regex template matching the synchronized prompt. Must contain the
    /// literal `{key}` placeholder.
    pub next_prompt: String,
    /// Append a newline to every string sent to the REPL.
    #[serde(default = "default_true")]
    pub append_newline: bool,
    /// Remove the echoed command text from captured output.
    #[serde(default)]
    pub strip_command: bool,
    /// Remove ANSI CSI escape sequences from captured output.
    #[serde(default)]
    pub strip_ansi: bool,
    /// Maximum wait, in seconds, for any expected pattern.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> f64 {
    5.0
}

impl ReplConfig {
    /// The timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Check the invariants a channel relies on: a non-empty command line and
    /// the `{key}` placeholder present in both prompt templates.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.command.trim().is_empty() {
            return Err(SessionError::Config("`command` is empty".into()));
        }
        for (field, value) in [
            ("change_prompt", &self.change_prompt),
            ("next_prompt", &self.next_prompt),
        ] {
            if !value.contains(KEY_PLACEHOLDER) {
                return Err(SessionError::Config(format!(
                    "`{field}` must contain the `{KEY_PLACEHOLDER}` placeholder"
                )));
            }
        }
        Ok(())
    }
}

/// One step of a session: the text to send and, after the run, what came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplCommand {
    /// The literal text sent to the REPL.
    pub command: String,
    /// Opaque metadata describing the output; never interpreted.
    #[serde(default = "default_output_type")]
    pub output_type: String,
    /// The captured response. A value already present before the run is moved
    /// to `expected` (unless `expected` is set) and then overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// A previously recorded response to compare against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

fn default_output_type() -> String {
    "text/plain".to_string()
}

impl ReplCommand {
    /// A fresh command with no recorded output.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output_type: default_output_type(),
            output: None,
            expected: None,
        }
    }
}

/// A full scripted session: one config plus the ordered commands to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplSession {
    pub config: ReplConfig,
    pub commands: Vec<ReplCommand>,
}
