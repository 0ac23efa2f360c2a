//! # Replscribe
//!
//! Drive an interactive REPL through a scripted session and capture a
//! reproducible transcript.
//!
//! Replscribe spawns a REPL in a PTY, switches its prompt to a per-run random
//! marker so program output can never be mistaken for a prompt, then sends
//! each scripted command and records exactly what the program printed in
//! response. The populated session is structured data: embed it in
//! documentation instead of hand-copied terminal output, or re-run it later
//! and diff against the previous capture as a regression test.
//!
//! ## Quick start
//!
//! ```no_run
//! use replscribe::{ReplSession, run_session};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session: ReplSession = serde_json::from_str(
//!         r#"{
//!         "config": {
//!             "command": "lua",
//!             "first_prompt": "> ",
//!             "change_prompt": "_PROMPT='{key}> '",
//!             "next_prompt": "{key}> ",
//!             "strip_command": true
//!         },
//!         "commands": [
//!             { "command": "6 * 7" },
//!             { "command": "\"a\" .. \"b\"" }
//!         ]
//!     }"#,
//!     )?;
//!
//!     run_session(&mut session).await?;
//!
//!     for cmd in &session.commands {
//!         println!("{} => {}", cmd.command, cmd.output.as_deref().unwrap_or(""));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Session config
//!
//! | Field | Default | Description |
//! |-------|---------|-------------|
//! | `command` | — | Command line launching the REPL (quote-aware splitting) |
//! | `first_prompt` | — | Regex matching the REPL's initial prompt |
//! | `change_prompt` | — | Input that makes the REPL display a custom prompt; must contain `{key}` |
//! | `next_prompt` | — | Regex for the synchronized prompt; must contain `{key}` |
//! | `append_newline` | `true` | Append `\n` to every sent string |
//! | `strip_command` | `false` | Remove the echoed command from captured output |
//! | `strip_ansi` | `false` | Remove ANSI CSI sequences from captured output |
//! | `timeout` | `5.0` | Seconds to wait for any expected pattern |
//!
//! ## Regression checks
//!
//! [`run_session`] moves a command's pre-existing `output` into `expected`
//! before overwriting it, so feeding a captured session document back in
//! records the old run next to the new one. [`check_session`] then reports a
//! unified diff for every command that drifted.
//!
//! ## Failure model
//!
//! Every [`SessionError`] is fatal for its session: nothing is retried,
//! because resending input to a live REPL could duplicate side effects. The
//! spawned process itself is killed and reaped on every exit path.

pub mod ansi;
pub mod channel;
pub mod check;
pub mod error;
pub(crate) mod pty;
pub mod runner;
pub mod session;
pub mod transport;

pub use channel::{KeyGen, PromptChannel, random_key};
pub use check::{Mismatch, check_session};
pub use error::SessionError;
pub use runner::run_session;
pub use session::{ReplCommand, ReplConfig, ReplSession};
pub use transport::{PtyTransport, Transport};
