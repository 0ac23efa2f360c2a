//! Executes every command of a session, in order, against one channel.

use tracing::info;

use crate::channel::PromptChannel;
use crate::error::SessionError;
use crate::session::ReplSession;

/// Run every command of `session` against a freshly opened channel, filling
/// in each command's `output` as it completes.
///
/// A command's pre-existing `output` is preserved as its `expected` value
/// (unless `expected` is already set and non-empty) before being overwritten,
/// which is what lets a previously captured session document serve as a
/// regression test against the new run.
///
/// Commands run strictly in order: each may depend on REPL state left by the
/// ones before it. The first channel error aborts the run; commands not yet
/// reached, and the command that failed, keep whatever values they had.
pub async fn run_session(session: &mut ReplSession) -> Result<(), SessionError> {
    let mut channel = PromptChannel::open(&session.config).await?;
    drive(session, &mut channel).await
}

async fn drive(
    session: &mut ReplSession,
    channel: &mut PromptChannel,
) -> Result<(), SessionError> {
    for cmd in &mut session.commands {
        let expected = cmd
            .expected
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| cmd.output.clone());

        let output = channel.send(&cmd.command).await?;
        info!(command = %cmd.command, bytes = output.len(), "captured");

        cmd.expected = expected;
        cmd.output = Some(output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::KeyGen;
    use crate::error::SessionError;
    use crate::transport::fake::FakeRepl;

    fn fixed_key() -> KeyGen {
        Box::new(|| "TESTKEY123".to_string())
    }

    fn session(commands: &[&str]) -> ReplSession {
        let commands: Vec<_> = commands
            .iter()
            .map(|c| serde_json::json!({ "command": c }))
            .collect();
        serde_json::from_value(serde_json::json!({
            "config": {
                "command": "fake",
                "first_prompt": "> ",
                "change_prompt": "PROMPT {key}> ",
                "next_prompt": "{key}> ",
                "timeout": 5.0
            },
            "commands": commands
        }))
        .unwrap()
    }

    async fn run_against(
        session: &mut ReplSession,
        repl: FakeRepl,
    ) -> Result<(), SessionError> {
        let mut channel =
            PromptChannel::open_with(&session.config, Box::new(repl), fixed_key()).await?;
        drive(session, &mut channel).await
    }

    #[tokio::test]
    async fn test_outputs_filled_in_order() {
        let mut session = session(&["one", "two"]);
        let repl = FakeRepl::new("> ", |cmd| Some(format!("saw {cmd}\n")));
        run_against(&mut session, repl).await.unwrap();
        assert_eq!(session.commands[0].output.as_deref(), Some("saw one\n"));
        assert_eq!(session.commands[1].output.as_deref(), Some("saw two\n"));
        assert_eq!(session.commands[0].expected, None);
    }

    #[tokio::test]
    async fn test_commands_see_state_left_by_earlier_ones() {
        let mut session = session(&["x=5", "print x"]);
        let mut stored = String::new();
        let repl = FakeRepl::new("> ", move |cmd| {
            if let Some(value) = cmd.strip_prefix("x=") {
                stored = value.to_string();
                Some(String::new())
            } else {
                Some(format!("{stored}\n"))
            }
        });
        run_against(&mut session, repl).await.unwrap();
        assert_eq!(session.commands[1].output.as_deref(), Some("5\n"));
    }

    #[tokio::test]
    async fn test_prior_output_becomes_expected() {
        let mut session = session(&["6 * 7"]);
        session.commands[0].output = Some("42".into());
        let repl = FakeRepl::new("> ", |_| Some("43\n".to_string()));
        run_against(&mut session, repl).await.unwrap();
        assert_eq!(session.commands[0].expected.as_deref(), Some("42"));
        assert_eq!(session.commands[0].output.as_deref(), Some("43\n"));
    }

    #[tokio::test]
    async fn test_existing_expected_wins_over_prior_output() {
        let mut session = session(&["6 * 7"]);
        session.commands[0].expected = Some("keep".into());
        session.commands[0].output = Some("discard".into());
        let repl = FakeRepl::new("> ", |_| Some("fresh\n".to_string()));
        run_against(&mut session, repl).await.unwrap();
        assert_eq!(session.commands[0].expected.as_deref(), Some("keep"));
        assert_eq!(session.commands[0].output.as_deref(), Some("fresh\n"));
    }

    #[tokio::test]
    async fn test_empty_expected_treated_as_unset() {
        let mut session = session(&["6 * 7"]);
        session.commands[0].expected = Some(String::new());
        session.commands[0].output = Some("42".into());
        let repl = FakeRepl::new("> ", |_| Some("42\n".to_string()));
        run_against(&mut session, repl).await.unwrap();
        assert_eq!(session.commands[0].expected.as_deref(), Some("42"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_leaves_later_commands_untouched() {
        let mut session = session(&["ok", "hang", "never"]);
        session.commands[2].output = Some("stale".into());
        let repl = FakeRepl::new("> ", |cmd| (cmd != "hang").then(|| "fine\n".to_string()));
        let err = run_against(&mut session, repl).await.unwrap_err();
        assert!(matches!(err, SessionError::ResponseTimeout { .. }), "got: {err}");
        assert_eq!(session.commands[0].output.as_deref(), Some("fine\n"));
        assert_eq!(session.commands[1].output, None);
        // Untouched, including a value recorded by some earlier run.
        assert_eq!(session.commands[2].output.as_deref(), Some("stale"));
        assert_eq!(session.commands[2].expected, None);
    }
}
