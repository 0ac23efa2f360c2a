//! Regression comparison of captured output against recorded expectations.

use similar::TextDiff;
use std::fmt;

use crate::session::ReplSession;

/// One command whose captured output no longer matches its recorded value.
#[derive(Debug)]
pub struct Mismatch {
    /// Zero-based position of the command in the session.
    pub index: usize,
    /// The command text, for reporting.
    pub command: String,
    /// Unified diff, expected vs actual.
    pub diff: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "command {} (`{}`) drifted:", self.index, self.command)?;
        write!(f, "{}", self.diff)
    }
}

/// Compare every command that carries an `expected` value against its
/// captured `output`. Commands without an expectation are skipped; a missing
/// `output` compares as empty.
pub fn check_session(session: &ReplSession) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    for (index, cmd) in session.commands.iter().enumerate() {
        let Some(expected) = cmd.expected.as_deref() else {
            continue;
        };
        let output = cmd.output.as_deref().unwrap_or("");
        if expected == output {
            continue;
        }
        let diff = TextDiff::from_lines(expected, output);
        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header("expected", "actual")
            .to_string();
        mismatches.push(Mismatch {
            index,
            command: cmd.command.clone(),
            diff: unified,
        });
    }
    mismatches
}
