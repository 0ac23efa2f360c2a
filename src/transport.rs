//! The byte-stream boundary between the channel and the live process.
//!
//! [`PromptChannel`](crate::channel::PromptChannel) only needs two things
//! from the program it drives: a way to write bytes to its stdin and a way to
//! await the next chunk of its output. [`Transport`] captures exactly that,
//! so the channel logic can be exercised against a scripted stand-in instead
//! of a real subprocess.

use async_trait::async_trait;
use std::io;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::pty::PtySession;

/// A bidirectional byte stream to a running program.
#[async_trait(?Send)]
pub trait Transport {
    /// Write bytes to the program's stdin.
    fn send_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Await the next chunk of program output. `None` means EOF: the program
    /// has exited and no further output will ever arrive.
    async fn recv_chunk(&mut self) -> Option<Vec<u8>>;
}

/// The production transport: a program in a PTY plus its reader channel.
pub struct PtyTransport {
    pty: PtySession,
    output: UnboundedReceiver<Vec<u8>>,
}

impl PtyTransport {
    /// Spawn `command_line` in a PTY and wrap it as a transport.
    pub fn spawn(command_line: &str) -> anyhow::Result<Self> {
        let (pty, output) = PtySession::spawn(command_line)?;
        Ok(Self { pty, output })
    }
}

#[async_trait(?Send)]
impl Transport for PtyTransport {
    fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.pty.write(data)
    }

    async fn recv_chunk(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A scripted REPL good enough to exercise the full handshake and
    //! capture protocol without spawning anything.

    use super::Transport;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io;

    type Responder = Box<dyn FnMut(&str) -> Option<String>>;

    /// Understands one built-in command, `PROMPT <text>`, which switches its
    /// prompt (the fake analog of `PS1='...'`). Every other input line is
    /// answered by the responder closure: `Some(text)` is printed before the
    /// next prompt, `None` hangs forever (the REPL never answers).
    pub(crate) struct FakeRepl {
        prompt: String,
        echo: bool,
        adopt_prompt: bool,
        eof_when_drained: bool,
        pending: VecDeque<Vec<u8>>,
        respond: Responder,
    }

    impl FakeRepl {
        /// A pipe-like REPL: no echo, prompt changes honored.
        pub(crate) fn new(
            first_prompt: &str,
            respond: impl FnMut(&str) -> Option<String> + 'static,
        ) -> Self {
            Self {
                prompt: first_prompt.to_string(),
                echo: false,
                adopt_prompt: true,
                eof_when_drained: false,
                pending: VecDeque::from([first_prompt.as_bytes().to_vec()]),
                respond: Box::new(respond),
            }
        }

        /// A PTY-like REPL that echoes every input line back with `\r\n`.
        pub(crate) fn echoing(
            first_prompt: &str,
            respond: impl FnMut(&str) -> Option<String> + 'static,
        ) -> Self {
            Self {
                echo: true,
                ..Self::new(first_prompt, respond)
            }
        }

        /// A program that never prints anything at all.
        pub(crate) fn silent() -> Self {
            let mut repl = Self::new("", |_| None);
            repl.pending.clear();
            repl
        }

        /// A REPL that shows its first prompt but ignores prompt changes.
        pub(crate) fn stubborn(first_prompt: &str) -> Self {
            Self {
                adopt_prompt: false,
                ..Self::new(first_prompt, |_| Some(String::new()))
            }
        }

        /// After the queued output drains, report EOF instead of hanging.
        pub(crate) fn dies_after_output(mut self) -> Self {
            self.eof_when_drained = true;
            self
        }

        /// Replace the queued output with exact chunks, to exercise matches
        /// that span read boundaries.
        pub(crate) fn preload(mut self, chunks: &[&str]) -> Self {
            self.pending = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
            self
        }
    }

    #[async_trait(?Send)]
    impl Transport for FakeRepl {
        fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
            let text = String::from_utf8_lossy(data);
            let line = text.trim_end_matches('\n');

            if self.echo {
                self.pending.push_back(format!("{line}\r\n").into_bytes());
            }

            if let Some(new_prompt) = line.strip_prefix("PROMPT ") {
                if self.adopt_prompt {
                    self.prompt = new_prompt.to_string();
                    self.pending.push_back(self.prompt.as_bytes().to_vec());
                }
                return Ok(());
            }

            if let Some(output) = (self.respond)(line) {
                if !output.is_empty() {
                    self.pending.push_back(output.into_bytes());
                }
                self.pending.push_back(self.prompt.as_bytes().to_vec());
            }
            Ok(())
        }

        async fn recv_chunk(&mut self) -> Option<Vec<u8>> {
            match self.pending.pop_front() {
                Some(chunk) => Some(chunk),
                None if self.eof_when_drained => None,
                None => std::future::pending().await,
            }
        }
    }
}
