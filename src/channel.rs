//! The prompt-synchronized process channel.
//!
//! A REPL's own prompt is useless as a response boundary: nothing stops the
//! program from printing text identical to it. The channel therefore opens
//! with a handshake that makes the REPL display a prompt containing a fresh
//! random key, after which "everything before the next prompt" is an
//! unambiguous answer to "what did this command print".
//!
//! The handshake, given a [`ReplConfig`]:
//!
//! 1. wait for the initial prompt (`first_prompt`);
//! 2. send `change_prompt` with the key substituted for `{key}`;
//! 3. if `strip_command` is set, wait for the literal key so the command echo
//!    is consumed before the new prompt is searched for;
//! 4. wait for the synchronized prompt (`next_prompt` with the key baked in).
//!
//! After that, [`PromptChannel::send`] is a plain request/response primitive.

use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, trace};

use crate::ansi;
use crate::error::SessionError;
use crate::session::{KEY_PLACEHOLDER, ReplConfig};
use crate::transport::{PtyTransport, Transport};

/// Generator for the per-session synchronization key.
pub type KeyGen = Box<dyn Fn() -> String>;

/// 32 alphanumeric characters from the thread-local CSPRNG.
///
/// Long enough that a collision with program output, or with another
/// session's key, is not a practical concern; alphanumeric so the key is
/// inert inside a regex and survives any REPL's echo unmangled.
pub fn random_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// A live, prompt-synchronized connection to one REPL process.
///
/// At most one request is in flight at a time; `send` takes `&mut self`
/// because matching the prompt against interleaved responses would be
/// meaningless.
pub struct PromptChannel {
    stream: Stream,
    /// `(?s)(.*?)` followed by the synchronized prompt; group 1 is the
    /// response text.
    response: Regex,
    timeout: Duration,
    append_newline: bool,
    strip_command: bool,
    strip_ansi: bool,
}

impl std::fmt::Debug for PromptChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptChannel")
            .field("response", &self.response)
            .field("timeout", &self.timeout)
            .field("append_newline", &self.append_newline)
            .field("strip_command", &self.strip_command)
            .field("strip_ansi", &self.strip_ansi)
            .finish_non_exhaustive()
    }
}

impl PromptChannel {
    /// Spawn the configured program in a PTY and synchronize on a fresh
    /// prompt.
    pub async fn open(config: &ReplConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let transport =
            PtyTransport::spawn(&config.command).map_err(|reason| SessionError::Spawn {
                command: config.command.clone(),
                reason,
            })?;
        Self::open_with(config, Box::new(transport), Box::new(random_key)).await
    }

    /// Like [`open`](Self::open), but with the transport and key generator
    /// supplied by the caller. This is how tests drive the protocol against a
    /// scripted program with a deterministic key.
    pub async fn open_with(
        config: &ReplConfig,
        transport: Box<dyn Transport>,
        keygen: KeyGen,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let timeout = config.timeout();
        let first_prompt = Regex::new(&config.first_prompt)
            .map_err(|e| SessionError::Config(format!("invalid `first_prompt` regex: {e}")))?;

        let key = keygen();
        let prompt_pattern = config.next_prompt.replace(KEY_PLACEHOLDER, &key);
        let prompt = Regex::new(&prompt_pattern)
            .map_err(|e| SessionError::Config(format!("invalid `next_prompt` regex: {e}")))?;
        let response = Regex::new(&format!("(?s)(.*?)(?:{prompt_pattern})"))
            .map_err(|e| SessionError::Config(format!("invalid `next_prompt` regex: {e}")))?;

        let mut stream = Stream {
            transport,
            buffer: String::new(),
        };

        let matched =
            stream
                .wait_for(&first_prompt, timeout)
                .await
                .ok_or_else(|| SessionError::Startup {
                    pattern: config.first_prompt.clone(),
                    timeout,
                })?;
        stream.consume(matched.end);
        debug!(command = %config.command, "got initial prompt");

        let mut change = config.change_prompt.replace(KEY_PLACEHOLDER, &key);
        if config.append_newline {
            change.push('\n');
        }
        stream.write(change.as_bytes())?;

        if config.strip_command {
            // The echoed change-prompt command contains the key too; consume
            // it so the echo cannot be taken for the synchronized prompt.
            let literal_key = Regex::new(&regex::escape(&key))
                .map_err(|e| SessionError::Config(format!("invalid key literal: {e}")))?;
            let matched = stream
                .wait_for(&literal_key, timeout)
                .await
                .ok_or(SessionError::PromptSync { timeout })?;
            stream.consume(matched.end);
        }

        let matched = stream
            .wait_for(&prompt, timeout)
            .await
            .ok_or(SessionError::PromptSync { timeout })?;
        stream.consume(matched.end);
        debug!("prompt synchronized");

        Ok(Self {
            stream,
            response,
            timeout,
            append_newline: config.append_newline,
            strip_command: config.strip_command,
            strip_ansi: config.strip_ansi,
        })
    }

    /// Send one command and return exactly the REPL's reply to it.
    ///
    /// A timeout here is fatal for the session: the stream position is no
    /// longer known, so any later match could belong to the stuck command.
    pub async fn send(&mut self, command: &str) -> Result<String, SessionError> {
        let mut sent = command.to_string();
        if self.append_newline {
            sent.push('\n');
        }
        self.stream.write(sent.as_bytes())?;
        trace!(command, "sent");

        let matched = self
            .stream
            .wait_for(&self.response, self.timeout)
            .await
            .ok_or_else(|| SessionError::ResponseTimeout {
                command: command.to_string(),
                timeout: self.timeout,
            })?;

        // Re-running the pattern on the unchanged buffer recovers group 1,
        // the text strictly before the prompt.
        let raw = self
            .response
            .captures(&self.stream.buffer)
            .and_then(|caps| caps.get(1))
            .map(|group| group.as_str().to_string())
            .unwrap_or_default();
        self.stream.consume(matched.end);

        Ok(self.clean(raw, &sent))
    }

    /// Post-process a captured response per the session config. ANSI
    /// stripping runs first so escape sequences interleaved with the echo do
    /// not break the prefix match.
    fn clean(&self, raw: String, sent: &str) -> String {
        let mut text = raw;
        if self.strip_ansi {
            text = ansi::strip_csi(&text);
        }
        if self.strip_command {
            let trimmed = text.trim().replace('\r', "");
            // If the echo was reformatted (or absent) the prefix match fails
            // and the trimmed text is returned as-is; no fuzzy matching.
            text = trimmed
                .strip_prefix(sent)
                .map(str::to_string)
                .unwrap_or(trimmed);
        }
        text
    }
}

/// A transport plus the rolling buffer of output not yet claimed by a match.
struct Stream {
    transport: Box<dyn Transport>,
    buffer: String,
}

impl Stream {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.transport.send_bytes(data).map_err(SessionError::Write)
    }

    /// Accumulate output until `re` matches the buffer or `timeout` elapses.
    ///
    /// The whole buffer is re-searched after every chunk, so a match split
    /// across read boundaries is found as soon as its last byte arrives.
    /// Returns the byte range of the match, or `None` on deadline or EOF
    /// (once the program exits, the buffer can never grow another match).
    async fn wait_for(&mut self, re: &Regex, timeout: Duration) -> Option<Range<usize>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(m) = re.find(&self.buffer) {
                return Some(m.range());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            match tokio::time::timeout(deadline - now, self.transport.recv_chunk()).await {
                Ok(Some(chunk)) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                Ok(None) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Drop the first `end` bytes of the buffer: a match and everything
    /// before it, once claimed.
    fn consume(&mut self, end: usize) {
        self.buffer.drain(..end);
    }
}
