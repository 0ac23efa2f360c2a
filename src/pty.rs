use anyhow::{Context, Result, bail};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use std::io::{self, Read, Write};
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A REPL process running inside a PTY.
///
/// The child is killed and reaped when the session is dropped, so an early
/// return or panic anywhere above cannot leak the process.
pub struct PtySession {
    #[allow(dead_code)]
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
}

impl PtySession {
    /// Spawn `command_line` in a fresh PTY.
    ///
    /// The command line is split on whitespace with single- and double-quote
    /// grouping, so `python3 -c 'import code; code.interact()'` spawns three
    /// arguments, not six. Returns the session together with a channel that
    /// yields output chunks as the program produces them; the channel closes
    /// when the program reaches EOF.
    pub fn spawn(command_line: &str) -> Result<(Self, UnboundedReceiver<Vec<u8>>)> {
        let parts = split_command_line(command_line);
        let Some((program, args)) = parts.split_first() else {
            bail!("Empty command line");
        };

        let pty_system = portable_pty::native_pty_system();
        let pty_size = PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        };
        let pair = pty_system.openpty(pty_size).context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn `{program}`"))?;

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;
        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        let session = PtySession {
            master: pair.master,
            child,
            writer,
        };

        Ok((session, spawn_reader(reader)))
    }

    /// Write data to the program's stdin.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Already-exited children make kill fail; wait still reaps them.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read the PTY on a dedicated thread, forwarding chunks into a channel the
/// async side can await. The thread ends at EOF or when the receiver is gone.
fn spawn_reader(mut reader: Box<dyn Read + Send>) -> UnboundedReceiver<Vec<u8>> {
    let (tx, rx): (UnboundedSender<Vec<u8>>, _) = mpsc::unbounded_channel();

    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    rx
}

/// Split a command line into program and arguments, honoring single and
/// double quotes. No escape processing inside quotes.
pub(crate) fn split_command_line(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        parts.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_command_line("lua -i"), vec!["lua", "-i"]);
    }

    #[test]
    fn test_split_quoted_argument() {
        assert_eq!(
            split_command_line("python3 -c 'import code; code.interact()'"),
            vec!["python3", "-c", "import code; code.interact()"]
        );
    }

    #[test]
    fn test_split_double_quotes() {
        assert_eq!(
            split_command_line(r#"sh -c "echo hi""#),
            vec!["sh", "-c", "echo hi"]
        );
    }

    #[test]
    fn test_split_empty_quoted_token() {
        assert_eq!(split_command_line("prog ''"), vec!["prog", ""]);
    }

    #[test]
    fn test_split_collapses_whitespace() {
        assert_eq!(split_command_line("  sh   -i  "), vec!["sh", "-i"]);
    }

    #[test]
    fn test_spawn_rejects_empty_command() {
        assert!(PtySession::spawn("   ").is_err());
    }
}
