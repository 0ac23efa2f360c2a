use anyhow::{Context, Result};
use clap::Parser;
use replscribe::{ReplSession, check_session, run_session};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "replscribe",
    about = "Run a scripted REPL session and print the captured transcript",
    version
)]
struct Args {
    /// Session document to run (reads standard input when omitted)
    #[arg(short, long)]
    session: Option<PathBuf>,

    /// Compare captured output against recorded expectations and fail on drift
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the session document.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let input = match &args.session {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read session from standard input")?;
            buf
        }
    };

    let mut session: ReplSession =
        serde_json::from_str(&input).context("Failed to parse session document")?;

    run_session(&mut session)
        .await
        .context("Failed to run session")?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &session).context("Failed to render session")?;
    writeln!(stdout)?;

    if args.check {
        let mismatches = check_session(&session);
        if !mismatches.is_empty() {
            for mismatch in &mismatches {
                eprintln!("{mismatch}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
