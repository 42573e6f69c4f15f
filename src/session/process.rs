//! Transport over the stdin/stdout of a spawned program.
//!
//! Useful for lab consoles and `ssh -tt host` style wrappers: the program is
//! expected to print a prompt after every response.

use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace};

use super::transport::{Transport, TransportError, TransportResult};

/// Prompt pattern used when none is configured: a trailing line made of a
/// host-like token (starting with a letter) followed by `>`, `#`, `$` or `%`.
pub const DEFAULT_PROMPT: &str = r"(?:^|\n)[A-Za-z][\w.\-@/:~()\[\]]*[>#$%] ?$";

const READ_CHUNK: usize = 4096;

/// Line-oriented transport driving a child process.
pub struct ProcessTransport {
    identifier: String,
    prompt: Regex,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl std::fmt::Debug for ProcessTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTransport")
            .field("identifier", &self.identifier)
            .field("prompt", &self.prompt.as_str())
            .finish()
    }
}

impl ProcessTransport {
    /// Spawn `command_line` (split with shell quoting rules) and wait for the
    /// first prompt. `prompt` overrides [`DEFAULT_PROMPT`].
    pub async fn spawn(command_line: &str, prompt: Option<&str>) -> TransportResult<Self> {
        let argv = shell_words::split(command_line)
            .map_err(|e| TransportError::ConnectionFailed(format!("Invalid command line: {}", e)))?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TransportError::ConnectionFailed("Empty command line".to_string()))?;
        let prompt = Regex::new(prompt.unwrap_or(DEFAULT_PROMPT))
            .map_err(|e| TransportError::Other(format!("Invalid prompt pattern: {}", e)))?;

        debug!(program = %program, "Spawning device process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("Failed to spawn {}: {}", program, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("stdout not captured".to_string()))?;

        let mut transport = Self {
            identifier: command_line.to_string(),
            prompt,
            child,
            stdin,
            stdout,
        };
        let banner = transport.read_until_prompt().await?;
        trace!(banner = %banner, "Initial prompt received");
        Ok(transport)
    }

    async fn read_until_prompt(&mut self) -> TransportResult<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.stdout.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::Closed(format!(
                    "{} exited before printing a prompt",
                    self.identifier
                )));
            }
            buffer.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buffer).replace('\r', "");
            if let Some(m) = self.prompt.find(&text) {
                return Ok(text[..m.start()].to_string());
            }
        }
    }
}

fn strip_echo(output: &str, command: &str) -> String {
    let body = match output.split_once('\n') {
        Some((first, rest)) if first.trim() == command.trim() => rest,
        None if output.trim() == command.trim() => "",
        _ => output,
    };
    if body.is_empty() || body.ends_with('\n') {
        body.to_string()
    } else {
        format!("{}\n", body)
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn send(&mut self, command: &str) -> TransportResult<String> {
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        let raw = self.read_until_prompt().await?;
        Ok(strip_echo(&raw, command))
    }

    async fn close(&mut self) -> TransportResult<()> {
        // The program may already be gone; a failed write is not an error here.
        let _ = self.stdin.write_all(b"exit\n").await;
        let _ = self.stdin.flush().await;
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }
}
