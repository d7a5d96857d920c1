//! # Process Invocation
//!
//! Every external tool (`buildah`, `skopeo`, `cachi2`, `git`) is reached
//! through the [`CommandRunner`] trait. This is the only boundary to the
//! outside world besides the filesystem, which lets the orchestration logic be
//! tested without any of those tools installed.
//!
//! - [`SystemCommandRunner`] spawns real processes, captures their output and
//!   kills the child when the run is cancelled.
//! - `MockCommandRunner` (test builds only) is a deterministic fake that
//!   records every invocation and replies from a table of scripted responses.
//!
//! Invocations are strictly sequential: `invoke` blocks until the child exits.

#[cfg(test)]
mod mock;

#[cfg(test)]
pub use mock::MockCommandRunner;

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// How often a running child is checked for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit status and captured output of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed invocation with the given exit status and stderr.
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Converts a non-zero exit into `Error::ExternalTool`.
    pub fn into_result(self, tool: &str, args: &[String]) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ExternalTool {
                tool: tool.to_string(),
                args: args.to_vec(),
                status: self.status,
                stderr: self.stderr,
            })
        }
    }
}

/// Abstraction over external process execution - allows mocking in tests
pub trait CommandRunner: Send + Sync {
    /// Runs `name` with `args` and waits for it to exit.
    ///
    /// A non-zero exit is *not* an error at this level; it is reported in the
    /// returned `CommandOutput`. Errors are reserved for processes that could
    /// not be started and for cancellation.
    fn invoke(&self, name: &str, args: &[String]) -> Result<CommandOutput>;

    /// Runs a command and fails with `Error::ExternalTool` on non-zero exit.
    fn run(&self, name: &str, args: &[String]) -> Result<()> {
        self.invoke(name, args)?.into_result(name, args)?;
        Ok(())
    }

    /// Runs a command and returns its stdout, failing on non-zero exit.
    fn run_with_output(&self, name: &str, args: &[String]) -> Result<String> {
        Ok(self.invoke(name, args)?.into_result(name, args)?.stdout)
    }
}

/// The default implementation of `CommandRunner`, which spawns real
/// processes with `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    cancel: CancellationToken,
    echo_output: bool,
}

impl SystemCommandRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            echo_output: false,
        }
    }

    /// Mirror every line the child writes to this process's stderr while it
    /// runs, so long builds show progress in the CI log.
    pub fn with_echo(mut self, echo_output: bool) -> Self {
        self.echo_output = echo_output;
        self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn invoke(&self, name: &str, args: &[String]) -> Result<CommandOutput> {
        self.cancel.check()?;
        debug!("Executing {} {}", name, args.join(" "));

        let mut child = Command::new(name)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                tool: name.to_string(),
                source,
            })?;

        // Both pipes are drained on their own threads so a chatty child can
        // never block on a full pipe while we poll for exit.
        let stdout = child.stdout.take().map(|pipe| collect(pipe, self.echo_output));
        let stderr = child.stderr.take().map(|pipe| collect(pipe, self.echo_output));

        let status = loop {
            if self.cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout.map(|h| h.join());
                let _ = stderr.map(|h| h.join());
                return Err(Error::Cancelled);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: join_output(stdout),
            stderr: join_output(stderr),
        })
    }
}

/// Drains `pipe` until EOF. Bytes that are not valid UTF-8 are replaced, never
/// a reason to stop reading: a closed pipe would kill the child with SIGPIPE.
fn collect<R: Read + Send + 'static>(pipe: R, echo: bool) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut captured = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if echo {
                        eprintln!("{}", line.trim_end_matches(['\r', '\n']));
                    }
                    captured.push_str(&line);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        captured
    })
}

fn join_output(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Convenience for building owned argument vectors from string literals.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
