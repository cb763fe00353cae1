//! Utilities for running external system tools (`tc`, `ip`, `ethtool`, ...).
//!
//! Every invocation is bounded by a timeout: a hung kernel query must never stall the caller
//! forever. On timeout the child process is killed.

use std::{ffi::OsStr, fmt, io, process, time::Duration};

use tokio::process::Command;

/// Errors returned by [`Runner`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The program could not be spawned or waited on.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The program did not finish in time and was killed.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    /// The program exited with a non-zero status.
    #[error("non-zero exit status ({}): {}", .0.status, .0.stderr.trim())]
    NonZero(Output),
}

impl Error {
    /// Returns `true` if the program itself is missing from the system.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }

    /// Returns the standard error of a failed invocation, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZero(output) => Some(&output.stderr),
            _ => None,
        }
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct Output {
    /// Exit status.
    pub status: process::ExitStatus,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            status: value.status,
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

/// Result alias for command invocations.
pub type Result<T> = std::result::Result<T, Error>;

/// Runs external programs with a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    timeout: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl Runner {
    /// Timeout applied when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a runner that kills any command running longer than `timeout`.
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `program` with `args`. Fails on spawn errors, on timeout, and on non-zero exit.
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(process::Stdio::null())
            .stderr(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(cmd = %CmdLine(&cmd), "running command");

        let result = tokio::time::timeout(self.timeout, cmd.output()).await;
        let output: Output = match result {
            Ok(output) => output?.into(),
            Err(_) => {
                tracing::debug!(cmd = %CmdLine(&cmd), timeout = ?self.timeout, "command timed out");
                return Err(Error::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            tracing::debug!(
                ?output.stderr,
                ?output.status,
                cmd = %CmdLine(&cmd),
                "command returned non-zero status"
            );
            return Err(Error::NonZero(output));
        }

        Ok(output)
    }
}

/// Renders a command as a shell-like line for logs.
struct CmdLine<'a>(&'a Command);

impl fmt::Display for CmdLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let std = self.0.as_std();
        write!(f, "{}", std.get_program().to_string_lossy())?;
        for arg in std.get_args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
