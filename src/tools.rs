//! External tool invocation.
//!
//! Every external program the pipeline depends on (guessit, encfs,
//! fusermount, rclone, acd_cli) is described as a [`ToolCommand`]: a program
//! path plus an argument vector. Nothing is ever passed through a shell, so
//! file names with quotes, spaces or `$` reach the tool untouched.
//!
//! The [`CommandRunner`] trait is the seam between the pipeline and the
//! operating system. [`SystemRunner`] is the production implementation; it
//! enforces the command's timeout by polling the child and killing it once
//! the deadline passes, so a hung tool cannot hang the whole job.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running child is checked against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error while running {program}: {source}")]
    Io {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?} and was killed")]
    TimedOut { program: PathBuf, timeout: Duration },
}

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment variables for the child only.
    pub env: Vec<(OsString, OsString)>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    /// Capture stdout instead of inheriting it.
    pub capture_stdout: bool,
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            capture_stdout: false,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// File name of the program, for log lines.
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// True when the argument list contains `arg`.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Shell-like rendering for logs. Never executed.
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the child was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout (empty unless `capture_stdout` was set).
    pub stdout: Vec<u8>,
}

impl ToolOutput {
    /// Exit code 0 is the only success signal.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands to completion.
pub trait CommandRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        log::debug!("running {}", command);
        let io_err = |source| ToolError::Io {
            program: command.program.clone(),
            source,
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if command.capture_stdout {
                Stdio::piped()
            } else {
                Stdio::inherit()
            });

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        // Drain stdout on a separate thread so a chatty child can't block
        // on a full pipe while we wait for it.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).map(|_| buf)
            })
        });

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            feed_stdin(&mut child, &mut stdin, input).map_err(io_err)?;
        }

        let status = match command.timeout {
            None => child.wait().map_err(io_err)?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(io_err)? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        log::warn!("{} timed out after {:?}, killing it", command.name(), timeout);
                        reap(&mut child);
                        return Err(ToolError::TimedOut {
                            program: command.program.clone(),
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = match reader {
            Some(handle) => match handle.join() {
                Ok(result) => result.map_err(io_err)?,
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        };

        Ok(ToolOutput {
            code: status.code(),
            stdout,
        })
    }
}

/// Write `input` to a child's stdin.
///
/// A child that exits without reading its input closes the pipe; its exit
/// code tells the real story, so `BrokenPipe` is not an error. Any other
/// write error kills and reaps the child before it is returned.
fn feed_stdin(child: &mut Child, stdin: &mut impl Write, input: &str) -> std::io::Result<()> {
    match stdin.write_all(input.as_bytes()) {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => {
            reap(child);
            Err(e)
        }
        _ => Ok(()),
    }
}

/// Kill a child and wait for it so it doesn't linger as a zombie.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("kill failed: {e}");
    }
    if let Err(e) = child.wait() {
        log::debug!("wait failed: {e}");
    }
}

/// Render a path argument for tools that take `remote:path` style strings.
pub fn remote_path(remote: &str, path: &Path) -> OsString {
    let mut out = OsString::from(format!("{remote}:"));
    out.push(path.as_os_str());
    out
}
