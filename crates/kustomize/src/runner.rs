// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Execution of secret generator commands.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::Error;

#[cfg(test)]
#[path = "./runner_test.rs"]
mod runner_test;

/// Timeout applied to generator commands that do not set `timeoutSeconds`.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a shell command and captures its standard output.
pub trait CommandRunner: std::fmt::Debug {
    /// Run `command` in `cwd`, failing once `timeout` elapses.
    ///
    /// A timeout error message always contains `killed`.
    fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> crate::Result<Vec<u8>>;

    /// Timeout for commands that do not set their own.
    fn default_timeout(&self) -> Duration {
        DEFAULT_COMMAND_TIMEOUT
    }
}

/// Shared flag that cancels outstanding commands.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs commands through `sh -c`, each in its own process group.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    cancel: CancellationToken,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            cancel: CancellationToken::default(),
            poll_interval: Duration::from_millis(10),
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl CommandRunner for ShellCommandRunner {
    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    #[tracing::instrument(skip(self, cwd, timeout), fields(cwd = %cwd.display()))]
    fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> crate::Result<Vec<u8>> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // In-memory loaders have roots that do not exist on disk.
        if cwd.is_dir() {
            cmd.current_dir(cwd);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| Error::CommandFailed {
            command: command.to_string(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // Processes left in the group keep the pipes open after `sh` exits, so
        // the deadline covers the readers too.
        let deadline = Instant::now() + timeout;
        let mut exited = None;
        let status = loop {
            if exited.is_none() {
                exited = child.try_wait()?;
            }
            if let Some(status) = exited {
                if stdout.is_finished() && stderr.is_finished() {
                    break status;
                }
            }
            if self.cancel.is_cancelled() {
                kill_group(&mut child);
                return Err(Error::Cancelled(command.to_string()));
            }
            if Instant::now() >= deadline {
                tracing::warn!(?timeout, "command timed out");
                kill_group(&mut child);
                return Err(Error::GeneratorTimeout {
                    command: command.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            std::thread::sleep(self.poll_interval);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

/// Read a pipe to the end on its own thread so the child never blocks on a
/// full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Kill the child and everything it spawned, then reap it.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Ok(pid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
