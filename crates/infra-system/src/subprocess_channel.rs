// Subprocess command channel
// reason: tokio::process for async child management, nix for graceful termination
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use guestctl_core::domain::{Machine, StreamTag};
use guestctl_core::port::{
    ChannelError, CommandChannel, CommandRequest, OutputSink, TimeProvider,
};

use crate::transport::Transport;

/// Bytes read from a pipe per chunk
const READ_CHUNK_SIZE: usize = 8192;

/// Grace period between SIGTERM and SIGKILL for a timed out command (5s)
const GRACEFUL_TERMINATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment forwarded to the child process by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "SSH_AUTH_SOCK",
    "VAGRANT_CWD",
    "VAGRANT_HOME",
];

/// Privilege wrapper used on the guest by default
pub const DEFAULT_SUDO: &[&str] = &["sudo", "-n"];

/// Command channel backed by a host child process
///
/// The transport decides which process (`sh`, `ssh`, `vagrant`); this type
/// handles privilege wrapping, environment filtering, output streaming and
/// the optional deadline.
pub struct SubprocessChannel {
    transport: Transport,
    time_provider: Arc<dyn TimeProvider>,
    sudo: Vec<String>,
    env_allowlist: Vec<String>,
    timeout: Option<Duration>,
}

impl SubprocessChannel {
    /// Create a new subprocess channel
    ///
    /// # Example
    /// ```ignore
    /// let channel = SubprocessChannel::new(Transport::Local, Arc::new(SystemTimeProvider))
    ///     .with_timeout(Some(Duration::from_secs(30)));
    /// ```
    pub fn new(transport: Transport, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            transport,
            time_provider,
            sudo: DEFAULT_SUDO.iter().map(|s| s.to_string()).collect(),
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            timeout: None,
        }
    }

    /// Privilege wrapper; empty runs privileged commands as-is
    pub fn with_sudo(mut self, sudo: Vec<String>) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn with_env_allowlist(mut self, env_allowlist: Vec<String>) -> Self {
        self.env_allowlist = env_allowlist;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        env.filter(|(k, _)| self.env_allowlist.contains(k)).collect()
    }

    /// Command text as run on the guest
    fn guest_command(&self, request: &CommandRequest) -> Result<String, ChannelError> {
        if !request.privileged || self.sudo.is_empty() {
            return Ok(request.command.clone());
        }

        let words = self
            .sudo
            .iter()
            .map(String::as_str)
            .chain(["sh", "-c", request.command.as_str()]);
        shlex::try_join(words).map_err(|e| ChannelError::InvalidCommand(e.to_string()))
    }

    fn spawn(&self, machine: &Machine, request: &CommandRequest) -> Result<Child, ChannelError> {
        let guest_command = self.guest_command(request)?;
        let launch = self.transport.launch(machine, &guest_command);

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .env_clear()
            .envs(self.filter_env(std::env::vars()))
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &launch.current_dir {
            command.current_dir(dir);
        }

        command
            .spawn()
            .map_err(|e| ChannelError::SpawnFailed(format!("{}: {}", launch.program, e)))
    }

    /// Forward stdout/stderr chunks to `sink` until both pipes close, then reap
    async fn pump(child: &mut Child, sink: &mut OutputSink<'_>) -> Result<ExitStatus, ChannelError> {
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChannelError::IoError("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ChannelError::IoError("stderr not captured".to_string()))?;

        let mut out_buf = vec![0u8; READ_CHUNK_SIZE];
        let mut err_buf = vec![0u8; READ_CHUNK_SIZE];
        let mut out_text = Utf8Carry::default();
        let mut err_text = Utf8Carry::default();
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => {
                    let n = read.map_err(|e| ChannelError::IoError(e.to_string()))?;
                    if n == 0 {
                        out_open = false;
                        out_text.finish(StreamTag::Stdout, sink);
                    } else {
                        out_text.feed(StreamTag::Stdout, &out_buf[..n], sink);
                    }
                }
                read = stderr.read(&mut err_buf), if err_open => {
                    let n = read.map_err(|e| ChannelError::IoError(e.to_string()))?;
                    if n == 0 {
                        err_open = false;
                        err_text.finish(StreamTag::Stderr, sink);
                    } else {
                        err_text.feed(StreamTag::Stderr, &err_buf[..n], sink);
                    }
                }
            }
        }

        child
            .wait()
            .await
            .map_err(|e| ChannelError::IoError(e.to_string()))
    }

    /// SIGTERM first, then SIGKILL after the grace period
    async fn terminate(child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                info!(pid = %pid, "Sending SIGTERM to timed out command");
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(GRACEFUL_TERMINATION_TIMEOUT, child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
                warn!(pid = %pid, "Command did not exit after SIGTERM, sending SIGKILL");
            }
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill timed out command");
        }
    }

    fn check_status(&self, status: ExitStatus) -> Result<(), ChannelError> {
        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(255) if self.transport.reserves_exit_255() => Err(ChannelError::ConnectFailed(
                "ssh exited with status 255".to_string(),
            )),
            Some(code) => Err(ChannelError::NonZeroExit { code }),
            None => Err(ChannelError::Signaled),
        }
    }
}

#[async_trait]
impl CommandChannel for SubprocessChannel {
    async fn execute(
        &self,
        machine: &Machine,
        request: &CommandRequest,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), ChannelError> {
        let start_time = self.time_provider.now_millis();

        info!(
            machine = %machine,
            transport = self.transport.name(),
            privileged = request.privileged,
            timeout_ms = ?self.timeout.map(|t| t.as_millis()),
            "Starting guest command"
        );

        let mut child = self.spawn(machine, request)?;

        let writer = match (child.stdin.take(), request.stdin.clone()) {
            (Some(mut stdin), Some(bytes)) => Some(tokio::spawn(async move {
                // The command may exit without reading all of its input
                if let Err(e) = stdin.write_all(&bytes).await {
                    debug!(error = %e, "Guest command closed stdin early");
                }
            })),
            _ => None,
        };

        let status = match self.timeout {
            Some(limit) => match timeout(limit, Self::pump(&mut child, sink)).await {
                Ok(status) => status,
                Err(_) => {
                    Self::terminate(&mut child).await;
                    warn!(
                        machine = %machine,
                        timeout_ms = limit.as_millis() as u64,
                        "Guest command timed out"
                    );
                    return Err(ChannelError::Timeout(limit.as_millis() as u64));
                }
            },
            None => Self::pump(&mut child, sink).await,
        }?;

        if let Some(writer) = writer {
            let _ = writer.await;
        }

        let duration_ms = self.time_provider.now_millis() - start_time;
        info!(
            machine = %machine,
            duration_ms = %duration_ms,
            exit_code = ?status.code(),
            "Guest command completed"
        );

        self.check_status(status)
    }
}

/// Decodes a byte stream as UTF-8 without splitting multi-byte characters
/// across chunks
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn feed(&mut self, tag: StreamTag, bytes: &[u8], sink: &mut OutputSink<'_>) {
        self.pending.extend_from_slice(bytes);

        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: hold it back for the next chunk
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        if complete == 0 {
            return;
        }

        let rest = self.pending.split_off(complete);
        sink(tag, &String::from_utf8_lossy(&self.pending));
        self.pending = rest;
    }

    fn finish(&mut self, tag: StreamTag, sink: &mut OutputSink<'_>) {
        if !self.pending.is_empty() {
            sink(tag, &String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}
