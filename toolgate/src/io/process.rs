//! Helpers for running child processes with timeouts and bounded output.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Parameters for one shell invocation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Shell used as `<shell> -c <command>`.
    pub shell: String,
    pub command: String,
    pub workdir: PathBuf,
    /// Variables layered over the inherited environment.
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
    pub stdout_limit_bytes: usize,
    pub stderr_limit_bytes: usize,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit code; on unix a signal death is reported as `-<signal>`.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// Abstraction over process execution so gating can be tested without spawning.
pub trait CommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Runs commands through a real shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let mut cmd = Command::new(&request.shell);
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.workdir)
            .envs(&request.env);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout can take down grandchildren too.
            cmd.process_group(0);
        }
        run_command_with_timeout(
            cmd,
            request.timeout,
            request.stdout_limit_bytes,
            request.stderr_limit_bytes,
        )
    }
}

/// How long readers get to hit EOF once the process group has been killed.
const READER_GRACE: Duration = Duration::from_secs(1);

type StreamResult = Result<(Vec<u8>, usize)>;

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. The limits bound how much of each
/// stream is kept in memory (bytes beyond them are discarded while still draining the pipe).
/// The timeout covers both the child and its output pipes: a background process that keeps
/// a pipe open past the deadline counts as a timeout too. On timeout the process group is
/// killed, the child reaped, and `timed_out` set; readers that still have not finished
/// after a short grace period are abandoned with whatever they had not delivered.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), stdout_limit_bytes, stderr_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    stdout_limit_bytes: usize,
    stderr_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, stdout_limit_bytes);
    let stderr_rx = spawn_reader(stderr, stderr_limit_bytes);

    let deadline = Instant::now() + timeout;
    let pid = child.id();
    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            terminate(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    let mut stdout_result = recv_until(&stdout_rx, deadline);
    let mut stderr_result = recv_until(&stderr_rx, deadline);
    if stdout_result.is_none() || stderr_result.is_none() {
        if !timed_out {
            warn!(
                timeout_secs = timeout.as_secs(),
                "output still open past the timeout, killing process group"
            );
            timed_out = true;
            kill_group(pid)?;
        }
        let grace = Instant::now() + READER_GRACE;
        if stdout_result.is_none() {
            stdout_result = recv_until(&stdout_rx, grace);
        }
        if stderr_result.is_none() {
            stderr_result = recv_until(&stderr_rx, grace);
        }
    }

    let (stdout, stdout_truncated) = stdout_result
        .unwrap_or_else(abandoned)
        .context("collect stdout")?;
    let (stderr, stderr_truncated) = stderr_result
        .unwrap_or_else(abandoned)
        .context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    let exit_code = exit_code(status);
    debug!(exit_code, timed_out, "command finished");
    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Kill the child and, on unix, the process group it leads.
fn terminate(child: &mut Child) -> Result<()> {
    kill_group(child.id())?;
    match child.kill() {
        Ok(()) => Ok(()),
        // Already gone (killed with its group).
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(e).context("kill command"),
    }
}

/// SIGKILL every process in the group led by `pid`. A group that no longer exists is fine.
#[cfg(unix)]
fn kill_group(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).context("process id out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pgid, "process group already gone");
            Ok(())
        }
        Err(errno) => Err(errno).with_context(|| format!("kill process group {pgid}")),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) -> Result<()> {
    Ok(())
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone when the reader was abandoned.
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

/// `None` when the reader has not finished by `deadline`.
fn recv_until(rx: &Receiver<StreamResult>, deadline: Instant) -> Option<StreamResult> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(anyhow!("output reader thread panicked"))),
    }
}

fn abandoned() -> StreamResult {
    debug!("output reader abandoned after kill");
    Ok((Vec::new(), 0))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
