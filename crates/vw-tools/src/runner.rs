//! Asynchronous subprocess execution.
//!
//! [`ToolInvocation`] is a builder in the style of a command line: set the
//! program and arguments, then either [`run`](ToolInvocation::run) to
//! completion or [`run_streaming`](ToolInvocation::run_streaming) to observe
//! output line by line. Both capture stdout and stderr merged into a single
//! buffer and both resolve to a [`RunOutput`] -- launch failures are reported
//! as `success == false` with a descriptive message, never as a panic or an
//! error across the await point, so callers have one uniform shape to branch
//! on.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default watchdog: 24 hours, to handle very long conversions.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Outcome of one subprocess invocation.
///
/// `success` is exit-status-zero. `output` is stdout and stderr merged; for
/// a process that never launched it holds the launch diagnostic instead.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub success: bool,
    pub output: String,
}

impl RunOutput {
    fn launch_failure(program: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: format!("failed to launch {program}: {reason}"),
        }
    }
}

/// A builder for constructing and executing external tool invocations.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolInvocation {
    /// Create a new invocation for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, s: impl Into<String>) -> Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the program to completion, capturing merged output.
    ///
    /// The caller's task suspends until the process exits; the runtime keeps
    /// its worker threads free. Exceeding the timeout kills the child and
    /// reports failure.
    pub async fn run(&self) -> RunOutput {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %program_name, args = ?self.args, "spawning");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return RunOutput::launch_failure(&program_name, e),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(out)) => RunOutput {
                success: out.status.success(),
                output: merge_output(&out.stdout, &out.stderr),
            },
            Ok(Err(e)) => RunOutput {
                success: false,
                output: format!("i/o error waiting for {program_name}: {e}"),
            },
            Err(_) => RunOutput {
                success: false,
                output: format!("{program_name} timed out after {:?}", self.timeout),
            },
        }
    }

    /// Execute the program, feeding each line of merged output to `on_line`
    /// as it arrives.
    ///
    /// When `cancel` fires the child is killed and awaited before this
    /// returns, so no orphan process outlives the call. The transcoder
    /// rewrites its stats line with bare carriage returns, so line splitting
    /// here accepts both `\r` and `\n`.
    pub async fn run_streaming(
        &self,
        mut on_line: impl FnMut(&str),
        cancel: Option<CancellationToken>,
    ) -> RunOutput {
        let program_name = self.program_name();
        let cancel = cancel.unwrap_or_default();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %program_name, args = ?self.args, "spawning (streaming)");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return RunOutput::launch_failure(&program_name, e),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut buffer = String::new();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(line) => {
                        on_line(&line);
                        buffer.push_str(&line);
                        buffer.push('\n');
                    }
                    // Both output streams closed; the process is done or
                    // about to be.
                    None => break,
                },
                _ = cancel.cancelled() => {
                    tracing::info!(program = %program_name, "terminating on cancellation");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    buffer.push_str("terminated by caller\n");
                    return RunOutput {
                        success: false,
                        output: buffer,
                    };
                }
                _ = &mut deadline => {
                    tracing::warn!(program = %program_name, "killing after timeout");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    buffer.push_str(&format!("{program_name} timed out after {:?}\n", self.timeout));
                    return RunOutput {
                        success: false,
                        output: buffer,
                    };
                }
            }
        }

        match child.wait().await {
            Ok(status) => RunOutput {
                success: status.success(),
                output: buffer,
            },
            Err(e) => RunOutput {
                success: false,
                output: format!("{buffer}i/o error waiting for {program_name}: {e}"),
            },
        }
    }
}

/// Merge captured stdout and stderr into one buffer, stdout first.
fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (true, true) => String::new(),
    }
}

/// Forward a child stream to the line channel, splitting on `\r` as well as
/// `\n`.
async fn forward_lines<R>(mut stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncReadExt + Unpin,
{
    let mut pending = String::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                pending.push_str(&String::from_utf8_lossy(&chunk[..n]));
                while let Some(idx) = pending.find(['\r', '\n']) {
                    let line: String = pending.drain(..=idx).collect();
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.is_empty() && tx.send(line.to_string()).is_err() {
                        return;
                    }
                }
            }
            Err(_) => break,
        }
    }

    let tail = pending.trim_end();
    if !tail.is_empty() {
        let _ = tx.send(tail.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_output_and_status() {
        let out = ToolInvocation::new("sh")
            .args(["-c", "echo hello"])
            .run()
            .await;
        assert!(out.success);
        assert!(out.output.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure_not_error() {
        let out = ToolInvocation::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run()
            .await;
        assert!(!out.success);
        assert!(out.output.contains("boom"));
    }

    #[tokio::test]
    async fn launch_failure_is_reported_in_output() {
        let out = ToolInvocation::new("/no/such/binary_xyz").run().await;
        assert!(!out.success);
        assert!(out.output.contains("failed to launch"));
    }

    #[tokio::test]
    async fn stdout_and_stderr_are_merged() {
        let out = ToolInvocation::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run()
            .await;
        assert!(out.success);
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let out = ToolInvocation::new("sleep")
            .arg("30")
            .timeout(Duration::from_millis(100))
            .run()
            .await;
        assert!(!out.success);
        assert!(out.output.contains("timed out"));
    }

    #[tokio::test]
    async fn streaming_delivers_lines_in_order() {
        let mut seen = Vec::new();
        let out = ToolInvocation::new("sh")
            .args(["-c", "printf 'one\\ntwo\\nthree\\n'"])
            .run_streaming(|line| seen.push(line.to_string()), None)
            .await;
        assert!(out.success);
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn streaming_splits_carriage_returns() {
        let mut seen = Vec::new();
        let out = ToolInvocation::new("sh")
            .args(["-c", "printf 'a\\rb\\rc\\n'"])
            .run_streaming(|line| seen.push(line.to_string()), None)
            .await;
        assert!(out.success);
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cancellation_terminates_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let out = ToolInvocation::new("sleep")
            .arg("30")
            .run_streaming(|_| {}, Some(cancel))
            .await;

        assert!(!out.success);
        assert!(out.output.contains("terminated by caller"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
