//! Bounded subprocess execution.
//!
//! Commands are argv arrays from start to finish; nothing is ever
//! interpolated into a shell string, so injection is structurally
//! impossible. Each run is independent: the only shared state is the
//! enable flag and deadline fixed at construction time.

use crate::error::{ConvertError, ConvertResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes one argv with a deadline. Implemented by [`SafeExec`];
/// converters depend on the trait so tests can count or record invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String]) -> ConvertResult<CommandOutput>;
}

/// Subprocess runner with a global kill-switch and a per-run timeout.
pub struct SafeExec {
    enabled: bool,
    timeout: Duration,
    kill_signal: String,
}

impl SafeExec {
    pub fn new(enabled: bool, timeout: Duration, kill_signal: String) -> Self {
        SafeExec {
            enabled,
            timeout,
            kill_signal,
        }
    }
}

/// Drain stdout/stderr concurrently with waiting, so a chatty child can
/// never deadlock on a full pipe.
async fn collect_output(
    child: &mut Child,
) -> std::io::Result<(std::process::ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let read_stdout = async {
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut stdout).await?;
        }
        std::io::Result::Ok(())
    };
    let read_stderr = async {
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut stderr).await?;
        }
        std::io::Result::Ok(())
    };

    let (status, _, _) = tokio::try_join!(child.wait(), read_stdout, read_stderr)?;
    Ok((status, stdout, stderr))
}

/// Signal the child's entire process group. Killing only the direct child
/// would leave its delegates running.
#[cfg(unix)]
fn kill_process_group(child: &Child, program: &str) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return; // already exited
    };
    if let Err(e) = signal::kill(Pid::from_raw(-(pid as i32)), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            tracing::warn!(command = %program, pid, error = ?e, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child, _program: &str) {}

#[async_trait]
impl CommandRunner for SafeExec {
    async fn run(&self, argv: &[String]) -> ConvertResult<CommandOutput> {
        if !self.enabled {
            return Err(ConvertError::Disabled);
        }

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ConvertError::InvalidCommand("empty argv".to_string()))?;

        let start = std::time::Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down the whole tree:
        // conversion tools fork delegates (e.g. ghostscript for PDFs).
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(ConvertError::Spawn)?;

        match tokio::time::timeout(self.timeout, collect_output(&mut child)).await {
            Ok(Ok((status, stdout, stderr))) => {
                let stdout = String::from_utf8_lossy(&stdout).into_owned();
                let stderr = String::from_utf8_lossy(&stderr).into_owned();

                if status.success() {
                    tracing::debug!(
                        command = %program,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Command completed"
                    );
                    Ok(CommandOutput { stdout, stderr })
                } else {
                    let code = status.code().unwrap_or(-1);
                    tracing::warn!(
                        command = %program,
                        status = code,
                        stderr = %stderr,
                        "Command failed"
                    );
                    Err(ConvertError::ExitStatus {
                        status: code,
                        stdout,
                        stderr,
                    })
                }
            }
            Ok(Err(e)) => Err(ConvertError::Io(e)),
            Err(_elapsed) => {
                kill_process_group(&child, program);
                if let Err(e) = child.kill().await {
                    tracing::warn!(command = %program, error = %e, "Failed to kill timed-out command");
                }
                tracing::warn!(
                    command = %program,
                    timeout_secs = self.timeout.as_secs(),
                    signal = %self.kill_signal,
                    "Command timed out"
                );
                Err(ConvertError::TimedOut {
                    signal: self.kill_signal.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn runner(timeout_ms: u64) -> SafeExec {
        SafeExec::new(true, Duration::from_millis(timeout_ms), "SIGTERM".to_string())
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let output = runner(5_000).run(&argv(&["echo", "hello"])).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_reports_status() {
        let result = runner(5_000).run(&argv(&["sh", "-c", "exit 3"])).await;
        match result {
            Err(ConvertError::ExitStatus { status, .. }) => assert_eq!(status, 3),
            other => panic!("expected ExitStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let result = runner(5_000)
            .run(&argv(&["filestore-no-such-binary"]))
            .await;
        match result {
            Err(ConvertError::Spawn(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("expected Spawn error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout_kills_and_names_signal() {
        let start = std::time::Instant::now();
        let result = runner(100).run(&argv(&["sleep", "10"])).await;
        match result {
            Err(ConvertError::TimedOut { signal }) => assert_eq!(signal, "SIGTERM"),
            other => panic!("expected TimedOut error, got {:?}", other),
        }
        // Returned promptly after the deadline, not after the sleep
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_descendants_too() {
        // Unique sleep duration so pgrep only finds our own grandchild
        let marker = format!("27.{}", std::process::id());
        let script = format!("sleep {marker} & wait");

        let result = runner(200).run(&argv(&["sh", "-c", &script])).await;
        assert!(matches!(result, Err(ConvertError::TimedOut { .. })));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let survivors = std::process::Command::new("pgrep")
            .args(["-f", &format!("sleep {marker}")])
            .output()
            .unwrap();
        assert!(
            !survivors.status.success(),
            "background child of the timed-out command still running: {}",
            String::from_utf8_lossy(&survivors.stdout)
        );
    }

    #[tokio::test]
    async fn disabled_runner_refuses_everything() {
        let exec = SafeExec::new(false, Duration::from_secs(5), "SIGTERM".to_string());
        let result = exec.run(&argv(&["echo", "hello"])).await;
        assert!(matches!(result, Err(ConvertError::Disabled)));
    }

    #[tokio::test]
    async fn empty_argv_rejected() {
        let result = runner(5_000).run(&[]).await;
        assert!(matches!(result, Err(ConvertError::InvalidCommand(_))));
    }
}
