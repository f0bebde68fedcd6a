// Shell Runner
// Executes build commands under sh (cmd on Windows) with a private environment

use crate::error::ExecError;
use crate::runners::{OutputCallback, ProcessExecutor};

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long output may keep flowing once the shell has exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Shell used to interpret command lines
fn shell_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "windows") {
        ("cmd", &["/C"])
    } else {
        ("sh", &["-c"])
    }
}

/// Process executor that runs each command line through a shell.
///
/// The child sees only the environment it is given: the parent environment is
/// cleared first so that removed variables really are absent.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands from this directory instead of the current one
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill commands that run longer than `timeout` (no limit by default)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl ProcessExecutor for ShellExecutor {
    async fn execute(
        &self,
        command_line: &str,
        env: &HashMap<String, String>,
        on_output: Option<OutputCallback>,
    ) -> Result<(), ExecError> {
        let (shell_cmd, shell_args) = shell_command();

        let mut cmd = Command::new(shell_cmd);
        cmd.args(shell_args);
        cmd.arg(command_line);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.env_clear();
        cmd.envs(env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ExecError::Launch {
            command: command_line.to_string(),
            source,
        })?;

        let on_output = on_output.map(Arc::new);
        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| forward_lines(stdout, on_output.clone(), false));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| forward_lines(stderr, on_output, true));

        let readers: Vec<JoinHandle<()>> =
            [stdout_handle, stderr_handle].into_iter().flatten().collect();

        let wait_result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    let _ = child.kill().await;
                    drain_output(readers).await;
                    return Err(ExecError::TimedOut {
                        command: command_line.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
            },
            None => child.wait().await,
        };

        drain_output(readers).await;

        let status = wait_result.map_err(|source| ExecError::Launch {
            command: command_line.to_string(),
            source,
        })?;

        debug!(command = command_line, code = ?status.code(), "command finished");

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Exit {
                command: command_line.to_string(),
                code: status.code(),
            })
        }
    }
}

/// Wait briefly for the output readers, then detach them.
///
/// Background processes started by the command inherit its pipes and may keep
/// them open long after the shell exits.
async fn drain_output(mut readers: Vec<JoinHandle<()>>) {
    let drained = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    })
    .await;

    if drained.is_err() {
        debug!("output pipes still open after the shell exited");
        for reader in &readers {
            reader.abort();
        }
    }
}

fn forward_lines<R>(
    reader: R,
    on_output: Option<Arc<OutputCallback>>,
    is_error: bool,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(callback) = &on_output {
                callback(&line, is_error);
            }
        }
    })
}
