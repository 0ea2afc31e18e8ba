//! Process runner backed by `tokio::process`.
//!
//! Output is captured line by line and optionally forwarded to a log handler
//! while the process runs. The child is killed as soon as the governing
//! cancellation token fires or the configured timeout elapses.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ProcessRunnerOptions, RunArgs};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, RunResult};

/// Log output from a running process.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: chrono::DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Runs real processes on the host.
#[derive(Clone, Default)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
    log_handler: Option<LogHandler>,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self {
            options,
            log_handler: None,
        }
    }

    /// Set a log handler for streaming output lines.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    fn build_command(&self, args: &RunArgs) -> Command {
        let mut cmd = Command::new(&args.cmd);
        cmd.args(&args.args);
        if let Some(cwd) = &args.cwd {
            cmd.current_dir(cwd);
        }
        if !args.env.is_empty() {
            cmd.envs(&args.env);
        }
        cmd.kill_on_drop(true);

        if args.interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        cmd
    }

    fn collect_lines<R>(&self, reader: Option<R>, stream: LogStream) -> JoinHandle<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handler = if self.options.stream_logs {
            self.log_handler.clone()
        } else {
            None
        };

        tokio::spawn(async move {
            let mut output = String::new();
            let Some(reader) = reader else {
                return output;
            };
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                // Tools may emit bytes that are not UTF-8; keep the rest of the stream.
                let line = decode_line(&buf);
                output.push_str(&line);
                output.push('\n');
                if let Some(handler) = &handler {
                    handler(LogLine {
                        timestamp: Utc::now(),
                        stream,
                        message: line,
                    });
                }
            }
            output
        })
    }

    async fn wait_for_exit(
        &self,
        child: &mut tokio::process::Child,
        command_line: &str,
        cancel: &CancellationToken,
    ) -> RunnerResult<i32> {
        let timeout = self.options.timeout_seconds;
        let wait = async {
            if timeout > 0 {
                match tokio::time::timeout(Duration::from_secs(timeout), child.wait()).await {
                    Ok(status) => status.map(Some),
                    Err(_) => Ok(None),
                }
            } else {
                child.wait().await.map(Some)
            }
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => None,
            status = wait => Some(status),
        };

        match outcome {
            None => {
                warn!("Cancelling: {}", command_line);
                child.kill().await.ok();
                Err(RunnerError::Cancelled(command_line.to_string()))
            }
            Some(Ok(None)) => {
                child.kill().await.ok();
                Err(RunnerError::Timeout(timeout))
            }
            Some(Ok(Some(status))) => Ok(status.code().unwrap_or(-1)),
            Some(Err(e)) => Err(RunnerError::Io(e)),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &RunArgs, cancel: &CancellationToken) -> RunnerResult<RunResult> {
        let command_line = args.command_line();

        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled(command_line));
        }

        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", command_line);
            return Ok(RunResult::success(format!("[DRY-RUN] Command: {}", command_line)));
        }

        debug!("Executing: {}", command_line);

        let mut child = self.build_command(args).spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RunnerError::ExecutableNotFound(args.cmd.clone())
            } else {
                RunnerError::SpawnFailed {
                    command: args.cmd.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let stdout_task = self.collect_lines(child.stdout.take(), LogStream::Stdout);
        let stderr_task = self.collect_lines(child.stderr.take(), LogStream::Stderr);

        let exit_code = match self.wait_for_exit(&mut child, &command_line, cancel).await {
            Ok(code) => code,
            Err(e) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(e);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if exit_code == 0 {
            debug!("Process completed: {}", command_line);
        } else {
            error!("Process exited with code {}: {}", exit_code, command_line);
        }

        Ok(RunResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}
