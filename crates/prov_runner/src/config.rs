//! Invocation and runner configuration types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArgs {
    /// Executable to run
    pub cmd: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the parent environment
    pub env: HashMap<String, String>,
    /// Attach the process to the caller's terminal instead of capturing output
    pub interactive: bool,
}

impl RunArgs {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Whether `arg` appears verbatim in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// The invocation rendered as a single command line, for logging and
    /// mock matching.
    pub fn command_line(&self) -> String {
        let mut line = self.cmd.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Options for [`crate::ProcessRunner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessRunnerOptions {
    /// Print commands without executing them
    pub dry_run: bool,
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Forward captured lines to the log handler as they arrive
    pub stream_logs: bool,
}

impl Default for ProcessRunnerOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            timeout_seconds: 0,
            stream_logs: false,
        }
    }
}

impl ProcessRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}
