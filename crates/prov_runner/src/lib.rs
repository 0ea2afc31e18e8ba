//! # prov_runner
//!
//! Process execution boundary for the provisioning orchestrator.
//!
//! Every external tool invocation goes through the [`CommandRunner`] trait,
//! so orchestration code can be exercised against [`MockCommandRunner`]
//! without the tool installed.
//!
//! # Features
//!
//! - **Process Runner**: `tokio::process` execution with cancellation and timeouts
//! - **Dry-Run Mode**: Log commands without executing them
//! - **Log Streaming**: Line-level stdout/stderr callbacks
//! - **Mock Runner**: Predicate-matched canned responses with call capture
//!
//! # Example
//!
//! ```rust,no_run
//! use prov_runner::{CancellationToken, CommandRunner, ProcessRunner, ProcessRunnerOptions, RunArgs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new(ProcessRunnerOptions::default().timeout(60));
//!
//!     let args = RunArgs::new("terraform").args(["version", "-json"]);
//!     let result = runner.run(&args, &CancellationToken::new()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::{ProcessRunnerOptions, RunArgs};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockCommandRunner, MockExpectation};
pub use process::{LogHandler, LogLine, LogStream, ProcessRunner};
pub use runner::{CommandRunner, RunResult};

pub use tokio_util::sync::CancellationToken;
