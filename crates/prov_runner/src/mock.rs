//! Mock command runner for testing.
//!
//! Responses are registered against a predicate over the invocation and its
//! rendered command line. Every invocation is captured so tests can verify
//! exact phase ordering and subcommand content without a real tool installed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::RunArgs;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, RunResult};

type Predicate = Arc<dyn Fn(&RunArgs, &str) -> bool + Send + Sync>;
type Responder = Arc<dyn Fn(&RunArgs) -> RunnerResult<RunResult> + Send + Sync>;

#[derive(Clone)]
struct Expectation {
    predicate: Predicate,
    responder: Responder,
    delay: Option<Duration>,
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub command_line: String,
    pub args: RunArgs,
}

/// Mock command runner.
///
/// When several registrations match an invocation, the most recently
/// registered one answers. Unmatched invocations fail with
/// [`RunnerError::NoMatchingResponse`].
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    expectations: Arc<RwLock<Vec<Expectation>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

/// Pending registration returned by [`MockCommandRunner::when`].
#[must_use = "a registration does nothing until a response is attached"]
pub struct MockExpectation<'a> {
    runner: &'a MockCommandRunner,
    predicate: Predicate,
    delay: Option<Duration>,
}

impl<'a> MockExpectation<'a> {
    /// Hold the response back for `delay`, honouring cancellation meanwhile.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer with a fixed result.
    pub fn respond(self, result: RunResult) {
        self.respond_with(move |_| Ok(result.clone()));
    }

    /// Answer with a transport-level error.
    pub fn fail(self, make_error: impl Fn() -> RunnerError + Send + Sync + 'static) {
        self.respond_with(move |_| Err(make_error()));
    }

    /// Answer by calling `responder` with the invocation.
    pub fn respond_with<F>(self, responder: F)
    where
        F: Fn(&RunArgs) -> RunnerResult<RunResult> + Send + Sync + 'static,
    {
        self.runner.expectations.write().push(Expectation {
            predicate: self.predicate,
            responder: Arc::new(responder),
            delay: self.delay,
        });
    }
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registration for invocations matching `predicate`.
    ///
    /// The predicate receives the invocation and its rendered command line
    /// (see [`RunArgs::command_line`]).
    pub fn when<F>(&self, predicate: F) -> MockExpectation<'_>
    where
        F: Fn(&RunArgs, &str) -> bool + Send + Sync + 'static,
    {
        MockExpectation {
            runner: self,
            predicate: Arc::new(predicate),
            delay: None,
        }
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls, in invocation order.
    pub fn calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Number of invocations whose argument list contains `subcommand`.
    pub fn invocations_of(&self, subcommand: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.args.has_arg(subcommand))
            .count()
    }

    /// Rendered command lines, in invocation order.
    pub fn command_lines(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.command_line.clone())
            .collect()
    }

    fn find(&self, args: &RunArgs, command_line: &str) -> Option<Expectation> {
        self.expectations
            .read()
            .iter()
            .rev()
            .find(|e| (e.predicate)(args, command_line))
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, args: &RunArgs, cancel: &CancellationToken) -> RunnerResult<RunResult> {
        let command_line = args.command_line();
        self.captured_calls.write().push(CapturedCall {
            command_line: command_line.clone(),
            args: args.clone(),
        });

        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled(command_line));
        }

        let expectation = self
            .find(args, &command_line)
            .ok_or_else(|| RunnerError::NoMatchingResponse(command_line.clone()))?;

        if let Some(delay) = expectation.delay {
            tokio::select! {
                () = cancel.cancelled() => return Err(RunnerError::Cancelled(command_line)),
                () = tokio::time::sleep(delay) => {}
            }
        }

        (expectation.responder)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terraform(sub: &str) -> RunArgs {
        RunArgs::new("terraform").args(["-chdir=infra", sub])
    }

    #[tokio::test]
    async fn test_mock_runner_basic() {
        let runner = MockCommandRunner::new();
        runner
            .when(|_, cmd| cmd.contains("terraform -chdir=infra validate"))
            .respond(RunResult::success("Success! The configuration is valid."));

        let result = runner
            .run(&terraform("validate"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "Success! The configuration is valid.");
    }

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockCommandRunner::new();
        runner.when(|_, _| true).respond(RunResult::success(""));

        let cancel = CancellationToken::new();
        runner.run(&terraform("init"), &cancel).await.unwrap();
        runner.run(&terraform("validate"), &cancel).await.unwrap();

        assert_eq!(runner.call_count(), 2);
        assert_eq!(runner.invocations_of("init"), 1);
        assert_eq!(runner.invocations_of("apply"), 0);
        assert_eq!(
            runner.command_lines(),
            vec![
                "terraform -chdir=infra init".to_string(),
                "terraform -chdir=infra validate".to_string(),
            ]
        );

        runner.clear_calls();
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_latest_registration_wins() {
        let runner = MockCommandRunner::new();
        runner
            .when(|args, _| args.has_arg("plan"))
            .respond(RunResult::success("first"));
        runner
            .when(|args, _| args.has_arg("plan"))
            .respond(RunResult::failure(1, "second"));

        let result = runner
            .run(&terraform("plan"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "second");
    }

    #[tokio::test]
    async fn test_unmatched_invocation_fails() {
        let runner = MockCommandRunner::new();
        let err = runner
            .run(&terraform("destroy"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::NoMatchingResponse(_)));
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_simulation() {
        let runner = MockCommandRunner::new();
        runner
            .when(|args, _| args.cmd == "terraform")
            .fail(|| RunnerError::ExecutableNotFound("terraform".to_string()));

        let err = runner
            .run(&terraform("version"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ExecutableNotFound(_)));
    }

    #[tokio::test]
    async fn test_delay_honours_cancellation() {
        let runner = MockCommandRunner::new();
        runner
            .when(|_, _| true)
            .after(Duration::from_secs(30))
            .respond(RunResult::success(""));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = runner.run(&terraform("apply"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
