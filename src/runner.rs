use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::assertion::{assert_count, assert_text, assert_visible};
use crate::browser::{BrowserOptions, BrowserSession};
use crate::result::StepError;
use crate::scenario::{Scenario, Step};
use crate::session::PageSession;
use crate::wait::{self, Condition, Timeout, wait_fixed, wait_for};

#[derive(Clone, Debug)]
pub struct RunnerOptions {
    pub output_directory: PathBuf,
    /// Used by wait steps that don't name their own timeout.
    pub default_timeout: Timeout,
    pub poll_interval: Duration,
}

impl RunnerOptions {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        RunnerOptions {
            output_directory: output_directory.into(),
            default_timeout: wait::DEFAULT_TIMEOUT,
            poll_interval: wait::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// `Pending -> Running -> {Passed, Failed}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    fn advance(self, next: RunStatus) -> RunStatus {
        use RunStatus::*;
        debug_assert!(
            matches!(
                (self, next),
                (Pending, Running) | (Running, Passed) | (Running, Failed)
            ),
            "illegal run transition {:?} -> {:?}",
            self,
            next
        );
        next
    }
}

#[derive(Clone, Debug)]
pub struct StepRecord {
    pub index: usize,
    pub description: String,
    pub started: SystemTime,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

#[derive(Debug)]
pub struct StepFailure {
    pub index: usize,
    pub step: Step,
    pub cause: StepError,
}

impl Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step {} ({}) failed: {}",
            self.index + 1,
            self.step,
            self.cause
        )
    }
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub screenshots: Vec<PathBuf>,
    pub failure: Option<StepFailure>,
}

impl ScenarioResult {
    pub fn ok(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn steps_executed(&self) -> usize {
        self.steps.len()
    }
}

/// Executes the steps of `scenario` in order, stopping at the first one that
/// fails. Nothing is retried.
pub async fn run<S: PageSession>(
    scenario: &Scenario,
    session: &mut S,
    options: &RunnerOptions,
) -> ScenarioResult {
    let mut result = ScenarioResult {
        name: scenario.name.clone(),
        status: RunStatus::Pending,
        steps: Vec::with_capacity(scenario.steps.len()),
        screenshots: vec![],
        failure: None,
    };
    result.status = result.status.advance(RunStatus::Running);
    info!("running scenario {}", scenario.name);

    let total = scenario.steps.len();
    for (index, step) in scenario.steps.iter().enumerate() {
        let started = SystemTime::now();
        let clock = Instant::now();
        debug!("step {}/{}: {}", index + 1, total, step);
        let outcome = execute(step, session, options).await;

        result.steps.push(StepRecord {
            index,
            description: step.to_string(),
            started,
            elapsed: clock.elapsed(),
            error: outcome.as_ref().err().map(ToString::to_string),
            error_kind: outcome.as_ref().err().map(StepError::kind),
        });

        match outcome {
            Ok(screenshot) => {
                println!(
                    "[{}] {}/{} ok: {}",
                    scenario.name,
                    index + 1,
                    total,
                    step
                );
                if let Some(path) = screenshot {
                    println!(
                        "[{}] screenshot saved to {}",
                        scenario.name,
                        path.display()
                    );
                    result.screenshots.push(path);
                }
            }
            Err(cause) => {
                println!(
                    "[{}] {}/{} FAILED: {}",
                    scenario.name,
                    index + 1,
                    total,
                    step
                );
                result.failure = Some(StepFailure {
                    index,
                    step: step.clone(),
                    cause,
                });
                result.status = result.status.advance(RunStatus::Failed);
                return result;
            }
        }
    }

    result.status = result.status.advance(RunStatus::Passed);
    result
}

async fn execute<S: PageSession>(
    step: &Step,
    session: &mut S,
    options: &RunnerOptions,
) -> crate::result::Result<Option<PathBuf>> {
    let timeout_or_default =
        |timeout: &Option<Timeout>| timeout.unwrap_or(options.default_timeout);
    match step {
        Step::Navigate { url } => session.navigate(url).await?,
        Step::InjectGlobal { name, value } => {
            session.inject_global(name, value).await?
        }
        Step::Evaluate { script } => {
            let value = session.evaluate(script).await?;
            debug!("`{}` returned {}", script, value);
        }
        Step::WaitForVisible { selector, timeout } => {
            wait_for(
                session,
                &Condition::Visible(selector.clone()),
                timeout_or_default(timeout),
                options.poll_interval,
            )
            .await?
        }
        Step::WaitForCount {
            selector,
            count,
            timeout,
        } => {
            wait_for(
                session,
                &Condition::Count(selector.clone(), *count),
                timeout_or_default(timeout),
                options.poll_interval,
            )
            .await?
        }
        Step::WaitForFunction {
            expression,
            timeout,
        } => {
            wait_for(
                session,
                &Condition::Function(expression.clone()),
                timeout_or_default(timeout),
                options.poll_interval,
            )
            .await?
        }
        Step::WaitFixed { duration } => wait_fixed(*duration).await,
        Step::AssertVisible { selector } => {
            assert_visible(session, selector).await?
        }
        Step::AssertText { selector, text } => {
            assert_text(session, selector, text).await?
        }
        Step::AssertCount { selector, count } => {
            assert_count(session, selector, *count).await?
        }
        Step::Screenshot { path } => {
            let path = options.output_directory.join(path);
            let data = session.screenshot().await?;
            write_screenshot(&path, &data).await?;
            return Ok(Some(path));
        }
    }
    Ok(None)
}

async fn write_screenshot(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}

/// Runs `scenario` in a fresh browser. The browser is closed afterwards
/// whether or not the scenario passed.
pub async fn run_scenario(
    scenario: &Scenario,
    runner_options: &RunnerOptions,
    browser_options: &BrowserOptions,
) -> Result<ScenarioResult> {
    info!(
        "storing screenshots for {} in {}",
        scenario.name,
        runner_options.output_directory.display()
    );
    let session = BrowserSession::open(browser_options).await?;
    Ok(run_and_close(scenario, session, runner_options).await)
}

/// Runs `scenario` on `session` and closes it, on success and on failure
/// alike. A failure to close is logged and doesn't change the verdict.
pub async fn run_and_close<S: PageSession>(
    scenario: &Scenario,
    mut session: S,
    options: &RunnerOptions,
) -> ScenarioResult {
    let result = run(scenario, &mut session, options).await;
    if let Err(error) = session.close().await {
        warn!("failed to close page session cleanly: {:?}", error);
    }
    result
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json as json;
    use tempfile::TempDir;
    use url::Url;

    use super::*;
    use crate::scenario::builtin;
    use crate::session::fake::FakeSession;
    use crate::session::ElementProbe;

    fn target() -> Url {
        Url::parse("file:///srv/flagged/index.html").unwrap()
    }

    fn options(directory: &TempDir) -> RunnerOptions {
        RunnerOptions {
            output_directory: directory.path().to_path_buf(),
            default_timeout: Timeout(50),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn lobby_page() -> FakeSession {
        FakeSession::new()
            .with_element("h1", Some("Flagged"), true)
            .with_element("#initial-message", Some("Waiting for a match"), true)
    }

    fn spinner_page() -> FakeSession {
        let segments = |count| ElementProbe {
            count,
            visible: true,
            text: None,
        };
        FakeSession::new()
            .with_result(builtin::GAME_READY, json::Value::Bool(true))
            .with_element("#spinner-modal", None, true)
            .with_probes(
                "#spinner-modal .spinner-segment",
                [segments(0), segments(6), segments(12)],
            )
            .with_element("#interstitial-screen", None, true)
            .with_element("#interstitial-spinner-wheel", None, true)
    }

    #[tokio::test]
    async fn test_lobby_passes() {
        let directory = TempDir::new().unwrap();
        let scenario = builtin::lobby(&target());
        let mut session = lobby_page();

        let result = run(&scenario, &mut session, &options(&directory)).await;

        assert!(result.ok(), "{:?}", result.failure);
        assert_eq!(result.steps_executed(), scenario.steps.len());
        assert_eq!(
            result.screenshots,
            vec![directory.path().join("verification.png")]
        );
        assert!(directory.path().join("verification.png").exists());
    }

    #[tokio::test]
    async fn test_lobby_fails_on_wrong_title() {
        let directory = TempDir::new().unwrap();
        let scenario = builtin::lobby(&target());
        let mut session = FakeSession::new()
            .with_element("h1", Some("Flagged!"), true)
            .with_element("#initial-message", None, true);

        let result = run(&scenario, &mut session, &options(&directory)).await;

        assert_eq!(result.status, RunStatus::Failed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.index, 2);
        assert!(matches!(failure.cause, StepError::Assertion { .. }));
        assert_eq!(result.steps.len(), 3);
        assert!(result.screenshots.is_empty());
        assert!(!directory.path().join("verification.png").exists());
    }

    #[tokio::test]
    async fn test_spinner_passes_with_two_screenshots() {
        let directory = TempDir::new().unwrap();
        let scenario = builtin::spinner(&target());
        let mut session = spinner_page();

        let result = run(&scenario, &mut session, &options(&directory)).await;

        assert!(result.ok(), "{:?}", result.failure);
        assert_eq!(
            result.screenshots,
            vec![
                directory.path().join("verification.png"),
                directory.path().join("loading_spinner.png"),
            ]
        );
        assert_eq!(
            session.globals.get("amIPlayer1"),
            Some(&json::Value::Bool(true))
        );
        assert!(session
            .calls
            .contains(&"evaluate setLoading(true, false)".to_string()));
    }

    #[tokio::test]
    async fn test_spinner_times_out_without_segments() {
        let directory = TempDir::new().unwrap();
        let mut scenario = builtin::spinner(&target());
        let mut session = spinner_page().with_probes(
            "#spinner-modal .spinner-segment",
            [ElementProbe {
                count: 11,
                visible: true,
                text: None,
            }],
        );
        // The built-in count wait allows 5s.
        for step in scenario.steps.iter_mut() {
            if let Step::WaitForCount { timeout, .. } = step {
                *timeout = Some(Timeout(30));
            }
        }

        let result = run(&scenario, &mut session, &options(&directory)).await;

        let failure = result.failure.expect("scenario should fail");
        assert!(matches!(failure.cause, StepError::Timeout { .. }));
        assert!(matches!(failure.step, Step::WaitForCount { .. }));
        assert!(!session.calls.contains(&"screenshot".to_string()));
    }

    #[tokio::test]
    async fn test_navigation_failure_stops_run() {
        let directory = TempDir::new().unwrap();
        let scenario = builtin::lobby(&target());
        let mut session = lobby_page().with_unreachable(&target());

        let result = run(&scenario, &mut session, &options(&directory)).await;

        assert!(!result.ok());
        assert_eq!(result.steps_executed(), 1);
        assert_eq!(session.probe_count, 0);
        let failure = result.failure.unwrap();
        assert!(failure.to_string().starts_with("step 1 (navigate to"));
    }

    #[tokio::test]
    async fn test_same_scenario_twice_gives_same_verdict() {
        let directory = TempDir::new().unwrap();
        let scenario = builtin::lobby(&target());
        let options = options(&directory);
        let first = run(&scenario, &mut lobby_page(), &options).await;
        let second = run(&scenario, &mut lobby_page(), &options).await;
        assert_eq!(first.ok(), second.ok());
        assert_eq!(first.steps_executed(), second.steps_executed());
    }

    #[tokio::test]
    async fn test_session_closed_after_pass() {
        let directory = TempDir::new().unwrap();
        let session = lobby_page();
        let closed = session.closed();

        let scenario = builtin::lobby(&target());
        let result =
            run_and_close(&scenario, session, &options(&directory)).await;

        assert!(result.ok(), "{:?}", result.failure);
        assert!(closed.get());
    }

    #[tokio::test]
    async fn test_session_closed_after_assertion_failure() {
        let directory = TempDir::new().unwrap();
        let session = FakeSession::new()
            .with_element("h1", Some("Flaged"), true)
            .with_element("#initial-message", None, true);
        let closed = session.closed();

        let scenario = builtin::lobby(&target());
        let result =
            run_and_close(&scenario, session, &options(&directory)).await;

        let failure = result.failure.expect("scenario should fail");
        assert_eq!(failure.cause.kind(), "assertion");
        assert_eq!(result.steps[2].error_kind, Some("assertion"));
        assert!(closed.get());
    }

    #[tokio::test]
    async fn test_session_closed_after_timeout() {
        let directory = TempDir::new().unwrap();
        let session = spinner_page().with_probes(
            "#spinner-modal .spinner-segment",
            [ElementProbe {
                count: 11,
                visible: true,
                text: None,
            }],
        );
        let closed = session.closed();
        let scenario = Scenario::new(
            "segments",
            vec![Step::WaitForCount {
                selector: "#spinner-modal .spinner-segment".into(),
                count: 12,
                timeout: Some(Timeout(20)),
            }],
        );

        let result =
            run_and_close(&scenario, session, &options(&directory)).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps[0].error_kind, Some("timeout"));
        assert!(closed.get());
    }

    fn evaluate_steps(count: usize) -> Vec<Step> {
        (0..count)
            .map(|index| Step::Evaluate {
                script: format!("tick({})", index),
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_first_failure_halts_run(
            (length, failing) in (1usize..16)
                .prop_flat_map(|length| (Just(length), 0..length))
        ) {
            let directory = TempDir::new().unwrap();
            let scenario = Scenario::new("halting", evaluate_steps(length));
            let mut session = FakeSession::new()
                .with_throwing(&format!("tick({})", failing));

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let options = options(&directory);
            let result =
                runtime.block_on(run(&scenario, &mut session, &options));

            prop_assert_eq!(result.status, RunStatus::Failed);
            prop_assert_eq!(result.steps_executed(), failing + 1);
            prop_assert_eq!(session.calls.len(), failing + 1);
            let failed_at = result.failure.map(|failure| failure.index);
            prop_assert_eq!(failed_at, Some(failing));
        }

        #[test]
        fn test_all_steps_run_when_none_fail(length in 0usize..16) {
            let directory = TempDir::new().unwrap();
            let scenario = Scenario::new("clean", evaluate_steps(length));
            let mut session = FakeSession::new();

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let options = options(&directory);
            let result =
                runtime.block_on(run(&scenario, &mut session, &options));

            prop_assert!(result.ok());
            prop_assert_eq!(result.steps_executed(), length);
        }
    }
}
