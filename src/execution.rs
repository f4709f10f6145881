//! Run state types with typestate pattern.
//!
//! A [`Run`] starts in the `New` state and ends either `Completed` or `Failed`.
//! Which accessors are available follows from the state type, so a finished
//! run cannot be started again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::process::ExitCode;

use crate::hlist::StepList;
use crate::outcome::{display_payload, Failure, Outcome};
use crate::session::{now_millis, Session};
use crate::step::Step;

/// Printed once when every step of a run succeeded.
pub const SUCCESS_BANNER: &str = r" _____                             _
/  ___|                           | |
\ `--. _   _  ___ ___ ___  ___ ___| |
 `--. \ | | |/ __/ __/ _ \/ __/ __| |
/\__/ / |_| | (_| (_|  __/\__ \__ \_|
\____/ \__,_|\___\___\___||___/___(_)
";

// ============================================================================
// Typestate Markers
// ============================================================================

/// Marker: Run has not started yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct New;

/// Marker: Every step succeeded.
#[derive(Debug, Clone, Copy)]
pub struct Completed;

/// Marker: A step failed and the remaining steps were skipped.
#[derive(Debug, Clone, Copy)]
pub struct Failed;

// ============================================================================
// Step Records
// ============================================================================

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// The step returned `Ok`.
    Passed,
    /// The step returned `Err`.
    Failed,
}

/// Report entry for a single executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Index of the step.
    pub step_index: usize,
    /// Name of the step.
    pub name: String,
    /// When the step started (Unix timestamp ms).
    pub started_at: u64,
    /// When the step completed (Unix timestamp ms), if completed.
    pub completed_at: Option<u64>,
    /// Outcome of the step, if completed.
    pub status: Option<StepStatus>,
    /// The `✔ Ok: ..` / `✘ Err: ..` report line, if completed.
    pub summary: Option<String>,
}

impl StepRecord {
    /// Create a new step record.
    pub fn new(step_index: usize, name: String) -> Self {
        Self {
            step_index,
            name,
            started_at: now_millis(),
            completed_at: None,
            status: None,
            summary: None,
        }
    }

    /// Mark the step as completed.
    pub fn complete(&mut self, status: StepStatus, summary: String) {
        self.completed_at = Some(now_millis());
        self.status = Some(status);
        self.summary = Some(summary);
    }

    /// Get the duration in milliseconds, if completed.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|end| end.saturating_sub(self.started_at))
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Progress of a run: next step index, skipped steps and the step records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Index of the next step to execute.
    index: usize,
    /// Steps not executed because an earlier one failed.
    skipped: usize,
    /// When the run started (Unix timestamp ms).
    started_at: Option<u64>,
    /// One record per executed step.
    records: Vec<StepRecord>,
}

impl RunState {
    /// Create a new run state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps executed so far.
    pub fn executed_count(&self) -> usize {
        self.index
    }

    /// Number of steps skipped after a failure.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Get when the run started.
    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    /// Get all step records.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Mark the run as started.
    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(now_millis());
        }
    }

    /// Record that `count` steps will not run.
    pub fn mark_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Execute one step, printing and recording its report lines.
    pub async fn run_step<S>(
        &mut self,
        step: &S,
        session: &mut Session,
        input: Value,
    ) -> Outcome<Value>
    where
        S: Step + ?Sized,
    {
        let step_index = self.index;
        let name = step.name();

        println!("[ {name} ]\nRunning test '{name}'...");
        tracing::info!(run = %session.id(), step = step_index, name = %name, "step.start");
        self.records.push(StepRecord::new(step_index, name.clone()));

        let result = step.execute(session, input).await;

        let (status, summary) = match &result {
            Ok(value) => (
                StepStatus::Passed,
                format!("✔ Ok: {}", display_payload(value)),
            ),
            Err(failure) => (StepStatus::Failed, format!("✘ Err: {failure}")),
        };
        println!("{summary}\n");

        match &result {
            Ok(_) => tracing::info!(step = step_index, name = %name, "step.end"),
            Err(failure) => tracing::error!(
                step = step_index,
                name = %name,
                kind = failure.kind(),
                %failure,
                "step.end"
            ),
        }

        if let Some(record) = self.records.last_mut() {
            record.complete(status, summary);
        }
        self.index += 1;
        result
    }
}

// ============================================================================
// Run Result
// ============================================================================

/// Result of starting a run.
pub enum RunResult<Steps: StepList> {
    /// Every step succeeded; carries the last step's payload.
    Completed(Run<Steps, Completed>, Value),
    /// A step failed; carries the first failure.
    Failed(Run<Steps, Failed>, Failure),
}

impl<Steps: StepList> RunResult<Steps> {
    /// Returns `true` if every step succeeded.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(..))
    }

    /// Returns `true` if a step failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(..))
    }

    /// Progress and records of the finished run.
    pub fn state(&self) -> &RunState {
        match self {
            Self::Completed(run, _) => &run.state,
            Self::Failed(run, _) => &run.state,
        }
    }

    /// Process exit code for this result.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Completed(..) => ExitCode::SUCCESS,
            Self::Failed(..) => ExitCode::FAILURE,
        }
    }
}

// ============================================================================
// Run (Typestate)
// ============================================================================

/// A test run with compile-time state tracking.
///
/// The `State` type parameter enforces valid operations:
/// - `Run<_, New>`: Can call `start()`
/// - `Run<_, Completed>`: Can access the final session and records
/// - `Run<_, Failed>`: Can access the session and records for inspection
pub struct Run<Steps, State = New>
where
    Steps: StepList,
{
    steps: Steps,
    session: Session,
    state: RunState,
    _marker: PhantomData<State>,
}

impl<Steps: StepList> Run<Steps, New> {
    /// Create a new run in the `New` state.
    pub fn new(steps: Steps, session: Session) -> Self {
        Self {
            steps,
            session,
            state: RunState::new(),
            _marker: PhantomData,
        }
    }

    /// Start the run with a `null` initial payload.
    pub async fn start(self) -> RunResult<Steps> {
        self.start_with(Value::Null).await
    }

    /// Start the run with the given initial payload.
    pub async fn start_with(mut self, input: Value) -> RunResult<Steps> {
        self.state.mark_started();
        tracing::info!(run = %self.session.id(), steps = Steps::LEN, "run.start");

        match self
            .steps
            .execute_all(&mut self.session, &mut self.state, input)
            .await
        {
            Ok(output) => {
                println!("{SUCCESS_BANNER}");
                tracing::info!(
                    run = %self.session.id(),
                    executed = self.state.executed_count(),
                    "run.completed"
                );
                RunResult::Completed(self.into_state(), output)
            }
            Err(failure) => {
                tracing::error!(
                    run = %self.session.id(),
                    executed = self.state.executed_count(),
                    skipped = self.state.skipped_count(),
                    %failure,
                    "run.failed"
                );
                RunResult::Failed(self.into_state(), failure)
            }
        }
    }
}

impl<Steps: StepList, State> Run<Steps, State> {
    /// Names of the steps of this run, in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.names()
    }

    /// Get a reference to the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Progress and records of the run.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consume the run and return the session.
    pub fn into_session(self) -> Session {
        self.session
    }

    fn into_state<Next>(self) -> Run<Steps, Next> {
        Run {
            steps: self.steps,
            session: self.session,
            state: self.state,
            _marker: PhantomData,
        }
    }
}
