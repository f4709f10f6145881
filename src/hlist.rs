//! Step sequences as heterogeneous lists.
//!
//! A suite is a chain of [`HCons`] cells ending in an [`HSingle`], so every
//! step keeps its concrete type and the runner needs no boxing. Only non-empty
//! chains implement [`StepList`]; [`HNil`] exists for completeness and cannot be
//! handed to a [`Run`](crate::Run).

use serde_json::Value;

use crate::execution::RunState;
use crate::outcome::Outcome;
use crate::session::Session;
use crate::step::Step;

/// The empty chain. Not runnable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HNil;

/// A step followed by the rest of the suite.
#[derive(Debug, Clone)]
pub struct HCons<H, T> {
    /// Step run first.
    pub head: H,
    /// Steps run after `head` succeeds.
    pub tail: T,
}

impl<H, T> HCons<H, T> {
    /// Prepend `head` to `tail`.
    pub fn new(head: H, tail: T) -> Self {
        Self { head, tail }
    }
}

/// The last step of a suite.
#[derive(Debug, Clone)]
pub struct HSingle<H>(pub H);

impl<H> HSingle<H> {
    /// A suite of one step.
    pub fn new(head: H) -> Self {
        Self(head)
    }
}

/// Trait for step sequences that can be run.
///
/// Running is a left fold: each step receives the previous step's payload,
/// and the first failure ends the fold. Steps after a failure are never
/// executed; they are only counted as skipped.
#[async_trait::async_trait]
pub trait StepList: Send + Sync {
    /// Number of steps in this list.
    const LEN: usize;

    /// Run all steps in order, starting from `input`.
    async fn execute_all(
        &self,
        session: &mut Session,
        state: &mut RunState,
        input: Value,
    ) -> Outcome<Value>;

    /// Names of all steps, in run order.
    fn names(&self) -> Vec<String>;
}

/// The last step: run it and report its outcome.
#[async_trait::async_trait]
impl<S: Step> StepList for HSingle<S> {
    const LEN: usize = 1;

    async fn execute_all(
        &self,
        session: &mut Session,
        state: &mut RunState,
        input: Value,
    ) -> Outcome<Value> {
        state.run_step(&self.0, session, input).await
    }

    fn names(&self) -> Vec<String> {
        vec![self.0.name()]
    }
}

/// Run the head; continue into the tail only on success.
#[async_trait::async_trait]
impl<S, T> StepList for HCons<S, T>
where
    S: Step,
    T: StepList,
{
    const LEN: usize = 1 + T::LEN;

    async fn execute_all(
        &self,
        session: &mut Session,
        state: &mut RunState,
        input: Value,
    ) -> Outcome<Value> {
        match state.run_step(&self.head, session, input).await {
            Ok(value) => self.tail.execute_all(session, state, value).await,
            Err(failure) => {
                state.mark_skipped(T::LEN);
                Err(failure)
            }
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names = vec![self.head.name()];
        names.extend(self.tail.names());
        names
    }
}
