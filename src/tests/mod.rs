//! Tests for the run engine and the node-facing steps.
//!
//! ## Test Organization
//!
//! - `common`: Scripted connection, block fixtures and stub steps
//! - `runner`: Sequential execution and short-circuiting
//! - `poll`: Retry/poll combinator
//! - `wait`: Block-waiting state machine
//! - `lifecycle`: Data-request lifecycle predicates
//! - `transport`: JSON-RPC framing, TCP steps and run-context steps
//!
//! ## Test Doubles
//!
//! Most tests talk to a `ScriptedConnection`: each receive pops one queued
//! frame, and every sent frame is recorded for inspection.

pub(crate) mod common;

mod runner;
