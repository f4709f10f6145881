#![deny(missing_docs)]

//! Integration tests for a running Witnet node, driven over JSON-RPC.
//!
//! # Design Goals
//!
//! - **HList-based suites**: Empty suites are compile errors, not runtime panics
//! - **Typestate runs**: A finished run cannot be started again
//! - **First failure wins**: Once a step fails, no later step executes
//!
//! # Core Concepts
//!
//! - [`Step`]: A named operation from the previous payload to an [`Outcome`]
//! - [`Run`]: Runtime state with typestate tracking (`New`, `Completed`, `Failed`)
//! - [`Session`]: Request-id counter, connection and stash shared by the steps of a run
//! - [`Poll`]: Retry a step until it succeeds or its budget runs out
//! - [`WaitForBlock`]: Skip notifications until a block passes a [`BlockFilter`]
//!
//! ```rust,no_run
//! use witnet_tester::lifecycle::ContainsAnyDataRequest;
//! use witnet_tester::steps::{jsonrpc_read, jsonrpc_request, jsonrpc_write, tcp_connect};
//! use witnet_tester::{suite, wait_for_next_block, Run, Session};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::process::ExitCode {
//!     let steps = suite![
//!         tcp_connect("127.0.0.1:21338"),
//!         jsonrpc_request("witnet_subscribe", serde_json::json!(["newBlocks"])),
//!         jsonrpc_write(),
//!         jsonrpc_read(),
//!         wait_for_next_block(5, ContainsAnyDataRequest),
//!     ];
//!     Run::new(steps, Session::new()).start().await.exit_code()
//! }
//! ```

// Modules
pub mod block;
pub mod config;
pub mod execution;
pub mod hlist;
pub mod lifecycle;
mod macros;
pub mod outcome;
pub mod scenario;
pub mod session;
pub mod step;
pub mod steps;
pub mod transport;

// Re-exports for convenience
pub use block::{
    wait_for_block, wait_for_next_block, AnyBlock, Block, BlockFilter, TxnKind, WaitConfig,
    WaitForBlock,
};
pub use config::{ConfigError, HarnessConfig};
pub use execution::{
    Completed, Failed, New, Run, RunResult, RunState, StepRecord, StepStatus, SUCCESS_BANNER,
};
pub use hlist::{HCons, HNil, HSingle, StepList};
pub use lifecycle::{DataRequest, RequestError};
pub use outcome::{Failure, Outcome, OutcomeExt};
pub use session::{RunId, Session};
pub use step::{poll, Poll, RetryPolicy, Step};
pub use transport::{Connection, Message, TcpConnection};

#[cfg(test)]
mod tests;
